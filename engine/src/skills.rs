//! Skill discovery: `SKILL.md` files with a `---`-delimited front-matter
//! block, collected from a fixed list of search roots.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

/// Parsed skill metadata. The directory name is the fallback skill name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillInfo {
    pub name: String,
    pub description: String,
    /// Where the SKILL.md was found.
    pub path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum SkillError {
    #[error("invalid skill name: {0:?}")]
    InvalidName(String),
    #[error("skill {0:?} not found")]
    NotFound(String),
}

/// Search roots in fixed order: project dotdirs first, then the same agent
/// dirs under the user home. Discovery order decides name precedence.
fn skill_dirs(root_dir: &Path, home: Option<&Path>) -> Vec<PathBuf> {
    let mut dirs = vec![
        root_dir.join(".skills"),
        root_dir.join(".openlink/skills"),
        root_dir.join(".agent/skills"),
        root_dir.join(".claude/skills"),
    ];
    if let Some(home) = home {
        dirs.push(home.join(".openlink/skills"));
        dirs.push(home.join(".agent/skills"));
        dirs.push(home.join(".claude/skills"));
    }
    dirs
}

pub fn load_infos(root_dir: &Path) -> Vec<SkillInfo> {
    load_infos_in(root_dir, dirs::home_dir().as_deref())
}

fn load_infos_in(root_dir: &Path, home: Option<&Path>) -> Vec<SkillInfo> {
    let mut seen: Vec<SkillInfo> = Vec::new();

    for dir in skill_dirs(root_dir, home) {
        if !dir.is_dir() {
            continue;
        }
        tracing::debug!(?dir, "scanning for skills");
        let walker = WalkBuilder::new(&dir).standard_filters(false).build();
        for entry in walker {
            let Ok(entry) = entry else { continue };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            if !entry
                .file_name()
                .to_str()
                .is_some_and(|n| n.eq_ignore_ascii_case("skill.md"))
            {
                continue;
            }
            let Ok(content) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            let info = parse_front_matter(entry.path(), &content);
            tracing::debug!(name = %info.name, "loaded skill");
            // First occurrence of a name wins.
            if !seen.iter().any(|s| s.name == info.name) {
                seen.push(info);
            }
        }
    }
    seen
}

/// Locate a skill body by name: a flat `<name>.md`, or a
/// case-insensitively matching `<name>/SKILL.md` subdirectory.
pub fn find_skill(root_dir: &Path, name: &str) -> Result<String, SkillError> {
    find_skill_in(root_dir, dirs::home_dir().as_deref(), name)
}

fn find_skill_in(root_dir: &Path, home: Option<&Path>, name: &str) -> Result<String, SkillError> {
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(SkillError::InvalidName(name.to_string()));
    }
    for dir in skill_dirs(root_dir, home) {
        if let Ok(content) = std::fs::read_to_string(dir.join(format!("{name}.md"))) {
            return Ok(content);
        }
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.filter_map(Result::ok) {
            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let matches = entry
                .file_name()
                .to_str()
                .is_some_and(|n| n.eq_ignore_ascii_case(name));
            if matches {
                if let Ok(content) = std::fs::read_to_string(entry.path().join("SKILL.md")) {
                    return Ok(content);
                }
            }
        }
    }
    Err(SkillError::NotFound(name.to_string()))
}

fn parse_front_matter(path: &Path, content: &str) -> SkillInfo {
    let fallback_name = path
        .parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut info = SkillInfo {
        name: fallback_name,
        description: String::new(),
        path: path.to_path_buf(),
    };

    let Some(rest) = content.strip_prefix("---") else {
        return info;
    };
    let Some(end) = rest.find("---") else {
        return info;
    };
    for line in rest[..end].split('\n') {
        let Some((key, value)) = line.trim().split_once(':') else {
            continue;
        };
        match key.trim() {
            "name" => info.name = value.trim().to_string(),
            "description" => info.description = value.trim().to_string(),
            _ => {}
        }
    }
    info
}
