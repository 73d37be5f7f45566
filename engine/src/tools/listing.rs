//! Filesystem discovery tools: glob and grep.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use globset::{Glob, GlobMatcher};
use ignore::WalkBuilder;
use regex::Regex;

use super::sandbox::safe_path;
use super::truncate::truncate;
use super::{Context, ResultTimer, Tool, ToolError, ToolFut, arg_str};

const GLOB_RESULT_LIMIT: usize = 100;
const GREP_MATCH_LIMIT: usize = 1000;

pub struct GlobTool;
pub struct GrepTool;

/// Walk everything under `root`: hidden files included, no ignore files.
fn raw_walker(root: &Path) -> ignore::Walk {
    WalkBuilder::new(root).standard_filters(false).build()
}

impl Tool for GlobTool {
    fn name(&self) -> &'static str {
        "glob"
    }

    fn description(&self) -> &'static str {
        "Find files matching a glob pattern"
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "glob pattern, e.g. **/*.rs or *.toml"
                },
                "path": {
                    "type": "string",
                    "description": "directory to search in (default: root)"
                }
            },
            "required": ["pattern"]
        })
    }

    fn validate(&self, args: &openlink_types::ArgMap) -> Result<(), ToolError> {
        let Some(pattern) = arg_str(args, "pattern").filter(|p| !p.is_empty()) else {
            return Err(ToolError::bad_args("pattern is required"));
        };
        Glob::new(pattern)
            .map_err(|e| ToolError::bad_args(format!("invalid pattern: {e}")))?;
        Ok(())
    }

    fn execute<'a>(&'a self, ctx: Context<'a>) -> ToolFut<'a> {
        Box::pin(async move {
            let timer = ResultTimer::start();
            let pattern = arg_str(ctx.args, "pattern").unwrap_or_default();
            let search_path = match arg_str(ctx.args, "path") {
                Some(path) if !path.is_empty() => path,
                _ => ".",
            };

            let resolved = match safe_path(&ctx.config.root_dir, search_path) {
                Ok(p) => p,
                Err(err) => return timer.failure(err.to_string()),
            };

            // Recursive patterns match basenames; flat patterns match the
            // path relative to the search root, falling back to basenames.
            let recursive = pattern.contains("**");
            let base_pattern = Path::new(pattern)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| pattern.to_string());
            let base_matcher = match Glob::new(&base_pattern) {
                Ok(glob) => glob.compile_matcher(),
                Err(err) => return timer.failure(format!("invalid pattern: {err}")),
            };
            let full_matcher: Option<GlobMatcher> = if recursive {
                None
            } else {
                Glob::new(pattern).ok().map(|g| g.compile_matcher())
            };

            let mut files: Vec<(PathBuf, SystemTime)> = Vec::new();
            for entry in raw_walker(&resolved) {
                let Ok(entry) = entry else { continue };
                if !entry.file_type().is_some_and(|t| t.is_file()) {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().into_owned();
                let matched = if recursive {
                    base_matcher.is_match(&name)
                } else {
                    let rel = entry.path().strip_prefix(&resolved).unwrap_or(entry.path());
                    full_matcher.as_ref().is_some_and(|m| m.is_match(rel))
                        || base_matcher.is_match(&name)
                };
                if !matched {
                    continue;
                }
                let mtime = entry
                    .metadata()
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                files.push((entry.into_path(), mtime));
            }

            files.sort_by(|a, b| b.1.cmp(&a.1));
            let clipped = files.len() > GLOB_RESULT_LIMIT;
            files.truncate(GLOB_RESULT_LIMIT);

            if files.is_empty() {
                return timer.success("No files found");
            }
            let mut lines: Vec<String> = files
                .into_iter()
                .map(|(path, _)| path.display().to_string())
                .collect();
            if clipped {
                lines.push(format!(
                    "(results truncated, showing first {GLOB_RESULT_LIMIT})"
                ));
            }
            timer.success(lines.join("\n"))
        })
    }
}

impl Tool for GrepTool {
    fn name(&self) -> &'static str {
        "grep"
    }

    fn description(&self) -> &'static str {
        "Search file contents for a regex pattern"
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": { "type": "string", "description": "regex to search for" },
                "path": {
                    "type": "string",
                    "description": "directory to search in (default: root)"
                },
                "include": {
                    "type": "string",
                    "description": "filename filter, e.g. *.rs"
                }
            },
            "required": ["pattern"]
        })
    }

    fn validate(&self, args: &openlink_types::ArgMap) -> Result<(), ToolError> {
        let Some(pattern) = arg_str(args, "pattern").filter(|p| !p.is_empty()) else {
            return Err(ToolError::bad_args("pattern is required"));
        };
        Regex::new(pattern).map_err(|e| ToolError::bad_args(format!("invalid pattern: {e}")))?;
        if let Some(include) = arg_str(args, "include") {
            if include.contains('/') || include.contains('\\') || include.contains("..") {
                return Err(ToolError::bad_args(
                    "include must be a plain filename filter",
                ));
            }
            Glob::new(include)
                .map_err(|e| ToolError::bad_args(format!("invalid include filter: {e}")))?;
        }
        Ok(())
    }

    fn execute<'a>(&'a self, ctx: Context<'a>) -> ToolFut<'a> {
        Box::pin(async move {
            let timer = ResultTimer::start();
            let pattern = arg_str(ctx.args, "pattern").unwrap_or_default();
            let search_path = match arg_str(ctx.args, "path") {
                Some(path) if !path.is_empty() => path,
                _ => ".",
            };

            let regex = match Regex::new(pattern) {
                Ok(regex) => regex,
                Err(err) => return timer.failure(format!("invalid pattern: {err}")),
            };
            let include = arg_str(ctx.args, "include")
                .and_then(|f| Glob::new(f).ok())
                .map(|g| g.compile_matcher());

            let resolved = match safe_path(&ctx.config.root_dir, search_path) {
                Ok(p) => p,
                Err(err) => return timer.failure(err.to_string()),
            };

            let mut matches: Vec<String> = Vec::new();
            'walk: for entry in raw_walker(&resolved) {
                let Ok(entry) = entry else { continue };
                if !entry.file_type().is_some_and(|t| t.is_file()) {
                    continue;
                }
                if let Some(matcher) = &include {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    if !matcher.is_match(&name) {
                        continue;
                    }
                }
                // Skip files that are not valid UTF-8 text.
                let Ok(content) = std::fs::read_to_string(entry.path()) else {
                    continue;
                };
                let rel = entry
                    .path()
                    .strip_prefix(&resolved)
                    .unwrap_or(entry.path())
                    .display()
                    .to_string();
                for (line_no, line) in content.lines().enumerate() {
                    if regex.is_match(line) {
                        matches.push(format!("{}:{}:{}", rel, line_no + 1, line));
                        if matches.len() >= GREP_MATCH_LIMIT {
                            matches.push(format!("(stopped after {GREP_MATCH_LIMIT} matches)"));
                            break 'walk;
                        }
                    }
                }
            }

            if matches.is_empty() {
                return timer.success("No matches found");
            }
            let (output, _) = truncate(&matches.join("\n"));
            timer.success(output)
        })
    }
}
