use std::path::PathBuf;

use serde::Deserialize;

/// Optional overrides from `~/.openlink/config.toml`; flags win over the
/// file, the file wins over built-in defaults.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub root_dir: Option<PathBuf>,
    pub port: Option<u16>,
    pub timeout: Option<u64>,
}

impl FileConfig {
    pub fn load() -> Option<Self> {
        let path = dirs::home_dir()?.join(".openlink").join("config.toml");
        if !path.exists() {
            return None;
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("failed to read config at {:?}: {}", path, err);
                return None;
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Some(config),
            Err(err) => {
                tracing::warn!("failed to parse config at {:?}: {}", path, err);
                None
            }
        }
    }
}
