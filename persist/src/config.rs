use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::format::Format;
use crate::serializer::DEFAULT_MAX_DEPTH;
use crate::store::FileStore;

/// Persistence settings, usually loaded from a `[persist]`-style TOML file.
///
/// ```toml
/// save_path = "saves/world.json"
/// format = "pretty-json"
/// max_depth = 64
/// load_automatically = true
/// save_automatically = true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistConfig {
    /// File the store blob is read from and written to.
    pub save_path: PathBuf,
    pub format: Format,
    /// Nesting limit for save and load passes.
    pub max_depth: usize,
    /// Default for newly tracked roots: load when the store is read.
    pub load_automatically: bool,
    /// Default for newly tracked roots: save on every save request.
    pub save_automatically: bool,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            save_path: PathBuf::from("save.json"),
            format: Format::Json,
            max_depth: DEFAULT_MAX_DEPTH,
            load_automatically: true,
            save_automatically: true,
        }
    }
}

impl PersistConfig {
    /// A [`FileStore`] at the configured path and format.
    pub fn file_store(&self) -> FileStore {
        FileStore::new(&self.save_path, self.format)
    }
}

/// Load a persistence config from a TOML file.
pub fn load_config(path: &Path) -> Result<PersistConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Load a persistence config, falling back to defaults if it cannot be read.
pub fn load_or_default(path: &Path) -> PersistConfig {
    match load_config(path) {
        Ok(config) => {
            log::info!(
                "Loaded persistence config: {} ({:?})",
                config.save_path.display(),
                config.format
            );
            config
        }
        Err(e) => {
            log::warn!("No persistence config ({e}), using defaults");
            PersistConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: PersistConfig = toml::from_str(
            r#"
            save_path = "saves/slot1.json"
            format = "pretty-json"
            "#,
        )
        .unwrap();
        assert_eq!(config.save_path, PathBuf::from("saves/slot1.json"));
        assert_eq!(config.format, Format::PrettyJson);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert!(config.load_automatically);
    }

    #[test]
    fn missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persist.toml");
        assert!(matches!(load_config(&path), Err(ConfigError::Read { .. })));
        assert_eq!(load_or_default(&path), PersistConfig::default());
    }

    #[test]
    fn bad_format_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persist.toml");
        std::fs::write(&path, "format = \"xml\"").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Parse { .. })));
    }
}
