use crate::CoreError;
use modhost_schema::MANIFEST_FILE_NAME;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "modhost.toml";

/// Host settings, read from `modhost.toml`. Every key is optional.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ModHostConfig {
    /// Directory whose subdirectories are packages.
    pub mods_root: PathBuf,
    pub manifest_file: String,
    /// Extension of content files under a package's content paths.
    pub content_extension: String,
    /// Ticks between noticing a change and reloading the package.
    pub reload_delay_ticks: u32,
    pub hot_reload: bool,
}

impl Default for ModHostConfig {
    fn default() -> Self {
        Self {
            mods_root: PathBuf::from("mods"),
            manifest_file: MANIFEST_FILE_NAME.to_owned(),
            content_extension: "json".to_owned(),
            reload_delay_ticks: 1,
            hot_reload: true,
        }
    }
}

impl ModHostConfig {
    pub fn new(mods_root: impl Into<PathBuf>) -> Self {
        Self {
            mods_root: mods_root.into(),
            ..Self::default()
        }
    }

    pub fn parse_str(input: &str) -> Result<Self, CoreError> {
        toml::from_str(input).map_err(|e| CoreError::Config(format!("invalid config: {e}")))
    }

    /// Load from a file; a relative `mods_root` is taken relative to the
    /// file's directory.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::parse_str(&content)?;
        if config.mods_root.is_relative() {
            if let Some(dir) = path.parent() {
                config.mods_root = dir.join(&config.mods_root);
            }
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| CoreError::Config(format!("cannot serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
