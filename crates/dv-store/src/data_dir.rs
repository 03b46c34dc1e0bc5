use std::path::{Path, PathBuf};
use std::{env, fs};

use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::store::SettingsStore;

pub const DATA_DIR_ENV: &str = "DV_DATA_DIR";
pub const CONFIG_FILE: &str = "config.toml";
pub const SETTINGS_FILE: &str = "settings.db";

/// `$DV_DATA_DIR` if set and non-empty, else `~/.deckview`.
pub fn default_base_dir() -> PathBuf {
    match env::var(DATA_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => dirs_home().join(".deckview"),
    }
}

fn dirs_home() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// The on-disk home of `config.toml` and `settings.db`.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Resolve and create the directory. `base_dir` overrides the default
    /// (for testing).
    pub fn open(base_dir: Option<&Path>) -> Result<Self> {
        let root = base_dir.map(PathBuf::from).unwrap_or_else(default_base_dir);
        fs::create_dir_all(&root).map_err(|e| {
            StoreError::InvalidData(format!("failed to create {}: {e}", root.display()))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    pub fn load_config(&self) -> Result<Config> {
        Config::load(&self.config_path())
    }

    pub fn open_settings(&self) -> Result<SettingsStore> {
        SettingsStore::open(&self.settings_path())
    }
}
