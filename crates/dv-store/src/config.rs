//! `config.toml` loading.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use dv_core::{AnkiConfig, EngineConfig, QUERY_BATCH_SIZE};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub anki: AnkiConfig,
}

impl Config {
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => {
                let config = Self::parse(&content).map_err(|e| match e {
                    StoreError::Config(msg) => {
                        StoreError::Config(format!("{}: {msg}", path.display()))
                    }
                    other => other,
                })?;
                tracing::debug!(path = %path.display(), "config loaded");
                Ok(config)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(StoreError::Config(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    fn validate(&self) -> Result<()> {
        // The store rejects searches with more word clauses than this.
        if !(1..=QUERY_BATCH_SIZE).contains(&self.engine.batch_size) {
            return Err(StoreError::Config(format!(
                "engine.batch_size must be between 1 and {QUERY_BATCH_SIZE}, got {}",
                self.engine.batch_size
            )));
        }
        if self.anki.endpoint.trim().is_empty() {
            return Err(StoreError::Config("anki.endpoint must not be empty".into()));
        }
        if self.anki.word_field.trim().is_empty() {
            return Err(StoreError::Config("anki.word_field must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_default() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::parse(
            r#"
            [engine]
            mark_new = true
            han_only_is_japanese = false

            [anki]
            endpoint = "http://127.0.0.1:9999"
            reading_field = "Kana"
            "#,
        )
        .unwrap();
        assert!(config.engine.mark_new);
        assert!(!config.engine.han_only_is_japanese);
        assert!(config.engine.reading_alias);
        assert_eq!(config.engine.batch_size, 5);
        assert_eq!(config.anki.endpoint, "http://127.0.0.1:9999");
        assert_eq!(config.anki.reading_field, "Kana");
        assert_eq!(config.anki.word_field, "Word");
    }

    #[test]
    fn test_rejects_zero_batch() {
        let err = Config::parse("[engine]\nbatch_size = 0\n").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn test_batch_size_bounds() {
        let err = Config::parse("[engine]\nbatch_size = 50\n").unwrap_err();
        assert!(err.to_string().contains("between 1 and 5"), "{err}");
        let config = Config::parse("[engine]\nbatch_size = 5\n").unwrap();
        assert_eq!(config.engine.batch_size, 5);
    }

    #[test]
    fn test_rejects_bad_toml() {
        assert!(matches!(
            Config::parse("[engine\n"),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[engine]\nreport_percentage = false\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert!(!config.engine.report_percentage);
    }
}
