//! Engine switches and store field mapping.
//!
//! Both structs deserialize with every key optional, so a partial
//! `config.toml` section only overrides what it names.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classify::MatchMode;
use crate::constants::{
    ANKI_CONNECT_ENDPOINT, ANKI_CONNECT_VERSION, DEFAULT_READING_FIELD, DEFAULT_WORD_FIELD,
    KNOWN_INTERVAL_DAYS, QUERY_BATCH_SIZE, RENDER_DEBOUNCE_MS,
};
use crate::query::QueryMode;
use crate::script::ScriptPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Match tokens against readings as well as surface forms.
    pub reading_alias: bool,
    /// Wrap new tokens in a marker of their own.
    pub mark_new: bool,
    /// Include `deckPercentage` in reported stats.
    pub report_percentage: bool,
    pub debounce_ms: u64,
    pub batch_size: usize,
    /// Cards with an interval strictly above this are known.
    pub known_interval: i64,
    /// Read Han-only text as Japanese. Off reads it as Chinese.
    pub han_only_is_japanese: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reading_alias: true,
            mark_new: false,
            report_percentage: true,
            debounce_ms: RENDER_DEBOUNCE_MS,
            batch_size: QUERY_BATCH_SIZE,
            known_interval: KNOWN_INTERVAL_DAYS,
            han_only_is_japanese: true,
        }
    }
}

impl EngineConfig {
    pub fn script_policy(&self) -> ScriptPolicy {
        ScriptPolicy::from_flag(self.han_only_is_japanese)
    }

    pub fn match_mode(&self) -> MatchMode {
        MatchMode::from_flag(self.reading_alias)
    }

    pub fn query_mode(&self) -> QueryMode {
        QueryMode::from_flag(self.reading_alias)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnkiConfig {
    pub endpoint: String,
    pub version: u32,
    pub word_field: String,
    pub reading_field: String,
    pub timeout_secs: u64,
}

impl Default for AnkiConfig {
    fn default() -> Self {
        Self {
            endpoint: ANKI_CONNECT_ENDPOINT.to_string(),
            version: ANKI_CONNECT_VERSION,
            word_field: DEFAULT_WORD_FIELD.to_string(),
            reading_field: DEFAULT_READING_FIELD.to_string(),
            timeout_secs: 5,
        }
    }
}
