use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{Result, StoreError};
use crate::schema;

const KEY_ENABLED: &str = "is_enabled";
const KEY_DECK: &str = "selected_deck";

/// Persistent key-value settings: the toggle state and the selected deck.
pub struct SettingsStore {
    conn: Connection,
}

impl SettingsStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Fold the WAL back into the main file and truncate it.
    pub fn checkpoint_truncate(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM settings WHERE key = ?1", [key])?;
        Ok(n > 0)
    }

    /// All settings, ordered by key.
    pub fn all(&self) -> Result<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM settings ORDER BY key")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // --- Typed accessors ---

    /// Defaults to off when never set.
    pub fn is_enabled(&self) -> Result<bool> {
        match self.get(KEY_ENABLED)?.as_deref() {
            None => Ok(false),
            Some("true") => Ok(true),
            Some("false") => Ok(false),
            Some(other) => Err(StoreError::InvalidData(format!(
                "{KEY_ENABLED} must be true or false, got '{other}'"
            ))),
        }
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.set(KEY_ENABLED, if enabled { "true" } else { "false" })
    }

    /// Empty when no deck has been chosen.
    pub fn selected_deck(&self) -> Result<String> {
        Ok(self.get(KEY_DECK)?.unwrap_or_default())
    }

    pub fn set_selected_deck(&self, deck: &str) -> Result<()> {
        self.set(KEY_DECK, deck.trim())
    }

    /// Persist a toggle in one transaction.
    pub fn save_toggle(&self, enabled: bool, deck: &str) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        self.set_enabled(enabled)?;
        self.set_selected_deck(deck)?;
        tx.commit()?;
        tracing::debug!(enabled, deck = deck.trim(), "toggle persisted");
        Ok(())
    }
}
