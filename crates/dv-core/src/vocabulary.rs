//! Deck vocabulary: card records decoded into known/unknown entries.
//!
//! The snapshot is rebuilt wholesale on every fetch. A surface form lives in
//! exactly one bucket; when the store returns contradictory records for the
//! same surface, the last one wins.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;

use futures_util::future::join_all;
use scraper::Html;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::EngineConfig;
use crate::error::{Result, RpcError};
use crate::query::{QueryFields, build_queries};
use crate::tokenizer::PageWordSet;

pub type CardId = i64;

/// The flashcard store, as seen by the engine.
pub trait CardStore {
    /// Run one search expression, returning matching card ids.
    fn find_cards(&self, query: &str) -> impl Future<Output = Result<Vec<CardId>>> + Send;

    /// Fetch full records for a set of card ids.
    fn cards_info(&self, cards: &[CardId]) -> impl Future<Output = Result<Vec<Value>>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Known,
    Unknown,
}

impl Bucket {
    pub fn from_interval(interval: i64, known_interval: i64) -> Self {
        if interval > known_interval {
            Bucket::Known
        } else {
            Bucket::Unknown
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabularyEntry {
    pub surface: String,
    pub reading: Option<String>,
    pub bucket: Bucket,
}

impl VocabularyEntry {
    pub fn new(surface: &str, reading: Option<&str>, bucket: Bucket) -> Self {
        Self {
            surface: surface.to_string(),
            reading: reading.map(str::to_string),
            bucket,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VocabularySnapshot {
    entries: HashMap<String, VocabularyEntry>,
    /// reading -> surfaces carrying it, oldest first.
    readings: HashMap<String, Vec<String>>,
}

impl VocabularySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = VocabularyEntry>) -> Self {
        let mut snapshot = Self::new();
        for entry in entries {
            snapshot.insert(entry);
        }
        snapshot
    }

    /// Insert or replace the entry for a surface form.
    pub fn insert(&mut self, entry: VocabularyEntry) {
        if let Some(old) = self.entries.remove(&entry.surface)
            && let Some(reading) = old.reading
            && let Some(surfaces) = self.readings.get_mut(&reading)
        {
            surfaces.retain(|s| s != &old.surface);
            if surfaces.is_empty() {
                self.readings.remove(&reading);
            }
        }

        if let Some(reading) = &entry.reading {
            self.readings
                .entry(reading.clone())
                .or_default()
                .push(entry.surface.clone());
        }
        self.entries.insert(entry.surface.clone(), entry);
    }

    pub fn get(&self, surface: &str) -> Option<&VocabularyEntry> {
        self.entries.get(surface)
    }

    /// Find the entry in `bucket` whose surface equals `token`.
    pub fn by_surface(&self, token: &str, bucket: Bucket) -> Option<&VocabularyEntry> {
        self.entries.get(token).filter(|e| e.bucket == bucket)
    }

    /// Find the oldest entry in `bucket` whose reading equals `token`.
    pub fn by_reading(&self, token: &str, bucket: Bucket) -> Option<&VocabularyEntry> {
        self.readings
            .get(token)?
            .iter()
            .filter_map(|s| self.entries.get(s))
            .find(|e| e.bucket == bucket)
    }

    pub fn contains_surface(&self, surface: &str) -> bool {
        self.entries.contains_key(surface)
    }

    pub fn count(&self, bucket: Bucket) -> usize {
        self.entries.values().filter(|e| e.bucket == bucket).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &VocabularyEntry> {
        self.entries.values()
    }
}

/// Reduce a field value to its text content: the field is parsed as an HTML
/// fragment and its text nodes are concatenated, entities decoded.
pub fn strip_markup(html: &str) -> String {
    Html::parse_fragment(html).root_element().text().collect()
}

#[derive(Debug, Deserialize)]
struct CardRecord {
    fields: HashMap<String, FieldValue>,
    interval: i64,
}

#[derive(Debug, Deserialize)]
struct FieldValue {
    value: String,
}

/// Decode one card record. A failure here affects only this record.
pub fn decode_card(
    record: &Value,
    fields: &QueryFields,
    known_interval: i64,
) -> Result<VocabularyEntry> {
    let card = CardRecord::deserialize(record)?;

    let word = card
        .fields
        .get(&fields.word)
        .ok_or_else(|| RpcError::Decode(format!("card has no '{}' field", fields.word)))?;
    let surface = strip_markup(&word.value).trim().to_string();
    if surface.is_empty() {
        return Err(RpcError::Decode(format!("empty '{}' field", fields.word)));
    }

    let reading = card
        .fields
        .get(&fields.reading)
        .map(|f| strip_markup(&f.value).trim().to_string())
        .filter(|r| !r.is_empty());

    Ok(VocabularyEntry {
        surface,
        reading,
        bucket: Bucket::from_interval(card.interval, known_interval),
    })
}

/// Result of one vocabulary fetch.
#[derive(Debug)]
pub enum SnapshotFetch {
    /// A fresh snapshot to install in place of the old one.
    Fresh(VocabularySnapshot),
    /// Nothing usable came back; keep the previous snapshot.
    Unavailable,
}

/// Search the deck for every page word, then fetch and decode the matches.
///
/// Searches run concurrently and their ids are unioned. A failed search
/// contributes nothing. If all searches fail, or the detail fetch fails, the
/// outcome is `Unavailable`.
pub async fn build_snapshot<S: CardStore + Sync>(
    store: &S,
    deck: &str,
    words: &PageWordSet,
    engine: &EngineConfig,
    fields: &QueryFields,
) -> SnapshotFetch {
    let queries = build_queries(
        deck,
        words.iter(),
        fields,
        engine.query_mode(),
        engine.batch_size,
    );
    if queries.is_empty() {
        return SnapshotFetch::Fresh(VocabularySnapshot::new());
    }

    let results = join_all(queries.iter().map(|q| store.find_cards(q))).await;

    let mut ids: BTreeSet<CardId> = BTreeSet::new();
    let mut failed = 0;
    for (query, result) in queries.iter().zip(results) {
        match result {
            Ok(found) => ids.extend(found),
            Err(e) => {
                failed += 1;
                tracing::warn!(query = %query, "card search failed: {e}");
            }
        }
    }

    if failed == queries.len() {
        tracing::warn!("all {failed} card searches failed, keeping previous vocabulary");
        return SnapshotFetch::Unavailable;
    }
    if ids.is_empty() {
        return SnapshotFetch::Fresh(VocabularySnapshot::new());
    }

    let ids: Vec<CardId> = ids.into_iter().collect();
    let records = match store.cards_info(&ids).await {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!(cards = ids.len(), "card detail fetch failed: {e}");
            return SnapshotFetch::Unavailable;
        }
    };

    let mut snapshot = VocabularySnapshot::new();
    for record in &records {
        match decode_card(record, fields, engine.known_interval) {
            Ok(entry) => snapshot.insert(entry),
            Err(e) => tracing::debug!("skipping card record: {e}"),
        }
    }

    tracing::debug!(
        searches = queries.len(),
        failed,
        cards = ids.len(),
        entries = snapshot.len(),
        "vocabulary snapshot built"
    );
    SnapshotFetch::Fresh(snapshot)
}
