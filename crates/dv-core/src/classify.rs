//! Token classification against a vocabulary snapshot, and page statistics.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::constants::{CLASS_KNOWN, CLASS_NEW, CLASS_UNKNOWN};
use crate::tokenizer::PageWordSet;
use crate::vocabulary::{Bucket, VocabularyEntry, VocabularySnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WordClass {
    Known,
    Unknown,
    New,
}

impl WordClass {
    /// Class name of the marker rendered for this class.
    pub fn css_class(self) -> &'static str {
        match self {
            WordClass::Known => CLASS_KNOWN,
            WordClass::Unknown => CLASS_UNKNOWN,
            WordClass::New => CLASS_NEW,
        }
    }
}

impl From<Bucket> for WordClass {
    fn from(bucket: Bucket) -> Self {
        match bucket {
            Bucket::Known => WordClass::Known,
            Bucket::Unknown => WordClass::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Surface or reading; each entry counted once per page.
    Reading,
    /// Exact surface membership; each token counted on its own.
    SurfaceOnly,
}

impl MatchMode {
    pub fn from_flag(reading_alias: bool) -> Self {
        if reading_alias {
            MatchMode::Reading
        } else {
            MatchMode::SurfaceOnly
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageStats {
    pub known: usize,
    pub unknown: usize,
    pub new: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deck_percentage: Option<u8>,
}

/// Share of distinct words found in the deck, rounded to a whole percent.
pub fn deck_percentage(in_deck: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((in_deck as f64 / total as f64) * 100.0).round() as u8
}

#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    pub mode: MatchMode,
}

impl Classifier {
    pub fn new(mode: MatchMode) -> Self {
        Self { mode }
    }

    /// The entry a token resolves to. Known beats Unknown; within a bucket a
    /// surface match beats a reading match.
    pub fn resolve<'s>(
        &self,
        token: &str,
        snapshot: &'s VocabularySnapshot,
    ) -> Option<&'s VocabularyEntry> {
        let token = token.trim();
        match self.mode {
            MatchMode::SurfaceOnly => snapshot.get(token),
            MatchMode::Reading => [Bucket::Known, Bucket::Unknown].into_iter().find_map(|bucket| {
                snapshot
                    .by_surface(token, bucket)
                    .or_else(|| snapshot.by_reading(token, bucket))
            }),
        }
    }

    pub fn classify(&self, token: &str, snapshot: &VocabularySnapshot) -> WordClass {
        self.resolve(token, snapshot)
            .map(|entry| entry.bucket.into())
            .unwrap_or(WordClass::New)
    }

    /// Count known/unknown/new over the distinct words of a page.
    ///
    /// In reading mode an entry reached by several tokens is counted once; the
    /// later tokens add to no bucket but still count toward the total.
    pub fn page_stats(
        &self,
        words: &PageWordSet,
        snapshot: &VocabularySnapshot,
        report_percentage: bool,
    ) -> PageStats {
        let mut stats = PageStats::default();
        let mut counted: HashSet<&str> = HashSet::new();

        for word in words.iter() {
            match self.resolve(word, snapshot) {
                None => stats.new += 1,
                Some(entry) => {
                    if self.mode == MatchMode::Reading && !counted.insert(entry.surface.as_str()) {
                        continue;
                    }
                    match entry.bucket {
                        Bucket::Known => stats.known += 1,
                        Bucket::Unknown => stats.unknown += 1,
                    }
                }
            }
        }

        if report_percentage {
            stats.deck_percentage = Some(deck_percentage(stats.known + stats.unknown, words.len()));
        }
        stats
    }
}
