//! The analysis pipeline and the state it owns.
//!
//! A run is split around its one suspend point, the vocabulary fetch:
//! `begin_analysis` tokenizes the page and returns a ticket, the ticket fetches
//! without borrowing the pipeline, and `complete_analysis` installs the
//! result. Every state change that invalidates the page (navigation, toggle,
//! forced refresh) bumps the generation, and a ticket from an older
//! generation is discarded on completion.

use std::time::Instant;

use crate::classify::{Classifier, PageStats};
use crate::config::{AnkiConfig, EngineConfig};
use crate::document::DocumentSurface;
use crate::query::QueryFields;
use crate::reconcile::{ReconcileOutcome, Reconciler};
use crate::tokenizer::{PageWordSet, TokenSpan, tokenize_spans};
use crate::vocabulary::{CardStore, SnapshotFetch, VocabularySnapshot, build_snapshot};

/// A text fragment and its token spans, reused by renders while the text is
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizedFragment {
    pub text: String,
    pub spans: Vec<TokenSpan>,
}

/// Per-page result cache, keyed by normalized URL.
#[derive(Debug, Clone)]
pub struct CachedPage {
    pub url: String,
    pub stats: PageStats,
    pub fragments: Vec<TokenizedFragment>,
}

#[derive(Debug)]
pub enum Analysis {
    /// Feature off, or no deck selected.
    Disabled,
    /// Same page as last time and no refresh requested.
    Cached(PageStats),
    /// The page has no words; nothing to fetch.
    Empty(PageStats),
    /// Vocabulary must be fetched before stats can be computed.
    Fetch(AnalysisTicket),
}

/// Everything a vocabulary fetch needs, detached from the pipeline.
#[derive(Debug)]
pub struct AnalysisTicket {
    generation: u64,
    url: String,
    deck: String,
    words: PageWordSet,
    fragments: Vec<TokenizedFragment>,
    engine: EngineConfig,
    fields: QueryFields,
}

impl AnalysisTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn words(&self) -> &PageWordSet {
        &self.words
    }

    pub async fn fetch<S: CardStore + Sync>(&self, store: &S) -> SnapshotFetch {
        build_snapshot(store, &self.deck, &self.words, &self.engine, &self.fields).await
    }
}

/// Trim, and drop the `#fragment` unless it is a hash route (`#/`, `#!`).
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    match url.find('#') {
        Some(i) if !(url[i..].starts_with("#/") || url[i..].starts_with("#!")) => {
            url[..i].to_string()
        }
        _ => url.to_string(),
    }
}

pub struct Pipeline {
    engine: EngineConfig,
    fields: QueryFields,
    classifier: Classifier,
    enabled: bool,
    deck: String,
    snapshot: VocabularySnapshot,
    cache: Option<CachedPage>,
    current_url: String,
    generation: u64,
    reconciler: Reconciler,
}

impl Pipeline {
    pub fn new(engine: EngineConfig, anki: &AnkiConfig) -> Self {
        Self {
            classifier: Classifier::new(engine.match_mode()),
            reconciler: Reconciler::new(&engine),
            fields: QueryFields::from(anki),
            engine,
            enabled: false,
            deck: String::new(),
            snapshot: VocabularySnapshot::new(),
            cache: None,
            current_url: String::new(),
            generation: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.engine
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn deck(&self) -> &str {
        &self.deck
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn current_url(&self) -> &str {
        &self.current_url
    }

    pub fn snapshot(&self) -> &VocabularySnapshot {
        &self.snapshot
    }

    pub fn cached_page(&self) -> Option<&CachedPage> {
        self.cache.as_ref()
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Forget the cached page and orphan any in-flight analysis.
    pub fn invalidate(&mut self) {
        self.generation += 1;
        self.cache = None;
    }

    /// Apply a toggle. Always invalidates the page, so in-flight results from
    /// before the toggle are dropped.
    pub fn set_enabled(&mut self, enabled: bool, deck: &str) {
        self.enabled = enabled;
        self.deck = deck.trim().to_string();
        self.invalidate();
        tracing::info!(enabled, deck = %self.deck, "analysis toggled");
    }

    /// Navigation signal. Returns true if the page actually changed.
    pub fn navigate(&mut self, url: &str) -> bool {
        let url = normalize_url(url);
        if url == self.current_url {
            return false;
        }
        tracing::debug!(from = %self.current_url, to = %url, "page changed");
        self.current_url = url;
        self.invalidate();
        true
    }

    pub fn begin_analysis<D: DocumentSurface + ?Sized>(
        &mut self,
        surface: &D,
        url: &str,
        force: bool,
    ) -> Analysis {
        if !self.enabled || self.deck.is_empty() {
            return Analysis::Disabled;
        }

        self.navigate(url);
        if !force
            && let Some(page) = &self.cache
            && page.url == self.current_url
        {
            return Analysis::Cached(page.stats);
        }
        if force {
            self.invalidate();
        } else {
            self.cache = None;
        }

        let policy = self.engine.script_policy();
        let mut words = PageWordSet::new();
        let mut fragments: Vec<TokenizedFragment> = Vec::new();
        for segment in surface.text_segments() {
            if fragments.iter().any(|f| f.text == segment.text) {
                continue;
            }
            let spans = tokenize_spans(&segment.text, policy);
            if spans.iter().all(|s| s.text.trim().is_empty()) {
                continue;
            }
            for span in &spans {
                words.insert(&span.text);
            }
            fragments.push(TokenizedFragment {
                text: segment.text,
                spans,
            });
        }

        if words.is_empty() {
            let stats = self
                .classifier
                .page_stats(&words, &self.snapshot, self.engine.report_percentage);
            self.cache = Some(CachedPage {
                url: self.current_url.clone(),
                stats,
                fragments,
            });
            return Analysis::Empty(stats);
        }

        Analysis::Fetch(AnalysisTicket {
            generation: self.generation,
            url: self.current_url.clone(),
            deck: self.deck.clone(),
            words,
            fragments,
            engine: self.engine.clone(),
            fields: self.fields.clone(),
        })
    }

    /// Install a fetch result. Returns `None` if the ticket is stale.
    pub fn complete_analysis<D: DocumentSurface + ?Sized>(
        &mut self,
        ticket: AnalysisTicket,
        fetched: SnapshotFetch,
        surface: &mut D,
        now: Instant,
    ) -> Option<PageStats> {
        if ticket.generation != self.generation || ticket.url != self.current_url {
            tracing::debug!(
                ticket = ticket.generation,
                current = self.generation,
                "discarding stale analysis"
            );
            return None;
        }

        if let SnapshotFetch::Fresh(snapshot) = fetched {
            self.snapshot = snapshot;
        }

        let stats = self.classifier.page_stats(
            &ticket.words,
            &self.snapshot,
            self.engine.report_percentage,
        );
        let page = self.cache.insert(CachedPage {
            url: ticket.url,
            stats,
            fragments: ticket.fragments,
        });
        self.reconciler.reconcile_with_fragments(
            surface,
            &self.snapshot,
            &self.classifier,
            &page.fragments,
            now,
        );
        Some(stats)
    }

    /// Begin, fetch and complete in one go, for callers that own the pipeline
    /// for the whole run.
    pub async fn analyze<S, D>(
        &mut self,
        store: &S,
        surface: &mut D,
        url: &str,
        force: bool,
    ) -> Option<PageStats>
    where
        S: CardStore + Sync,
        D: DocumentSurface + ?Sized,
    {
        match self.begin_analysis(surface, url, force) {
            Analysis::Disabled => None,
            Analysis::Cached(stats) | Analysis::Empty(stats) => Some(stats),
            Analysis::Fetch(ticket) => {
                let fetched = ticket.fetch(store).await;
                self.complete_analysis(ticket, fetched, surface, Instant::now())
            }
        }
    }

    /// Re-apply the current classification after the document mutated.
    /// `None` while disabled.
    pub fn render<D: DocumentSurface + ?Sized>(
        &mut self,
        surface: &mut D,
        now: Instant,
    ) -> Option<ReconcileOutcome> {
        if !self.enabled {
            return None;
        }
        let fragments = self
            .cache
            .as_ref()
            .map(|page| page.fragments.as_slice())
            .unwrap_or_default();
        Some(self.reconciler.reconcile_with_fragments(
            surface,
            &self.snapshot,
            &self.classifier,
            fragments,
            now,
        ))
    }

    pub fn clear_markers<D: DocumentSurface + ?Sized>(&mut self, surface: &mut D) -> usize {
        self.reconciler.clear(surface)
    }
}
