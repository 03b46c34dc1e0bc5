//! Deck-knowledge annotation engine.
//!
//! Segments page text into tokens (with per-script pattern cascades for
//! Japanese, Korean and Chinese), classifies every token as known, unknown or
//! new against a flashcard deck's vocabulary, and re-applies that
//! classification to a live document as inline markers.
//!
//! Zero I/O: the flashcard store and the host document are reached through the
//! `CardStore` and `DocumentSurface` traits.

pub mod classify;
pub mod config;
pub mod constants;
pub mod document;
pub mod error;
pub mod message;
pub mod pipeline;
pub mod query;
pub mod reconcile;
pub mod script;
pub mod tokenizer;
pub mod vocabulary;

pub use classify::{Classifier, MatchMode, PageStats, WordClass, deck_percentage};
pub use config::{AnkiConfig, EngineConfig};
pub use constants::{KNOWN_INTERVAL_DAYS, QUERY_BATCH_SIZE, RENDER_DEBOUNCE_MS};
pub use document::{
    Container, Document, DocumentSurface, Inline, MarkerDescriptor, SegmentId, TextSegment,
};
pub use error::RpcError;
pub use message::ControlMessage;
pub use pipeline::{Analysis, AnalysisTicket, CachedPage, Pipeline, TokenizedFragment, normalize_url};
pub use query::{QueryFields, QueryMode, build_queries, escape_search, word_clause};
pub use reconcile::{ReconcileOutcome, ReconcileReport, Reconciler};
pub use script::{ScriptPolicy, ScriptTag, detect_script, has_cjk};
pub use tokenizer::{PageWordSet, TokenSpan, tokenize, tokenize_spans};
pub use vocabulary::{
    Bucket, CardId, CardStore, SnapshotFetch, VocabularyEntry, VocabularySnapshot,
    build_snapshot, strip_markup,
};
