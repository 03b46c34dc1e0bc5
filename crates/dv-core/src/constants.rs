/// Retention interval (days) above which a card counts as known.
pub const KNOWN_INTERVAL_DAYS: i64 = 21;

/// Maximum word clauses OR'ed into a single store search expression.
pub const QUERY_BATCH_SIZE: usize = 5;

/// Minimum spacing between two document renders, in milliseconds.
pub const RENDER_DEBOUNCE_MS: u64 = 1000;

/// AnkiConnect protocol version sent with every request.
pub const ANKI_CONNECT_VERSION: u32 = 6;

/// Default AnkiConnect endpoint.
pub const ANKI_CONNECT_ENDPOINT: &str = "http://localhost:8765";

/// Note field holding the surface form of a word.
pub const DEFAULT_WORD_FIELD: &str = "Word";

/// Note field holding the phonetic reading of a word.
pub const DEFAULT_READING_FIELD: &str = "Reading";

/// Marker class names, as rendered into the host document.
pub const CLASS_KNOWN: &str = "anki-highlight-known";
pub const CLASS_UNKNOWN: &str = "anki-highlight-unknown";
pub const CLASS_NEW: &str = "anki-highlight-new";
