//! Integration tests exercising the full pipeline:
//! tokenize → query → fetch → classify → reconcile, against an in-memory deck.

use std::sync::{LazyLock, Mutex};
use std::time::Instant;

use dv_core::{
    Analysis, AnkiConfig, CardId, CardStore, Document, DocumentSurface, EngineConfig, PageStats,
    Pipeline, RpcError, SnapshotFetch, WordClass,
};
use regex::Regex;
use serde_json::{Value, json};

static PHRASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(Word|Reading):"([^"]*)""#).unwrap());
static PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(Word|Reading):([^\s\x22()*]+)\*").unwrap());

struct Card {
    id: CardId,
    word: &'static str,
    reading: Option<&'static str>,
    interval: i64,
}

/// A deck that understands just enough of the search syntax to match the
/// clauses the engine produces.
#[derive(Default)]
struct FakeDeck {
    cards: Vec<Card>,
    searches: Mutex<Vec<String>>,
    info_calls: Mutex<usize>,
    fail_search_containing: Option<&'static str>,
    fail_all_searches: bool,
    fail_info: bool,
    extra_records: Vec<Value>,
}

impl FakeDeck {
    fn new(cards: Vec<Card>) -> Self {
        Self {
            cards,
            ..Self::default()
        }
    }

    fn searches(&self) -> Vec<String> {
        self.searches.lock().unwrap().clone()
    }
}

fn card(id: CardId, word: &'static str, reading: Option<&'static str>, interval: i64) -> Card {
    Card {
        id,
        word,
        reading,
        interval,
    }
}

impl CardStore for FakeDeck {
    async fn find_cards(&self, query: &str) -> Result<Vec<CardId>, RpcError> {
        self.searches.lock().unwrap().push(query.to_string());
        if self.fail_all_searches {
            return Err(RpcError::Transport("connection refused".into()));
        }
        if let Some(needle) = self.fail_search_containing
            && query.contains(needle)
        {
            return Err(RpcError::Store("collection is not available".into()));
        }

        let phrases: Vec<(&str, &str)> = PHRASE
            .captures_iter(query)
            .map(|c| (c.get(1).map_or("", |m| m.as_str()), c.get(2).map_or("", |m| m.as_str())))
            .collect();
        let prefixes: Vec<(&str, &str)> = PREFIX
            .captures_iter(query)
            .map(|c| (c.get(1).map_or("", |m| m.as_str()), c.get(2).map_or("", |m| m.as_str())))
            .collect();

        let field_of = |c: &Card, name: &str| match name {
            "Word" => Some(c.word),
            _ => c.reading,
        };
        Ok(self
            .cards
            .iter()
            .filter(|&c| {
                phrases
                    .iter()
                    .any(|&(field, v)| field_of(c, field) == Some(v))
                    || prefixes
                        .iter()
                        .any(|&(field, p)| field_of(c, field).is_some_and(|f| f.starts_with(p)))
            })
            .map(|c| c.id)
            .collect())
    }

    async fn cards_info(&self, cards: &[CardId]) -> Result<Vec<Value>, RpcError> {
        *self.info_calls.lock().unwrap() += 1;
        if self.fail_info {
            return Err(RpcError::Transport("connection reset".into()));
        }
        let mut records: Vec<Value> = self
            .cards
            .iter()
            .filter(|c| cards.contains(&c.id))
            .map(|c| {
                let mut fields = json!({ "Word": { "value": c.word, "order": 0 } });
                if let Some(r) = c.reading {
                    fields["Reading"] = json!({ "value": r, "order": 1 });
                }
                json!({ "cardId": c.id, "fields": fields, "interval": c.interval })
            })
            .collect();
        records.extend(self.extra_records.iter().cloned());
        Ok(records)
    }
}

fn enabled_pipeline(config: EngineConfig) -> Pipeline {
    let mut pipeline = Pipeline::new(config, &AnkiConfig::default());
    pipeline.set_enabled(true, "Japanese");
    pipeline
}

fn animal_deck() -> FakeDeck {
    FakeDeck::new(vec![
        card(1, "猫", Some("ねこ"), 30),
        card(2, "犬", Some("いぬ"), 3),
        card(3, "cat", None, 100),
    ])
}

/// Test 1: known, unknown and new words are counted and marked.
#[tokio::test]
async fn classify_and_mark_page() {
    let deck = animal_deck();
    let mut pipeline = enabled_pipeline(EngineConfig::default());
    let mut doc = Document::from_text("猫\n犬\n鳥");

    let stats = pipeline
        .analyze(&deck, &mut doc, "https://example.test/a", false)
        .await
        .expect("enabled pipeline should report stats");

    assert_eq!(
        stats,
        PageStats {
            known: 1,
            unknown: 1,
            new: 1,
            deck_percentage: Some(67),
        }
    );
    assert_eq!(
        doc.render_html(),
        "<span class=\"anki-highlight-known\">猫</span>\n\
         <span class=\"anki-highlight-unknown\">犬</span>\n鳥"
    );
}

/// Test 2: 12 distinct words go out as ceil(12/5) = 3 searches and one detail call.
#[tokio::test]
async fn searches_are_batched() {
    let deck = animal_deck();
    let mut pipeline = enabled_pipeline(EngineConfig::default());
    let mut doc = Document::from_text("alpha bravo charlie delta echo foxtrot golf hotel india juliet kilo lima");

    let stats = pipeline.analyze(&deck, &mut doc, "u", false).await.unwrap();

    let searches = deck.searches();
    assert_eq!(searches.len(), 3);
    for search in &searches {
        assert!(search.starts_with("deck:\"Japanese\" ("));
    }
    assert_eq!(*deck.info_calls.lock().unwrap(), 0, "no ids, so no detail call");
    assert_eq!(stats.new, 12);
}

/// Test 3: the reading alias matches in reading mode only.
#[tokio::test]
async fn reading_alias_is_configurable() {
    let deck = animal_deck();

    let mut with_readings = enabled_pipeline(EngineConfig::default());
    let mut doc = Document::from_text("ねこ");
    let stats = with_readings.analyze(&deck, &mut doc, "u", false).await.unwrap();
    assert_eq!(stats.known, 1);
    assert!(deck.searches()[0].contains("Reading:\"ねこ\""));

    let surface_only = EngineConfig {
        reading_alias: false,
        ..EngineConfig::default()
    };
    let deck = animal_deck();
    let mut without = enabled_pipeline(surface_only);
    let mut doc = Document::from_text("ねこ");
    let stats = without.analyze(&deck, &mut doc, "u", false).await.unwrap();
    assert_eq!(stats.known, 0);
    assert_eq!(stats.new, 1);
    assert!(!deck.searches()[0].contains("Reading"));
}

/// Test 4: one failed search loses only its own batch.
#[tokio::test]
async fn failed_search_is_partial() {
    let mut deck = animal_deck();
    deck.fail_search_containing = Some("犬");
    let config = EngineConfig {
        batch_size: 1,
        ..EngineConfig::default()
    };
    let mut pipeline = enabled_pipeline(config);
    let mut doc = Document::from_text("猫\n犬");

    let stats = pipeline.analyze(&deck, &mut doc, "u", false).await.unwrap();
    assert_eq!(deck.searches().len(), 2);
    assert_eq!(stats.known, 1);
    assert_eq!(stats.new, 1);
}

/// Test 5: a fully unreachable store degrades to all-new.
#[tokio::test]
async fn unreachable_store_degrades_to_new() {
    let mut deck = animal_deck();
    deck.fail_all_searches = true;
    let mut pipeline = enabled_pipeline(EngineConfig::default());
    let mut doc = Document::from_text("猫\n犬");

    let stats = pipeline.analyze(&deck, &mut doc, "u", false).await.unwrap();
    assert_eq!(
        stats,
        PageStats {
            known: 0,
            unknown: 0,
            new: 2,
            deck_percentage: Some(0),
        }
    );
    assert!(doc.markers().is_empty());
}

/// Test 6: a failed detail fetch leaves the previous vocabulary in place.
#[tokio::test]
async fn failed_detail_fetch_keeps_previous_snapshot() {
    let deck = animal_deck();
    let mut pipeline = enabled_pipeline(EngineConfig::default());
    let mut doc = Document::from_text("猫");
    pipeline.analyze(&deck, &mut doc, "u", false).await.unwrap();
    assert_eq!(pipeline.snapshot().len(), 1);

    let mut broken = animal_deck();
    broken.fail_info = true;
    let stats = pipeline.analyze(&broken, &mut doc, "u", true).await.unwrap();
    assert_eq!(stats.known, 1);
    assert_eq!(pipeline.snapshot().len(), 1);
}

/// Test 7: malformed records are skipped, the rest of the batch survives.
#[tokio::test]
async fn malformed_record_skipped() {
    let mut deck = animal_deck();
    deck.extra_records = vec![json!({ "cardId": 99, "fields": {} }), json!("garbage")];
    let mut pipeline = enabled_pipeline(EngineConfig::default());
    let mut doc = Document::from_text("猫\n犬");

    let stats = pipeline.analyze(&deck, &mut doc, "u", false).await.unwrap();
    assert_eq!(stats.known, 1);
    assert_eq!(stats.unknown, 1);
    assert_eq!(pipeline.snapshot().len(), 2);
}

/// Test 8: a result that lands after navigation is discarded.
#[tokio::test]
async fn result_after_navigation_is_discarded() {
    let deck = animal_deck();
    let mut pipeline = enabled_pipeline(EngineConfig::default());
    let mut doc = Document::from_text("猫");

    let Analysis::Fetch(ticket) = pipeline.begin_analysis(&doc, "https://example.test/1", false)
    else {
        panic!("expected a fetch");
    };
    let fetched = ticket.fetch(&deck).await;
    assert!(matches!(fetched, SnapshotFetch::Fresh(_)));

    pipeline.navigate("https://example.test/2");
    let result = pipeline.complete_analysis(ticket, fetched, &mut doc, Instant::now());

    assert!(result.is_none());
    assert!(pipeline.snapshot().is_empty());
    assert!(doc.markers().is_empty());
}

/// Test 9: second request for the same page is served from cache.
#[tokio::test]
async fn same_page_served_from_cache() {
    let deck = animal_deck();
    let mut pipeline = enabled_pipeline(EngineConfig::default());
    let mut doc = Document::from_text("猫");

    let first = pipeline.analyze(&deck, &mut doc, "u", false).await.unwrap();
    let searches = deck.searches().len();
    let second = pipeline.analyze(&deck, &mut doc, "u#frag", false).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(deck.searches().len(), searches);
}

/// Test 10: disabling clears markers; re-enabling re-renders.
#[tokio::test]
async fn toggle_off_and_on() {
    let deck = animal_deck();
    let mut pipeline = enabled_pipeline(EngineConfig::default());
    let mut doc = Document::from_text("猫");
    pipeline.analyze(&deck, &mut doc, "u", false).await.unwrap();
    assert_eq!(doc.markers().len(), 1);

    pipeline.set_enabled(false, "Japanese");
    assert_eq!(pipeline.clear_markers(&mut doc), 1);
    assert!(pipeline.analyze(&deck, &mut doc, "u", false).await.is_none());

    pipeline.set_enabled(true, "Japanese");
    pipeline.analyze(&deck, &mut doc, "u", true).await.unwrap();
    assert_eq!(doc.markers()[0].class, WordClass::Known);
}
