//! Search expressions for the flashcard store.
//!
//! Words are escaped, turned into per-word clauses and OR'ed together in
//! batches of at most `batch_size` clauses, each batch scoped to one deck.

use crate::config::AnkiConfig;
use crate::script::has_cjk;

/// Which note fields a word clause searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Match against the word field and the reading field.
    WordAndReading,
    /// Match against the word field only.
    WordOnly,
}

impl QueryMode {
    pub fn from_flag(reading_alias: bool) -> Self {
        if reading_alias {
            QueryMode::WordAndReading
        } else {
            QueryMode::WordOnly
        }
    }
}

/// Field names interpolated into clauses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFields {
    pub word: String,
    pub reading: String,
}

impl From<&AnkiConfig> for QueryFields {
    fn from(config: &AnkiConfig) -> Self {
        Self {
            word: config.word_field.clone(),
            reading: config.reading_field.clone(),
        }
    }
}

impl Default for QueryFields {
    fn default() -> Self {
        Self::from(&AnkiConfig::default())
    }
}

/// Escape a literal for interpolation into a search expression.
///
/// Backslash is escaped first so the backslashes introduced for the other
/// four characters are not doubled.
pub fn escape_search(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace(':', "\\:")
        .replace('(', "\\(")
        .replace(')', "\\)")
        .trim()
        .to_string()
}

/// Build the clause for one already-escaped word.
///
/// CJK words are exact phrases; anything else is a prefix match.
pub fn word_clause(word: &str, fields: &QueryFields, mode: QueryMode) -> String {
    let QueryFields { word: wf, reading: rf } = fields;
    match (has_cjk(word), mode) {
        (true, QueryMode::WordAndReading) => format!("({wf}:\"{word}\" OR {rf}:\"{word}\")"),
        (true, QueryMode::WordOnly) => format!("{wf}:\"{word}\""),
        (false, QueryMode::WordAndReading) => format!("({wf}:{word}* OR {rf}:{word}*)"),
        (false, QueryMode::WordOnly) => format!("{wf}:{word}*"),
    }
}

/// Build one search expression per batch of at most `batch_size` words.
///
/// Words that are empty after escaping are dropped first, so `n` surviving
/// words always yield `ceil(n / batch_size)` expressions.
pub fn build_queries<'a>(
    deck: &str,
    words: impl IntoIterator<Item = &'a str>,
    fields: &QueryFields,
    mode: QueryMode,
    batch_size: usize,
) -> Vec<String> {
    let batch_size = batch_size.max(1);
    let deck = escape_search(deck);

    let clauses: Vec<String> = words
        .into_iter()
        .map(escape_search)
        .filter(|w| !w.is_empty())
        .map(|w| word_clause(&w, fields, mode))
        .collect();

    clauses
        .chunks(batch_size)
        .map(|batch| format!("deck:\"{deck}\" ({})", batch.join(" OR ")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn unescape(text: &str) -> String {
        text.replace("\\)", ")")
            .replace("\\(", "(")
            .replace("\\:", ":")
            .replace("\\\"", "\"")
            .replace("\\\\", "\\")
    }

    #[test]
    fn test_escape_each_character() {
        assert_eq!(escape_search(r#"a\b"#), r#"a\\b"#);
        assert_eq!(escape_search(r#"say "hi""#), r#"say \"hi\""#);
        assert_eq!(escape_search("a:b"), r"a\:b");
        assert_eq!(escape_search("(x)"), r"\(x\)");
        assert_eq!(escape_search("  padded  "), "padded");
    }

    #[test]
    fn test_escape_backslash_first() {
        // A quote becomes \" and must not then have its backslash doubled.
        assert_eq!(escape_search("\""), "\\\"");
    }

    #[test]
    fn test_cjk_clause_exact_phrase() {
        let fields = QueryFields::default();
        assert_eq!(
            word_clause("猫", &fields, QueryMode::WordAndReading),
            r#"(Word:"猫" OR Reading:"猫")"#
        );
        assert_eq!(word_clause("猫", &fields, QueryMode::WordOnly), r#"Word:"猫""#);
    }

    #[test]
    fn test_latin_clause_prefix() {
        let fields = QueryFields::default();
        assert_eq!(
            word_clause("cat", &fields, QueryMode::WordAndReading),
            "(Word:cat* OR Reading:cat*)"
        );
        assert_eq!(word_clause("cat", &fields, QueryMode::WordOnly), "Word:cat*");
    }

    #[test]
    fn test_build_queries_batches_and_scope() {
        let words = ["一", "二", "三", "四", "五", "六", "七"];
        let queries = build_queries(
            "Japanese::Core",
            words,
            &QueryFields::default(),
            QueryMode::WordOnly,
            5,
        );
        assert_eq!(queries.len(), 2);
        assert!(queries[0].starts_with(r#"deck:"Japanese\:\:Core" ("#));
        assert_eq!(queries[0].matches(" OR ").count(), 4);
        assert_eq!(queries[1], r#"deck:"Japanese\:\:Core" (Word:"六" OR Word:"七")"#);
    }

    #[test]
    fn test_build_queries_drops_blank_words() {
        let queries = build_queries(
            "d",
            ["  ", "", "cat"],
            &QueryFields::default(),
            QueryMode::WordOnly,
            5,
        );
        assert_eq!(queries, vec![r#"deck:"d" (Word:cat*)"#]);
    }

    #[test]
    fn test_build_queries_empty() {
        let queries = build_queries(
            "d",
            std::iter::empty(),
            &QueryFields::default(),
            QueryMode::WordAndReading,
            5,
        );
        assert!(queries.is_empty());
    }

    proptest! {
        #[test]
        fn prop_escape_roundtrip(text in r#"[a-z\\":() 猫]{0,30}"#) {
            prop_assert_eq!(unescape(&escape_search(&text)), text.trim());
        }

        #[test]
        fn prop_batch_count(words in proptest::collection::vec("[a-z猫犬]{1,6}", 0..40)) {
            let queries = build_queries(
                "deck",
                words.iter().map(String::as_str),
                &QueryFields::default(),
                QueryMode::WordAndReading,
                5,
            );
            prop_assert_eq!(queries.len(), words.len().div_ceil(5));
            for q in &queries {
                // Each clause in reading mode contributes one inner OR.
                let clauses = (q.matches(" OR ").count() + 1) / 2;
                prop_assert!(clauses <= 5);
            }
        }
    }
}
