//! Script-aware tokenization.
//!
//! CJK text has no whitespace word boundaries, so each script gets a
//! priority cascade of patterns, most specific first. Every pattern runs over
//! a masked copy of the fragment: matched bytes are overwritten with spaces of
//! the same byte length, so offsets stay aligned with the original and a later,
//! more generic pattern can never re-claim characters an earlier one took.
//!
//! Text without CJK code points is lowercased, stripped of punctuation and
//! split on whitespace.

use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::script::{ScriptPolicy, ScriptTag, detect_script, has_cjk};

static NON_WORD_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());
static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w]").unwrap());
static PIECE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+").unwrap());

fn cascade(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).unwrap()).collect()
}

static JAPANESE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    cascade(&[
        r"[一-龯々]+[ぁ-ん]+",
        r"[一-龯々]+(?:する|できる|たい|な|に|の)",
        r"[一-龯々]{2,}",
        r"[ぁ-ん]{2,}",
        r"[一-龯々]",
        r"[ぁ-ん]+",
        r"[ァ-ヺー]+",
    ])
});

static KOREAN: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    cascade(&[
        r"[0-9０-９]+년[0-9０-９]+월[0-9０-９]+일",
        r"[0-9０-９]+시[0-9０-９]+분",
        r"[0-9０-９]+[개명원초대건장통분년월일주회차례]",
        r"[\x{AC00}-\x{D7AF}]+(?:하다|되다|스럽다|답다|적이다|같다|있다|없다|보다|싶다|만하다)",
        r"[\x{AC00}-\x{D7AF}]+[은는이가을를에서도와과의로부터까지처럼보다만이나마든지라며]+",
        r"[\x{AC00}-\x{D7AF}]+(?:공부|준비|시작|포기|노력|걱정|생각|시도|계획|희망|기대|상상|판단|결정|선택|고민|결심)하다",
        r"[\x{AC00}-\x{D7AF}]+",
        r"[0-9０-９]+",
    ])
});

static CHINESE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    cascade(&[
        r"[0-9０-９]+年[0-9０-９]+月[0-9０-９]+[日號号]",
        r"[0-9０-９]+[时時][0-9０-９]+分",
        r"[0-9０-９]+[个個件條条份張张包双對对]",
        r"[一二三四五六七八九十百千万億]{1,2}[个個件條条份張张包双對对]",
        r"[一-龯々]{2}(?:时间|地方|东西|事情|问题|工作|学习|生活|历史|文化|社会|国家|世界|科技|经济|政治|教育|研究|发展|管理)",
        r"[一-龯々]{2}",
        r"[一-龯々]",
        r"[0-9０-９]+",
    ])
});

/// A token together with the byte range it occupies in its fragment.
///
/// `text` is the classification key. For CJK tokens it is the trimmed match;
/// for whitespace-split text it is the lowercased, punctuation-stripped form
/// of the raw piece at `range` (and may be empty for pure punctuation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSpan {
    pub text: String,
    pub range: Range<usize>,
}

/// Tokenize a fragment into classification keys.
pub fn tokenize(text: &str, policy: ScriptPolicy) -> Vec<String> {
    if !has_cjk(text) {
        return tokenize_plain(text);
    }
    tokenize_script(text, detect_script(text, policy))
}

/// Whitespace fallback: lowercase, strip non-word/non-space characters,
/// split on whitespace runs, drop empties.
pub fn tokenize_plain(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    NON_WORD_SPACE
        .replace_all(&lowered, "")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Run the cascade for an explicit script. Tokens come out in pattern
/// priority order, not document order.
pub fn tokenize_script(text: &str, script: ScriptTag) -> Vec<String> {
    script_spans(text, script)
        .into_iter()
        .map(|span| span.text)
        .collect()
}

/// Token spans for a fragment, in discovery order.
pub fn tokenize_spans(text: &str, policy: ScriptPolicy) -> Vec<TokenSpan> {
    if !has_cjk(text) {
        return plain_spans(text);
    }
    script_spans(text, detect_script(text, policy))
}

pub fn script_spans(text: &str, script: ScriptTag) -> Vec<TokenSpan> {
    match script {
        ScriptTag::Japanese => apply_cascade(text, &JAPANESE),
        ScriptTag::Korean => apply_cascade(text, &KOREAN),
        ScriptTag::Chinese => apply_cascade(text, &CHINESE),
        // No cascade for this script: the whole fragment is one token.
        ScriptTag::Other => trimmed_span(text, 0..text.len()).into_iter().collect(),
    }
}

/// One span per whitespace-separated piece, keyed by its cleaned form.
fn plain_spans(text: &str) -> Vec<TokenSpan> {
    PIECE
        .find_iter(text)
        .map(|m| TokenSpan {
            text: clean_word(m.as_str()),
            range: m.range(),
        })
        .collect()
}

/// Lowercase and drop every non-word character.
pub fn clean_word(word: &str) -> String {
    NON_WORD.replace_all(&word.to_lowercase(), "").into_owned()
}

fn apply_cascade(text: &str, patterns: &[Regex]) -> Vec<TokenSpan> {
    let mut masked = text.to_string();
    let mut spans = Vec::new();

    for pattern in patterns {
        let claimed: Vec<Range<usize>> = pattern.find_iter(&masked).map(|m| m.range()).collect();
        for range in claimed {
            if let Some(span) = trimmed_span(text, range.clone()) {
                spans.push(span);
            }
            // Same byte length, so every later offset still maps onto `text`.
            masked.replace_range(range.clone(), &" ".repeat(range.len()));
        }
    }

    spans
}

fn trimmed_span(text: &str, range: Range<usize>) -> Option<TokenSpan> {
    let raw = &text[range.clone()];
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let start = range.start + (raw.len() - raw.trim_start().len());
    Some(TokenSpan {
        text: trimmed.to_string(),
        range: start..start + trimmed.len(),
    })
}

/// The distinct tokens observed across every fragment of a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageWordSet {
    words: BTreeSet<String>,
}

impl PageWordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokenize every fragment and collect the distinct tokens.
    pub fn from_fragments<'a>(
        fragments: impl IntoIterator<Item = &'a str>,
        policy: ScriptPolicy,
    ) -> Self {
        let mut set = Self::new();
        for fragment in fragments {
            for token in tokenize(fragment, policy) {
                set.insert(&token);
            }
        }
        set
    }

    /// Insert a token, trimmed. Returns false for blank or duplicate tokens.
    pub fn insert(&mut self, token: &str) -> bool {
        let token = token.trim();
        if token.is_empty() {
            return false;
        }
        self.words.insert(token.to_string())
    }

    pub fn contains(&self, token: &str) -> bool {
        self.words.contains(token)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(String::as_str)
    }
}

impl<'a> FromIterator<&'a str> for PageWordSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut set = Self::new();
        for token in iter {
            set.insert(token);
        }
        set
    }
}
