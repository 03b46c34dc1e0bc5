//! Writing-system detection from Unicode code-point ranges.

use serde::{Deserialize, Serialize};

/// The writing system a fragment predominantly uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptTag {
    Japanese,
    Korean,
    Chinese,
    Other,
}

/// How Han-only text is attributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptPolicy {
    /// Kana make a fragment Japanese; Han without kana is Chinese.
    KanaDecides,
    /// Any kana or Han code point makes a fragment Japanese.
    #[default]
    HanIsJapanese,
}

impl ScriptPolicy {
    pub fn from_flag(han_only_is_japanese: bool) -> Self {
        if han_only_is_japanese {
            ScriptPolicy::HanIsJapanese
        } else {
            ScriptPolicy::KanaDecides
        }
    }
}

pub fn is_kana(c: char) -> bool {
    matches!(c, '\u{3040}'..='\u{309F}' | '\u{30A0}'..='\u{30FF}')
}

pub fn is_han(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}')
}

pub fn is_hangul(c: char) -> bool {
    matches!(c, '\u{AC00}'..='\u{D7AF}')
}

/// True if the text contains any Han, kana or Hangul code point.
/// Gates whether the cascading tokenizer runs at all.
pub fn has_cjk(text: &str) -> bool {
    text.chars().any(|c| is_han(c) || is_kana(c) || is_hangul(c))
}

/// Classify a fragment. Total: the empty string is `Other`.
pub fn detect_script(text: &str, policy: ScriptPolicy) -> ScriptTag {
    let mut kana = false;
    let mut han = false;
    let mut hangul = false;
    for c in text.chars() {
        kana |= is_kana(c);
        han |= is_han(c);
        hangul |= is_hangul(c);
    }

    let japanese = match policy {
        ScriptPolicy::KanaDecides => kana,
        ScriptPolicy::HanIsJapanese => kana || han,
    };

    if japanese {
        ScriptTag::Japanese
    } else if hangul {
        ScriptTag::Korean
    } else if han {
        ScriptTag::Chinese
    } else {
        ScriptTag::Other
    }
}
