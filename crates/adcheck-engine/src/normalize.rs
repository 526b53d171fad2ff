//! Character canonicalization for advertisement text
//!
//! Two forms are produced:
//! - Display form: NFC, full-width → half-width, ASCII lowercase, and runs of
//!   spaces between words collapsed to one.
//! - Matching form: display folding plus katakana → hiragana, with every
//!   whitespace character dropped. Each kept character remembers the index of
//!   the original character that produced it, so matches found in the
//!   matching form can be reported against the user's own text.

use shared_types::TextPosition;
use unicode_normalization::UnicodeNormalization;

/// Distance between a katakana code point and its hiragana counterpart
const KANA_SHIFT: u32 = 0x60;

/// Distance between full-width ASCII variants and ASCII
const FULL_WIDTH_SHIFT: u32 = 0xFEE0;

/// Text in matching form plus its offset map back to the original
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedText {
    text: String,
    offsets: Vec<usize>,
}

impl NormalizedText {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// `offsets()[i]` is the character index in the original text that
    /// produced normalized character `i`
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Length in characters
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Map the normalized character span `[start, end)` back to the original
    ///
    /// Panics when the span is empty or outside the map: either one means the
    /// caller computed offsets against some other string.
    pub fn original_span(&self, start: usize, end: usize) -> TextPosition {
        assert!(
            start < end && end <= self.offsets.len(),
            "normalized span {start}..{end} outside offset map of length {}",
            self.offsets.len()
        );
        TextPosition::new(self.offsets[start], self.offsets[end - 1] + 1)
    }

    pub fn into_parts(self) -> (String, Vec<usize>) {
        (self.text, self.offsets)
    }
}

/// Canonicalize text for display (whitespace kept, runs collapsed)
pub fn normalize_display(text: &str) -> String {
    let folded: Vec<char> = text.chars().map(fold_char).collect();
    let mut out = String::with_capacity(text.len());

    let mut i = 0;
    while i < folded.len() {
        if folded[i] != ' ' {
            out.push(folded[i]);
            i += 1;
            continue;
        }

        let run_end = folded[i..]
            .iter()
            .position(|&c| c != ' ')
            .map_or(folded.len(), |p| i + p);
        let between_words = i > 0
            && !folded[i - 1].is_whitespace()
            && run_end < folded.len()
            && !folded[run_end].is_whitespace();

        if between_words {
            out.push(' ');
        } else {
            out.extend(&folded[i..run_end]);
        }
        i = run_end;
    }

    out
}

/// Canonicalize text for matching, recording where every character came from
pub fn normalize_for_matching(text: &str) -> NormalizedText {
    let mut normalized = String::with_capacity(text.len());
    let mut offsets = Vec::with_capacity(text.len());

    for (index, ch) in text.chars().enumerate() {
        if let Some(folded) = fold_for_matching(ch) {
            normalized.push(folded);
            offsets.push(index);
        }
    }

    NormalizedText {
        text: normalized,
        offsets,
    }
}

/// Convert every katakana character to hiragana, leaving everything else alone
pub fn to_hiragana(text: &str) -> String {
    text.chars().map(katakana_to_hiragana).collect()
}

/// Convert every hiragana character to katakana, leaving everything else alone
pub fn to_katakana(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'ぁ'..='ゖ' => shift_up(c, KANA_SHIFT),
            _ => c,
        })
        .collect()
}

/// Katakana counterpart of a hiragana character
pub(crate) fn hiragana_to_katakana(ch: char) -> char {
    match ch {
        'ぁ'..='ん' => shift_up(ch, KANA_SHIFT),
        _ => ch,
    }
}

/// Display folding of a single character: NFC, half-width, ASCII lowercase
pub(crate) fn fold_char(ch: char) -> char {
    to_half_width(compose(ch)).to_ascii_lowercase()
}

/// Matching folding of a single character; `None` when it folds to whitespace
pub(crate) fn fold_for_matching(ch: char) -> Option<char> {
    let folded = katakana_to_hiragana(fold_char(ch));
    if folded.is_whitespace() {
        None
    } else {
        Some(folded)
    }
}

/// Matching form of a regular-expression source
///
/// Folds like [`normalize_for_matching`] but keeps the character after an
/// unescaped backslash as written, so `\S` and `\D` keep their meaning.
pub(crate) fn fold_pattern(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut escaped = false;
    for ch in source.chars() {
        if escaped && !ch.is_whitespace() {
            out.push(ch);
            escaped = false;
            continue;
        }
        escaped = false;
        if let Some(folded) = fold_for_matching(ch) {
            escaped = folded == '\\';
            out.push(folded);
        }
    }
    out
}

/// Canonical composition of one character. A character whose canonical form
/// is not a single scalar is kept as-is so the offset map stays one-to-one.
fn compose(ch: char) -> char {
    let mut composed = std::iter::once(ch).nfc();
    match (composed.next(), composed.next()) {
        (Some(c), None) => c,
        _ => ch,
    }
}

fn to_half_width(ch: char) -> char {
    match ch {
        '０'..='９' | 'Ａ'..='Ｚ' | 'ａ'..='ｚ' => shift_down(ch, FULL_WIDTH_SHIFT),
        '．' => '.',
        '，' => ',',
        '％' => '%',
        '　' => ' ',
        _ => ch,
    }
}

fn katakana_to_hiragana(ch: char) -> char {
    match ch {
        'ァ'..='ン' => shift_down(ch, KANA_SHIFT),
        _ => ch,
    }
}

fn shift_up(ch: char, by: u32) -> char {
    char::from_u32(ch as u32 + by).unwrap_or(ch)
}

fn shift_down(ch: char, by: u32) -> char {
    char::from_u32(ch as u32 - by).unwrap_or(ch)
}

/// Converts byte offsets reported by `regex`/`str` searches into character
/// indices of the same string
pub(crate) struct CharIndex {
    starts: Vec<usize>,
}

impl CharIndex {
    pub(crate) fn new(text: &str) -> Self {
        Self {
            starts: text.char_indices().map(|(b, _)| b).collect(),
        }
    }

    /// Character index of the character starting at `byte`
    /// (or the character count when `byte` is the end of the string)
    pub(crate) fn char_at(&self, byte: usize) -> usize {
        self.starts.partition_point(|&b| b < byte)
    }
}
