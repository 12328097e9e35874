//! Text canonicalization and bigram similarity for song fields.

use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Lowercases, trims, drops everything except ASCII word characters and
/// whitespace, then collapses whitespace runs to a single space.
///
/// Stripping happens after trimming, so `"! abc"` keeps a leading space.
/// That space never affects scoring because bigrams ignore whitespace.
pub fn normalize(value: &str) -> String {
    let lowered = value.to_lowercase();
    let stripped: String = lowered
        .trim()
        .chars()
        .filter(|ch| is_word_char(*ch) || ch.is_whitespace())
        .collect();
    WHITESPACE_RUN.replace_all(&stripped, " ").into_owned()
}

/// Similarity in `[0, 1]` between two raw strings.
pub fn similarity(a: &str, b: &str) -> f64 {
    similarity_normalized(&normalize(a), &normalize(b))
}

/// Same as [`similarity`] for inputs that already went through [`normalize`].
pub fn similarity_normalized(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    // Dice coefficient over the multiset of adjacent-character pairs,
    // whitespace removed; strings shorter than two characters score 0.
    strsim::sorensen_dice(a, b)
}

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}
