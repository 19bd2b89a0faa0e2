//! Signature extraction: element → comparable fingerprint.
//!
//! Pure function of the element's own fields. Never looks at siblings or the
//! other document.

use std::collections::BTreeSet;

use crate::config::ScoringConfig;
use crate::model::{Element, ElementKind, Signature};

/// Content tokens shorter than this are dropped.
pub const MIN_TOKEN_CHARS: usize = 4;

/// Common words that carry no identifying content. All are at least
/// `MIN_TOKEN_CHARS` long; shorter words are already filtered by length.
const STOP_WORDS: &[&str] = &[
    "about", "above", "after", "again", "against", "also", "among", "because", "been", "before",
    "being", "below", "between", "both", "could", "does", "doing", "down", "during", "each",
    "from", "further", "have", "having", "here", "into", "itself", "just", "more", "most",
    "other", "over", "same", "should", "some", "such", "than", "that", "their", "them", "then",
    "there", "these", "they", "this", "those", "through", "under", "until", "very", "were",
    "what", "when", "where", "which", "while", "will", "with", "would", "your",
];

/// Element paired with its signature, computed once per pass.
#[derive(Debug, Clone)]
pub struct SignedElement<'a> {
    pub element: &'a Element,
    pub signature: Signature,
}

impl<'a> SignedElement<'a> {
    pub fn new(element: &'a Element, config: &ScoringConfig) -> Self {
        Self {
            element,
            signature: extract(element, config),
        }
    }
}

pub fn sign_all<'a>(elements: &'a [Element], config: &ScoringConfig) -> Vec<SignedElement<'a>> {
    elements
        .iter()
        .map(|e| SignedElement::new(e, config))
        .collect()
}

/// Build the signature of one element.
///
/// Tables use their first non-empty cell as the content sample, capped at
/// `table_sample_chars`, because upstream extraction often truncates table
/// titles. An element with no text anywhere yields an empty signature.
pub fn extract(element: &Element, config: &ScoringConfig) -> Signature {
    let normalized_title = normalize_text(&element.title);

    let raw_sample = match element.kind {
        ElementKind::Table => {
            let first_cell = element
                .cells
                .iter()
                .map(|c| c.trim())
                .find(|c| !c.is_empty())
                .unwrap_or_else(|| element.content_sample.trim());
            truncate_chars(first_cell, config.table_sample_chars)
        }
        _ => element.content_sample.as_str(),
    };
    let content_sample = normalize_text(raw_sample);
    let content_tokens = content_tokens(&content_sample);

    Signature {
        kind: element.kind,
        normalized_title,
        content_sample,
        content_tokens,
        shape_key: element.shape,
    }
}

/// Lower-case, replace punctuation with spaces, collapse whitespace.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        if !out.is_empty() {
            out.push(' ');
        }
        out.extend(word.chars().flat_map(char::to_lowercase));
    }
    out
}

/// Content words of already-normalized text: length ≥ 4, not a stop word.
pub fn content_tokens(normalized: &str) -> BTreeSet<String> {
    normalized
        .split(' ')
        .filter(|w| w.chars().count() >= MIN_TOKEN_CHARS && !is_stop_word(w))
        .map(str::to_string)
        .collect()
}

/// Words of normalized text, used by the title metric.
pub fn title_words(normalized: &str) -> BTreeSet<&str> {
    normalized.split(' ').filter(|w| !w.is_empty()).collect()
}

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.binary_search(&word).is_ok()
}

/// Prefix of at most `max` characters, cut on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Tokens for reference detection in running text.
///
/// Like `normalize_text`, but a '.' or '-' joining two alphanumerics stays
/// inside the token when either side is a digit, so "Table 2.1", "Table 2-1"
/// and "Table A.1" each keep their numeral whole. En and non-breaking hyphens
/// read as '-'.
pub fn reference_tokens(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().map(fold_dash).collect();
    let mut tokens = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        let joins_numeral = (c == '.' || c == '-')
            && i > 0
            && chars.get(i + 1).is_some_and(|next| {
                let prev = chars[i - 1];
                prev.is_alphanumeric()
                    && next.is_alphanumeric()
                    && (prev.is_ascii_digit() || next.is_ascii_digit())
            });
        if c.is_alphanumeric() || joins_numeral {
            current.extend(c.to_lowercase());
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn fold_dash(c: char) -> char {
    match c {
        '\u{2010}' | '\u{2011}' | '\u{2013}' => '-',
        _ => c,
    }
}
