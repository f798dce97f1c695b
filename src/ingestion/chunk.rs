//! Paragraph chunking of cleaned page text.

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::types::TextChunk;

fn paragraph_break() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n").expect("paragraph break regex is valid"))
}

fn whitespace_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex is valid"))
}

/// Collapses any run of whitespace to a single space and trims the ends.
pub fn normalize_whitespace(text: &str) -> String {
    whitespace_run().replace_all(text, " ").trim().to_string()
}

/// Splits cleaned text into paragraph chunks.
///
/// Paragraphs are separated by blank lines. Each surviving chunk is
/// whitespace-normalized, longer than `min_chars` after trimming, and tagged
/// with the id `{url}_{ordinal}` where the ordinal is the paragraph's
/// position in the page (dropped paragraphs still advance it, keeping ids
/// stable across runs).
pub fn split_chunks(url: &Url, text: &str, min_chars: usize) -> Vec<TextChunk> {
    paragraph_break()
        .split(text)
        .enumerate()
        .filter_map(|(ordinal, paragraph)| {
            let normalized = normalize_whitespace(paragraph);
            if normalized.chars().count() <= min_chars {
                return None;
            }
            Some(TextChunk {
                id: format!("{url}_{ordinal}"),
                text: normalized,
                source_url: url.to_string(),
            })
        })
        .collect()
}
