use std::sync::LazyLock;

use regex::Regex;

use super::types::Chunk;

/// Sentence end (punctuation + whitespace) or paragraph break.
static BOUNDARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.?!]\s+|\n{2,}").expect("valid regex"));

/// Split a document's linear text into chunks.
///
/// Terminal punctuation stays with the chunk it closes. Trimmed pieces of
/// `min_chars` characters or fewer are dropped as noise; ordinals count
/// kept chunks only. Pure function of `text`.
pub fn segment(document: &str, text: &str, min_chars: usize) -> Vec<Chunk> {
    split_pieces(text)
        .into_iter()
        .map(str::trim)
        .filter(|piece| piece.chars().count() > min_chars)
        .enumerate()
        .map(|(ordinal, piece)| Chunk {
            document: document.to_string(),
            ordinal,
            text: piece.to_string(),
        })
        .collect()
}

fn split_pieces(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;

    for m in BOUNDARY_RE.find_iter(text) {
        let keeps_mark = m.as_str().starts_with(['.', '?', '!']);
        // the punctuation characters are one byte each
        let end = if keeps_mark { m.start() + 1 } else { m.start() };
        pieces.push(&text[start..end]);
        start = m.end();
    }
    pieces.push(&text[start..]);
    pieces
}
