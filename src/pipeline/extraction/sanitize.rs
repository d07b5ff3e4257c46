/// Normalize the text of one resolved block before it enters the stream.
/// Drops carriage returns, soft hyphens and control characters, collapses
/// runs of spaces/tabs to one space, trims every line and the whole block.
/// Line breaks are kept: paragraph breaks are a segmentation boundary.
pub fn normalize_block_text(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != '\r' && *c != '\u{00AD}')
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();

    cleaned
        .lines()
        .map(collapse_inline_whitespace)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Collapse whitespace of any kind (including newlines) to single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collapse_inline_whitespace(line: &str) -> String {
    line.split([' ', '\t'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
