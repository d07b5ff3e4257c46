// Reading-order contract for page blocks.
// Blocks are sorted by top edge, then left edge. This approximates reading
// order for single-column and simple stacked layouts. True multi-column or
// rotated pages come out interleaved; that is a known limitation.

use std::cmp::Ordering;

use super::types::{Block, BlockRect};

/// Fragments whose top edges differ by at most this fraction of the shorter
/// fragment height are treated as one line.
const LINE_TOLERANCE_RATIO: f32 = 0.5;

/// Lower bound on the line tolerance in points (for zero-height fragments).
const MIN_LINE_TOLERANCE_PT: f32 = 1.0;

/// Total order on rectangles: top ascending, then left ascending.
pub fn reading_order(a: &BlockRect, b: &BlockRect) -> Ordering {
    a.top()
        .total_cmp(&b.top())
        .then_with(|| a.left().total_cmp(&b.left()))
}

/// Sort blocks into reading order. Stable, so identical rectangles keep
/// their discovery order and re-extraction is deterministic.
pub fn order_blocks(blocks: &mut [Block]) {
    blocks.sort_by(|a, b| reading_order(&a.rect, &b.rect));
}

/// Group native text fragments that sit on the same line into one text block.
///
/// PDF text objects are often single words or runs; merging them per line
/// gives blocks close to what a reader perceives. Fragments within a line
/// are joined left to right with a single space.
pub fn coalesce_text_lines(mut fragments: Vec<(BlockRect, String)>) -> Vec<Block> {
    fragments.retain(|(_, text)| !text.trim().is_empty());
    fragments.sort_by(|a, b| reading_order(&a.0, &b.0));

    let mut lines: Vec<Vec<(BlockRect, String)>> = Vec::new();

    for fragment in fragments {
        let joins_last = lines
            .last()
            .and_then(|line| line.first())
            .is_some_and(|(anchor, _)| same_line(anchor, &fragment.0));

        match lines.last_mut() {
            Some(line) if joins_last => line.push(fragment),
            _ => lines.push(vec![fragment]),
        }
    }

    let mut blocks: Vec<Block> = lines.into_iter().filter_map(merge_line).collect();
    order_blocks(&mut blocks);
    blocks
}

fn same_line(anchor: &BlockRect, candidate: &BlockRect) -> bool {
    let tolerance = (anchor.height().min(candidate.height()) * LINE_TOLERANCE_RATIO)
        .max(MIN_LINE_TOLERANCE_PT);
    (candidate.top() - anchor.top()).abs() <= tolerance
}

fn merge_line(mut line: Vec<(BlockRect, String)>) -> Option<Block> {
    line.sort_by(|a, b| a.0.left().total_cmp(&b.0.left()));

    let mut iter = line.into_iter();
    let (mut rect, first) = iter.next()?;
    let mut text = first.trim().to_string();

    for (fragment_rect, fragment) in iter {
        rect = rect.union(&fragment_rect);
        let fragment = fragment.trim();
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(fragment);
    }

    Some(Block::text(text, rect))
}
