use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::sanitize::normalize_block_text;
use super::types::{BlockKind, OcrEngine, Provenance, SourceDocument};

/// Prefix of the line separating documents in the linear text artifact.
pub const BOUNDARY_PREFIX: &str = "--- PDF: ";
const BOUNDARY_SUFFIX: &str = " ---";

static BOUNDARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^--- PDF: (.+?) ---[ \t]*$").expect("valid regex"));

/// One resolved block of the linear stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamSegment {
    pub text: String,
    pub provenance: Provenance,
}

/// The resolved text of one document, in page/block reading order.
/// Built once by the [`Linearizer`] and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinearStream {
    pub document: String,
    segments: Vec<StreamSegment>,
}

impl LinearStream {
    pub fn new(document: impl Into<String>, segments: Vec<StreamSegment>) -> Self {
        Self {
            document: document.into(),
            segments,
        }
    }

    pub fn segments(&self) -> &[StreamSegment] {
        &self.segments
    }

    pub fn ocr_segment_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| s.provenance == Provenance::Ocr)
            .count()
    }

    /// Stream text as seen by segmentation: no boundary line, no OCR marker.
    pub fn plain_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Artifact rendition: boundary line, then the segments, OCR-derived
    /// lines carrying `ocr_marker` when set.
    pub fn render(&self, ocr_marker: Option<&str>) -> String {
        let mut out = boundary_line(&self.document);
        for segment in &self.segments {
            out.push('\n');
            match (segment.provenance, ocr_marker) {
                (Provenance::Ocr, Some(marker)) => {
                    for (i, line) in segment.text.lines().enumerate() {
                        if i > 0 {
                            out.push('\n');
                        }
                        out.push_str(marker);
                        out.push_str(line);
                    }
                }
                _ => out.push_str(&segment.text),
            }
        }
        out
    }
}

pub fn boundary_line(document: &str) -> String {
    format!("{BOUNDARY_PREFIX}{document}{BOUNDARY_SUFFIX}")
}

/// Join rendered streams into the linear text artifact, one blank line
/// between documents.
pub fn render_artifact(streams: &[LinearStream], ocr_marker: Option<&str>) -> String {
    let mut out = streams
        .iter()
        .map(|s| s.render(ocr_marker))
        .collect::<Vec<_>>()
        .join("\n\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Recover `(document, body)` pairs from a linear text artifact.
/// Text before the first boundary line has no owner and is ignored.
pub fn split_by_documents(text: &str) -> Vec<(String, String)> {
    let marks: Vec<_> = BOUNDARY_RE.captures_iter(text).collect();
    let mut out = Vec::with_capacity(marks.len());

    for (i, caps) in marks.iter().enumerate() {
        let (Some(line), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let end = marks
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(text.len());
        let body = text[line.end()..end].trim().to_string();
        out.push((name.as_str().to_string(), body));
    }
    out
}

/// Merges extracted blocks and OCR output into one [`LinearStream`] per
/// document. Never re-sorts: block order is the extractor's order.
pub struct Linearizer<'a> {
    ocr: &'a dyn OcrEngine,
}

impl<'a> Linearizer<'a> {
    pub fn new(ocr: &'a dyn OcrEngine) -> Self {
        Self { ocr }
    }

    pub fn linearize(&self, document: &SourceDocument) -> LinearStream {
        let mut segments = Vec::with_capacity(document.block_count());
        let mut ocr_misses = 0usize;

        for page in &document.pages {
            for (position, block) in page.blocks.iter().enumerate() {
                let (raw, provenance) = match &block.kind {
                    BlockKind::Text(text) => (text.clone(), Provenance::Native),
                    BlockKind::Image(png) => match self.ocr.ocr_image(png) {
                        Ok(text) => (text, Provenance::Ocr),
                        Err(e) => {
                            tracing::warn!(
                                document = %document.name,
                                page = page.index,
                                block = position,
                                error = %e,
                                "OCR failed, image block omitted"
                            );
                            ocr_misses += 1;
                            continue;
                        }
                    },
                };

                let text = normalize_block_text(&raw);
                if text.is_empty() {
                    if provenance == Provenance::Ocr {
                        tracing::warn!(
                            document = %document.name,
                            page = page.index,
                            block = position,
                            "OCR returned no text, image block omitted"
                        );
                        ocr_misses += 1;
                    }
                    continue;
                }
                segments.push(StreamSegment { text, provenance });
            }
        }

        tracing::debug!(
            document = %document.name,
            segments = segments.len(),
            ocr_misses,
            "Document linearized"
        );
        LinearStream::new(document.name.clone(), segments)
    }
}
