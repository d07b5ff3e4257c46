use std::path::{Path, PathBuf};

use serde::Serialize;

use super::ExtractionError;

/// Bounding rectangle in page space, measured in PDF points from the
/// top-left corner of the page (y grows downward).
///
/// Used only to order blocks; never persisted downstream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockRect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BlockRect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Convert PDF user-space bounds (origin bottom-left) to top-left space.
    pub fn from_pdf_bounds(left: f32, top: f32, right: f32, bottom: f32, page_height: f32) -> Self {
        Self {
            x0: left.min(right),
            y0: page_height - top.max(bottom),
            x1: left.max(right),
            y1: page_height - top.min(bottom),
        }
    }

    pub fn top(&self) -> f32 {
        self.y0
    }

    pub fn left(&self) -> f32 {
        self.x0
    }

    pub fn width(&self) -> f32 {
        (self.x1 - self.x0).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y1 - self.y0).max(0.0)
    }

    pub fn union(&self, other: &BlockRect) -> BlockRect {
        BlockRect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// Block content: native text, or the rendered raster of an image region.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    Text(String),
    /// PNG bytes of the region at the configured OCR resolution.
    Image(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub rect: BlockRect,
}

impl Block {
    pub fn text(content: impl Into<String>, rect: BlockRect) -> Self {
        Self {
            kind: BlockKind::Text(content.into()),
            rect,
        }
    }

    pub fn image(png: Vec<u8>, rect: BlockRect) -> Self {
        Self {
            kind: BlockKind::Image(png),
            rect,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self.kind, BlockKind::Image(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Zero-based index within the document.
    pub index: usize,
    pub blocks: Vec<Block>,
}

/// One source PDF after block extraction. Immutable once read.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    /// File name; the document identity carried by every downstream record.
    pub name: String,
    pub path: PathBuf,
    pub pages: Vec<Page>,
}

impl SourceDocument {
    pub fn block_count(&self) -> usize {
        self.pages.iter().map(|p| p.blocks.len()).sum()
    }

    pub fn image_block_count(&self) -> usize {
        self.pages
            .iter()
            .flat_map(|p| p.blocks.iter())
            .filter(|b| b.is_image())
            .count()
    }
}

/// Where a resolved piece of the linear stream came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Native,
    Ocr,
}

/// Reads one source document into per-page blocks in reading order.
pub trait BlockExtractor {
    fn extract_blocks(&self, path: &Path) -> Result<SourceDocument, ExtractionError>;
}

/// OCR engine abstraction (allows mocking for tests)
pub trait OcrEngine {
    /// Recognize text in a PNG raster. An empty string is a valid result.
    fn ocr_image(&self, png_bytes: &[u8]) -> Result<String, ExtractionError>;
}
