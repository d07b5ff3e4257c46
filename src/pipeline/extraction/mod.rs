pub mod types;
pub mod blocks;
pub mod sanitize;
pub mod pdfium;
pub mod ocr;
pub mod linearize;

pub use types::*;
pub use blocks::*;
pub use sanitize::*;
pub use ocr::*;
pub use linearize::*;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source document not found: {0}")]
    DocumentNotFound(PathBuf),

    #[error("PDF is encrypted or password-protected")]
    PdfEncrypted,

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("PDF rendering failed on page {page}: {reason}")]
    PdfRendering { page: usize, reason: String },

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("OCR process could not be started ({binary}): {reason}")]
    OcrSpawn { binary: PathBuf, reason: String },

    #[error("OCR process exited with status {0}")]
    OcrExit(String),

    #[error("OCR timed out after {0}s")]
    OcrTimeout(u64),
}
