pub mod record_store;
pub mod batch;

pub use record_store::*;
pub use batch::*;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not replace {path}: {reason}")]
    Persist { path: PathBuf, reason: String },

    #[error("Unsupported batch shape: {0}")]
    UnsupportedShape(String),

    #[error("No parseable fragment in batch ({0} skipped)")]
    Malformed(usize),
}
