pub mod table;
pub mod topic;
pub mod fixer;
pub mod snapshot;

pub use table::*;
pub use topic::*;
pub use fixer::*;
pub use snapshot::*;

use std::path::PathBuf;

use thiserror::Error;

use super::storage::StoreError;

#[derive(Error, Debug)]
pub enum CanonicalError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Batch error: {0}")]
    Store(#[from] StoreError),

    #[error("No free snapshot name for {0}")]
    SnapshotExhausted(PathBuf),
}
