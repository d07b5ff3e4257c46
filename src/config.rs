//! Run configuration.
//!
//! Every tunable of the extraction and canonicalization passes lives in
//! [`MinerConfig`]. Defaults are the reference values of the study-PDF
//! pipeline; a JSON file may override any subset of them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "study-miner";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable overriding the tesseract binary.
pub const TESSERACT_ENV: &str = "STUDY_MINER_TESSERACT";

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "info"
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error reading config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// Tesseract language set, e.g. "deu+eng".
    pub ocr_languages: String,
    /// Tesseract page segmentation mode. 6 = single uniform block of text.
    pub ocr_psm: u8,
    /// Rasterization resolution for image blocks.
    pub ocr_dpi: u32,
    /// Per-block OCR wall clock limit. A timeout counts as an OCR miss.
    pub ocr_timeout_secs: u64,
    pub tesseract_bin: PathBuf,
    /// Prefix for OCR-derived lines in the linear text artifact.
    pub ocr_marker: Option<String>,
    /// Chunks with this many characters or fewer are dropped as noise.
    pub min_chunk_chars: usize,
    /// Answer + description.
    pub max_answer_chunks: usize,
    /// Enables the headed-task and imperative-prompt matchers.
    pub extended_matchers: bool,
    pub linear_text_file: String,
    pub qa_file: String,
    /// Keep the records of an existing `qa_file` and number new ones after
    /// its highest id.
    pub append_existing: bool,
    /// Question list (`Q<id> (aus <pdf>): ...`); `None` skips it.
    pub overview_file: Option<String>,
    pub fixed_suffix: String,
    pub manifest_file: String,
    pub report_file: String,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            ocr_languages: "deu+eng".into(),
            ocr_psm: 6,
            ocr_dpi: 150,
            ocr_timeout_secs: 30,
            tesseract_bin: PathBuf::from("tesseract"),
            ocr_marker: Some("[Bildtext]: ".into()),
            min_chunk_chars: 15,
            max_answer_chunks: 2,
            extended_matchers: true,
            linear_text_file: "all_text_linear.txt".into(),
            qa_file: "all_qna.json".into(),
            append_existing: false,
            overview_file: Some("qa_overview.txt".into()),
            fixed_suffix: "_fixed".into(),
            manifest_file: "manifest.json".into(),
            report_file: "json_fix_report.txt".into(),
        }
    }
}

impl MinerConfig {
    /// Load from an optional JSON file, then apply environment overrides.
    ///
    /// Missing keys keep their defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            None => Self::default(),
        };

        if let Ok(bin) = std::env::var(TESSERACT_ENV) {
            tracing::debug!(bin = %bin, "Tesseract binary overridden from environment");
            config.tesseract_bin = PathBuf::from(bin);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ocr_dpi == 0 {
            return Err(ConfigError::Invalid {
                field: "ocr_dpi",
                reason: "must be positive".into(),
            });
        }
        if self.ocr_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "ocr_timeout_secs",
                reason: "must be positive".into(),
            });
        }
        if self.ocr_languages.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "ocr_languages",
                reason: "must name at least one language".into(),
            });
        }
        if self.max_answer_chunks == 0 {
            return Err(ConfigError::Invalid {
                field: "max_answer_chunks",
                reason: "must be at least 1".into(),
            });
        }
        if self.fixed_suffix.is_empty() {
            return Err(ConfigError::Invalid {
                field: "fixed_suffix",
                reason: "derived files must be distinguishable from inputs".into(),
            });
        }
        Ok(())
    }

    pub fn ocr_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.ocr_timeout_secs)
    }
}
