pub mod extraction;
pub mod mining;
pub mod storage;
pub mod canonical;
pub mod processor; // Extraction run orchestrator
