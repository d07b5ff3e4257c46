//! Extraction run orchestrator.
//!
//! Drives one run over a directory of PDFs:
//! blocks → linear stream → chunks → questions + answers → record store,
//! then writes the linear text artifact and the QA batch.
//!
//! Engines are injected as trait objects (`BlockExtractor`, `OcrEngine`)
//! so the whole run is testable with mocks.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::MinerConfig;
use crate::pipeline::extraction::{
    render_artifact, BlockExtractor, ExtractionError, LinearStream, Linearizer, OcrEngine,
};
use crate::pipeline::mining::{segment, AnswerCollector, QuestionClassifier};
use crate::pipeline::storage::{load_batch, RecordStore, RunContext, StoreError};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input directory not found: {0}")]
    InputDirMissing(PathBuf),
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Per-document counts.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentOutcome {
    pub document: String,
    pub pages: usize,
    pub blocks: usize,
    pub image_blocks: usize,
    pub ocr_segments: usize,
    pub chunks: usize,
    pub questions: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub documents: Vec<DocumentOutcome>,
    /// Documents that could not be read, with the reason.
    pub failed: Vec<(String, String)>,
    /// Records mined in this run.
    pub records: usize,
    /// Records kept from an earlier batch (`append_existing`).
    pub carried_over: usize,
    pub linear_text_path: PathBuf,
    pub qa_path: PathBuf,
    pub overview_path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Sequential extraction run. One document is fully linearized and mined
/// before the next is opened; the run context is the only state shared
/// between documents.
pub struct StudyMiner {
    extractor: Box<dyn BlockExtractor>,
    ocr: Box<dyn OcrEngine>,
    config: MinerConfig,
}

impl StudyMiner {
    pub fn new(
        extractor: Box<dyn BlockExtractor>,
        ocr: Box<dyn OcrEngine>,
        config: MinerConfig,
    ) -> Self {
        Self {
            extractor,
            ocr,
            config,
        }
    }

    /// Process every `*.pdf` in `input_dir` (sorted by name) and write the
    /// artifacts into `output_dir`. A document that fails is logged and
    /// listed in the report; the run continues with the next one.
    pub fn run_directory(
        &self,
        input_dir: &Path,
        output_dir: &Path,
    ) -> Result<RunReport, ProcessingError> {
        if !input_dir.is_dir() {
            return Err(ProcessingError::InputDirMissing(input_dir.to_path_buf()));
        }
        let inputs = list_pdfs(input_dir)?;
        tracing::info!(dir = %input_dir.display(), documents = inputs.len(), "Starting extraction run");

        let classifier = QuestionClassifier::from_flag(self.config.extended_matchers);
        let (mut ctx, mut store) = self.open_store(output_dir)?;
        let carried_over = store.len();
        let mut streams = Vec::with_capacity(inputs.len());
        let mut documents = Vec::with_capacity(inputs.len());
        let mut failed = Vec::new();

        for path in &inputs {
            match self.process_document(path, &classifier, &mut ctx, &mut store) {
                Ok((stream, outcome)) => {
                    streams.push(stream);
                    documents.push(outcome);
                }
                Err(e) => {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| path.display().to_string());
                    tracing::warn!(document = %name, error = %e, "Document skipped");
                    failed.push((name, e.to_string()));
                }
            }
        }

        let (linear_text_path, qa_path, overview_path) =
            self.write_outputs(output_dir, &streams, &store)?;

        tracing::info!(
            documents = documents.len(),
            failed = failed.len(),
            records = store.len() - carried_over,
            carried_over,
            "Extraction run complete"
        );

        Ok(RunReport {
            documents,
            failed,
            records: store.len() - carried_over,
            carried_over,
            linear_text_path,
            qa_path,
            overview_path,
        })
    }

    /// Fresh store, or the existing QA batch when `append_existing` is set
    /// and the file is present. Malformed fragments of that batch are
    /// skipped by [`load_batch`].
    fn open_store(&self, output_dir: &Path) -> Result<(RunContext, RecordStore), ProcessingError> {
        let qa_path = output_dir.join(&self.config.qa_file);
        if !self.config.append_existing || !qa_path.is_file() {
            return Ok((RunContext::new(), RecordStore::new()));
        }

        let batch = load_batch(&qa_path)?;
        tracing::info!(
            path = %qa_path.display(),
            records = batch.records.len(),
            skipped = batch.skipped(),
            "Continuing existing QA batch"
        );
        let ctx = RunContext::continue_after(&batch.records);
        Ok((ctx, RecordStore::with_records(batch.records)))
    }

    /// Extract, linearize and mine one document, appending its records.
    /// Nothing is appended when extraction fails.
    pub fn process_document(
        &self,
        path: &Path,
        classifier: &QuestionClassifier,
        ctx: &mut RunContext,
        store: &mut RecordStore,
    ) -> Result<(LinearStream, DocumentOutcome), ProcessingError> {
        let document = self.extractor.extract_blocks(path)?;
        let stream = Linearizer::new(self.ocr.as_ref()).linearize(&document);

        let chunks = segment(&document.name, &stream.plain_text(), self.config.min_chunk_chars);
        let items = AnswerCollector::new(classifier, self.config.max_answer_chunks).mine(&chunks);
        let questions = items.len();
        for item in items {
            store.append(ctx, item);
        }

        let outcome = DocumentOutcome {
            document: document.name.clone(),
            pages: document.pages.len(),
            blocks: document.block_count(),
            image_blocks: document.image_block_count(),
            ocr_segments: stream.ocr_segment_count(),
            chunks: chunks.len(),
            questions,
        };
        tracing::info!(
            document = %outcome.document,
            pages = outcome.pages,
            chunks = outcome.chunks,
            questions = outcome.questions,
            "Document processed"
        );
        Ok((stream, outcome))
    }

    /// Write the linear text artifact, the QA batch and (if configured)
    /// the question overview.
    pub fn write_outputs(
        &self,
        output_dir: &Path,
        streams: &[LinearStream],
        store: &RecordStore,
    ) -> Result<(PathBuf, PathBuf, Option<PathBuf>), ProcessingError> {
        fs::create_dir_all(output_dir)?;

        let linear_text_path = output_dir.join(&self.config.linear_text_file);
        fs::write(
            &linear_text_path,
            render_artifact(streams, self.config.ocr_marker.as_deref()),
        )?;

        let qa_path = output_dir.join(&self.config.qa_file);
        store.save(&qa_path)?;

        let overview_path = match &self.config.overview_file {
            Some(name) => {
                let path = output_dir.join(name);
                fs::write(&path, store.render_overview())?;
                Some(path)
            }
            None => None,
        };

        tracing::debug!(
            linear = %linear_text_path.display(),
            qa = %qa_path.display(),
            "Run artifacts written"
        );
        Ok((linear_text_path, qa_path, overview_path))
    }
}

fn list_pdfs(dir: &Path) -> Result<Vec<PathBuf>, ProcessingError> {
    let mut pdfs: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    pdfs.sort();
    Ok(pdfs)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::canonical::{canonicalize_file, Canonicalizer};
    use crate::pipeline::extraction::ocr::MockOcrEngine;
    use crate::pipeline::extraction::pdfium::MockBlockExtractor;
    use crate::pipeline::extraction::{split_by_documents, Block, BlockRect, Page};
    use crate::pipeline::storage::{write_records, Answer, QaRecord};

    fn line(top: f32) -> BlockRect {
        BlockRect::new(50.0, top, 400.0, top + 14.0)
    }

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"%PDF-1.7").unwrap();
    }

    fn miner(extractor: MockBlockExtractor, ocr_text: &str) -> StudyMiner {
        StudyMiner::new(
            Box::new(extractor),
            Box::new(MockOcrEngine::new(ocr_text)),
            MinerConfig::default(),
        )
    }

    #[test]
    fn og_page_yields_one_record_completed_by_canonicalizer() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        touch(input.path(), "og.pdf");

        let extractor = MockBlockExtractor::new().with_document(
            "og.pdf",
            vec![Page {
                index: 0,
                blocks: vec![
                    Block::text("unbeschränkt", line(130.0)),
                    Block::text("Nennen Sie 2 Merkmale der OG.", line(100.0)),
                ],
            }],
        );
        let report = miner(extractor, "").run_directory(input.path(), output.path()).unwrap();
        assert_eq!(report.records, 1);

        let batch = load_batch(&report.qa_path).unwrap();
        assert_eq!(batch.records[0].question, "Nennen Sie 2 Merkmale der OG.");
        assert_eq!(batch.records[0].pdf, "og.pdf");

        let outcome =
            canonicalize_file(&Canonicalizer::default(), &report.qa_path, "_fixed", "t1").unwrap();
        let fixed = load_batch(&outcome.output).unwrap();
        assert_eq!(
            fixed.records[0].answer,
            Answer::List(vec!["unbeschränkt".into(), "solidarisch".into()])
        );
    }

    #[test]
    fn profit_question_pairs_with_statement() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        touch(input.path(), "kosten.pdf");

        let extractor = MockBlockExtractor::new().with_document(
            "kosten.pdf",
            vec![Page {
                index: 0,
                blocks: vec![
                    Block::text("Berechne den Gewinn?", line(10.0)),
                    Block::text("Der Gewinn beträgt 200€.", line(30.0)),
                    Block::text("Wie hoch ist der Deckungsbeitrag?", line(50.0)),
                ],
            }],
        );
        let report = miner(extractor, "").run_directory(input.path(), output.path()).unwrap();

        let batch = load_batch(&report.qa_path).unwrap();
        let ids: Vec<u64> = batch.records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(batch.records[0].answer, Answer::from("Der Gewinn beträgt 200€."));
        assert_eq!(batch.records[1].answer, Answer::default());
    }

    #[test]
    fn ocr_text_joins_the_stream_and_artifact() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        touch(input.path(), "bild.pdf");

        let extractor = MockBlockExtractor::new().with_document(
            "bild.pdf",
            vec![Page {
                index: 0,
                blocks: vec![
                    Block::text("Was versteht man unter Skonto?", line(10.0)),
                    Block::image(vec![0x89], line(40.0)),
                ],
            }],
        );
        let report = miner(extractor, "Ein Preisnachlass bei schneller Zahlung.")
            .run_directory(input.path(), output.path())
            .unwrap();

        let batch = load_batch(&report.qa_path).unwrap();
        assert_eq!(
            batch.records[0].answer,
            Answer::from("Ein Preisnachlass bei schneller Zahlung.")
        );

        let artifact = fs::read_to_string(&report.linear_text_path).unwrap();
        assert!(artifact.contains("[Bildtext]: Ein Preisnachlass bei schneller Zahlung."));
        assert_eq!(report.documents[0].ocr_segments, 1);
    }

    #[test]
    fn failing_document_is_isolated_and_ids_stay_dense() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        touch(input.path(), "a.pdf");
        touch(input.path(), "b.pdf");
        touch(input.path(), "c.pdf");
        fs::write(input.path().join("notizen.txt"), "kein pdf").unwrap();

        let page = |text: &str| Page {
            index: 0,
            blocks: vec![Block::text(text, line(10.0))],
        };
        // b.pdf is unknown to the mock and fails like an unreadable file
        let extractor = MockBlockExtractor::new()
            .with_document("a.pdf", vec![page("Was ist eine offene Gesellschaft?")])
            .with_document("c.pdf", vec![page("Was ist eine Kommanditgesellschaft?")]);

        let report = miner(extractor, "").run_directory(input.path(), output.path()).unwrap();
        assert_eq!(report.documents.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "b.pdf");

        let batch = load_batch(&report.qa_path).unwrap();
        let pairs: Vec<(u64, &str)> = batch.records.iter().map(|r| (r.id, r.pdf.as_str())).collect();
        assert_eq!(pairs, vec![(1, "a.pdf"), (2, "c.pdf")]);

        let artifact = fs::read_to_string(&report.linear_text_path).unwrap();
        let names: Vec<String> = split_by_documents(&artifact).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a.pdf", "c.pdf"]);
    }

    #[test]
    fn overview_file_lists_records() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        touch(input.path(), "a.pdf");

        let extractor = MockBlockExtractor::new().with_document(
            "a.pdf",
            vec![Page {
                index: 0,
                blocks: vec![Block::text("Welche Organe hat eine AG?", line(10.0))],
            }],
        );
        let report = miner(extractor, "").run_directory(input.path(), output.path()).unwrap();
        let overview = fs::read_to_string(report.overview_path.unwrap()).unwrap();
        assert_eq!(
            overview,
            "--- Q&A Übersicht ---\nQ1 (aus a.pdf): Welche Organe hat eine AG?\n"
        );
    }

    fn one_question(doc: &str, question: &str) -> MockBlockExtractor {
        MockBlockExtractor::new().with_document(
            doc,
            vec![Page {
                index: 0,
                blocks: vec![Block::text(question, line(10.0))],
            }],
        )
    }

    #[test]
    fn append_existing_continues_numbering() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        touch(input.path(), "kg.pdf");
        write_records(
            &output.path().join("all_qna.json"),
            &[
                QaRecord::new(1, "og.pdf", "Was ist eine OG?", Answer::default(), ""),
                QaRecord::new(4, "og.pdf", "Wer haftet in der OG?", Answer::default(), ""),
            ],
        )
        .unwrap();

        let config = MinerConfig {
            append_existing: true,
            ..MinerConfig::default()
        };
        let miner = StudyMiner::new(
            Box::new(one_question("kg.pdf", "Was ist eine Kommanditgesellschaft?")),
            Box::new(MockOcrEngine::new("")),
            config,
        );
        let report = miner.run_directory(input.path(), output.path()).unwrap();
        assert_eq!(report.records, 1);
        assert_eq!(report.carried_over, 2);

        let batch = load_batch(&report.qa_path).unwrap();
        let pairs: Vec<(u64, &str)> = batch.records.iter().map(|r| (r.id, r.pdf.as_str())).collect();
        assert_eq!(pairs, vec![(1, "og.pdf"), (4, "og.pdf"), (5, "kg.pdf")]);
    }

    #[test]
    fn default_run_replaces_existing_batch() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        touch(input.path(), "kg.pdf");
        write_records(
            &output.path().join("all_qna.json"),
            &[QaRecord::new(9, "og.pdf", "Was ist eine OG?", Answer::default(), "")],
        )
        .unwrap();

        let report = miner(one_question("kg.pdf", "Was ist eine Kommanditgesellschaft?"), "")
            .run_directory(input.path(), output.path())
            .unwrap();
        assert_eq!(report.carried_over, 0);
        let ids: Vec<u64> = load_batch(&report.qa_path).unwrap().records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn missing_input_dir_is_an_error() {
        let output = tempfile::tempdir().unwrap();
        let err = miner(MockBlockExtractor::new(), "")
            .run_directory(Path::new("/nonexistent/pdf_in"), output.path())
            .unwrap_err();
        assert!(matches!(err, ProcessingError::InputDirMissing(_)));
    }

    #[test]
    fn empty_directory_writes_empty_artifacts() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let report = miner(MockBlockExtractor::new(), "")
            .run_directory(input.path(), output.path())
            .unwrap();
        assert_eq!(report.records, 0);
        assert_eq!(fs::read_to_string(&report.linear_text_path).unwrap(), "");
        assert!(load_batch(&report.qa_path).unwrap().records.is_empty());
    }
}
