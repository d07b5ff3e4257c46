use std::fs;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::types::OcrEngine;
use super::ExtractionError;
use crate::config::MinerConfig;

/// Poll interval while waiting on the tesseract child process.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Tesseract driven through its command-line interface.
///
/// Each call writes the raster into a private temporary directory, runs
/// `tesseract <img> <out> -l <langs> --psm <n>` and reads `<out>.txt`.
/// The directory is removed when the call returns, on success and failure.
pub struct TesseractCli {
    binary: PathBuf,
    languages: String,
    psm: u8,
    timeout: Duration,
}

impl TesseractCli {
    pub fn new(binary: impl Into<PathBuf>, languages: &str, psm: u8, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            languages: languages.to_string(),
            psm,
            timeout,
        }
    }

    pub fn from_config(config: &MinerConfig) -> Self {
        Self::new(
            config.tesseract_bin.clone(),
            &config.ocr_languages,
            config.ocr_psm,
            config.ocr_timeout(),
        )
    }

    pub fn languages(&self) -> &str {
        &self.languages
    }
}

impl OcrEngine for TesseractCli {
    fn ocr_image(&self, png_bytes: &[u8]) -> Result<String, ExtractionError> {
        let workdir = tempfile::tempdir()?;
        let input = workdir.path().join("block.png");
        let output_base = workdir.path().join("out");
        fs::write(&input, png_bytes)?;

        let child = Command::new(&self.binary)
            .arg(&input)
            .arg(&output_base)
            .arg("-l")
            .arg(&self.languages)
            .arg("--psm")
            .arg(self.psm.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ExtractionError::OcrSpawn {
                binary: self.binary.clone(),
                reason: e.to_string(),
            })?;

        let status = wait_with_timeout(child, self.timeout)?;
        if !status.success() {
            return Err(ExtractionError::OcrExit(status.to_string()));
        }

        let text = fs::read_to_string(output_base.with_extension("txt"))?;
        tracing::debug!(
            bytes = png_bytes.len(),
            chars = text.chars().count(),
            "OCR block recognized"
        );
        Ok(text)
    }
}

/// Wait for `child`, killing and reaping it once `timeout` has elapsed.
fn wait_with_timeout(mut child: Child, timeout: Duration) -> Result<ExitStatus, ExtractionError> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ExtractionError::OcrTimeout(timeout.as_secs()));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Mock OCR engine for unit testing without Tesseract.
pub struct MockOcrEngine {
    pub text: String,
}

impl MockOcrEngine {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

impl OcrEngine for MockOcrEngine {
    fn ocr_image(&self, _png_bytes: &[u8]) -> Result<String, ExtractionError> {
        Ok(self.text.clone())
    }
}

/// OCR engine that fails every call, for exercising the omission path.
pub struct FailingOcrEngine;

impl OcrEngine for FailingOcrEngine {
    fn ocr_image(&self, _png_bytes: &[u8]) -> Result<String, ExtractionError> {
        Err(ExtractionError::OcrExit("exit status: 1".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_ocr_returns_configured_text() {
        let engine = MockOcrEngine::new("Break-even-Menge berechnen");
        assert_eq!(engine.ocr_image(b"fake").unwrap(), "Break-even-Menge berechnen");
    }

    #[test]
    fn failing_engine_reports_exit() {
        let err = FailingOcrEngine.ocr_image(b"fake").unwrap_err();
        assert!(matches!(err, ExtractionError::OcrExit(_)));
    }

    #[test]
    fn from_config_carries_languages() {
        let config = MinerConfig::default();
        let engine = TesseractCli::from_config(&config);
        assert_eq!(engine.languages(), "deu+eng");
        assert_eq!(engine.psm, 6);
        assert_eq!(engine.timeout, Duration::from_secs(30));
    }

    #[test]
    fn missing_binary_is_spawn_error() {
        let engine = TesseractCli::new(
            "/nonexistent/bin/tesseract",
            "deu+eng",
            6,
            Duration::from_secs(1),
        );
        let err = engine.ocr_image(b"\x89PNG").unwrap_err();
        assert!(matches!(err, ExtractionError::OcrSpawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn hung_process_times_out() {
        let child = Command::new("sleep")
            .arg("5")
            .stdout(Stdio::null())
            .spawn();
        let Ok(child) = child else {
            return; // Skip where `sleep` is unavailable
        };
        let started = Instant::now();
        let err = wait_with_timeout(child, Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, ExtractionError::OcrTimeout(0)));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_is_reported() {
        let Ok(child) = Command::new("false").spawn() else {
            return;
        };
        let status = wait_with_timeout(child, Duration::from_secs(5)).unwrap();
        assert!(!status.success());
    }

    #[cfg(unix)]
    mod scripted {
        use std::os::unix::fs::PermissionsExt;
        use std::path::Path;

        use super::*;
        use crate::pipeline::extraction::{
            Block, BlockRect, Linearizer, Page, Provenance, SourceDocument,
        };

        /// Stand-in for the tesseract binary: logs its input path, then
        /// runs `body` with the output base in `$2`.
        fn fake_tesseract(dir: &Path, body: &str) -> (PathBuf, PathBuf) {
            let log = dir.join("inputs.log");
            let script = dir.join("fake-tesseract");
            fs::write(
                &script,
                format!("#!/bin/sh\necho \"$1\" >> \"{}\"\n{body}\n", log.display()),
            )
            .unwrap();
            fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
            (script, log)
        }

        fn logged_inputs(log: &Path) -> Vec<PathBuf> {
            fs::read_to_string(log)
                .unwrap()
                .lines()
                .map(PathBuf::from)
                .collect()
        }

        fn assert_workdirs_removed(log: &Path) {
            let inputs = logged_inputs(log);
            assert!(!inputs.is_empty(), "fake tesseract was not invoked");
            for input in inputs {
                assert!(!input.exists(), "{} survived the call", input.display());
                assert!(!input.parent().unwrap().exists());
            }
        }

        #[test]
        fn success_reads_text_and_removes_workdir() {
            let dir = tempfile::tempdir().unwrap();
            let (script, log) =
                fake_tesseract(dir.path(), "echo 'Skonto ist ein Preisnachlass' > \"$2.txt\"");
            let engine = TesseractCli::new(script, "deu+eng", 6, Duration::from_secs(10));

            let text = engine.ocr_image(b"\x89PNG").unwrap();
            assert_eq!(text.trim(), "Skonto ist ein Preisnachlass");
            assert_workdirs_removed(&log);
        }

        #[test]
        fn failure_removes_workdir() {
            let dir = tempfile::tempdir().unwrap();
            let (script, log) = fake_tesseract(dir.path(), "exit 3");
            let engine = TesseractCli::new(script, "deu+eng", 6, Duration::from_secs(10));

            let err = engine.ocr_image(b"\x89PNG").unwrap_err();
            assert!(matches!(err, ExtractionError::OcrExit(_)));
            assert_workdirs_removed(&log);
        }

        #[test]
        fn timeout_removes_workdir_and_omits_block() {
            let dir = tempfile::tempdir().unwrap();
            let (script, log) = fake_tesseract(dir.path(), "exec sleep 5");
            let engine = TesseractCli::new(script, "deu+eng", 6, Duration::from_millis(200));

            let started = Instant::now();
            let err = engine.ocr_image(b"\x89PNG").unwrap_err();
            assert!(matches!(err, ExtractionError::OcrTimeout(_)));
            assert!(started.elapsed() < Duration::from_secs(4));
            assert_workdirs_removed(&log);

            let document = SourceDocument {
                name: "bild.pdf".into(),
                path: PathBuf::from("bild.pdf"),
                pages: vec![Page {
                    index: 0,
                    blocks: vec![
                        Block::text("Was versteht man unter Skonto?", BlockRect::new(50.0, 10.0, 400.0, 24.0)),
                        Block::image(vec![0x89], BlockRect::new(50.0, 40.0, 400.0, 200.0)),
                    ],
                }],
            };
            let stream = Linearizer::new(&engine).linearize(&document);
            assert_eq!(stream.segments().len(), 1);
            assert_eq!(stream.ocr_segment_count(), 0);
            assert_eq!(stream.segments()[0].text, "Was versteht man unter Skonto?");
            assert!(matches!(stream.segments()[0].provenance, Provenance::Native));
            assert_workdirs_removed(&log);
        }
    }
}
