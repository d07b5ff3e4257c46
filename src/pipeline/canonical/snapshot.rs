//! Versioned snapshot output of a canonicalization run.
//!
//! Inputs are never rewritten. Each processed file yields
//! `<stem><suffix>.<version>.json`. The content is written to a temporary
//! file first and linked into place without replacing an existing name, so
//! neither an earlier snapshot nor a half-written one is ever left under a
//! snapshot name. The directory run also writes a manifest and a
//! plain-text report.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::fixer::Canonicalizer;
use super::CanonicalError;
use crate::config::MinerConfig;
use crate::pipeline::storage::{load_batch, QaRecord};

/// Attempts at a free snapshot name before giving up.
const MAX_NAME_ATTEMPTS: usize = 100;

pub fn snapshot_version(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d%H%M%S").to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub input: String,
    pub output: PathBuf,
    pub records: usize,
    pub changed: usize,
    pub skipped: usize,
}

impl FileOutcome {
    pub fn output_name(&self) -> String {
        file_name(&self.output)
    }
}

#[derive(Debug, Default)]
pub struct DirectoryReport {
    pub version: String,
    pub files: Vec<FileOutcome>,
    /// Files that could not be processed, with the reason.
    pub failures: Vec<(String, String)>,
    pub manifest_path: PathBuf,
    pub report_path: PathBuf,
}

impl DirectoryReport {
    pub fn total_changed(&self) -> usize {
        self.files.iter().map(|f| f.changed).sum()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// True for snapshots (and legacy `<stem><suffix>.json` copies) written
/// by earlier runs.
pub fn is_derived(name: &str, suffix: &str) -> bool {
    name.contains(&format!("{suffix}."))
}

/// Canonicalize one batch file into a new snapshot next to it.
pub fn canonicalize_file(
    canonicalizer: &Canonicalizer,
    path: &Path,
    suffix: &str,
    version: &str,
) -> Result<FileOutcome, CanonicalError> {
    let mut batch = load_batch(path)?;
    let changed = canonicalizer.fix_all(&mut batch.records);
    let output = create_snapshot(path, suffix, version, &batch.records)?;

    let outcome = FileOutcome {
        input: file_name(path),
        output,
        records: batch.records.len(),
        changed,
        skipped: batch.skipped(),
    };
    tracing::info!(
        input = %outcome.input,
        output = %outcome.output_name(),
        records = outcome.records,
        changed = outcome.changed,
        skipped = outcome.skipped,
        "Snapshot written"
    );
    Ok(outcome)
}

fn create_snapshot(
    input: &Path,
    suffix: &str,
    version: &str,
    records: &[QaRecord],
) -> Result<PathBuf, CanonicalError> {
    let dir = match input.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "batch".to_string());

    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, records)?;
    tmp.write_all(b"\n")?;
    tmp.flush()?;

    for attempt in 0..MAX_NAME_ATTEMPTS {
        let name = if attempt == 0 {
            format!("{stem}{suffix}.{version}.json")
        } else {
            format!("{stem}{suffix}.{version}-{attempt}.json")
        };
        let candidate = dir.join(name);

        match tmp.persist_noclobber(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => tmp = e.file,
            Err(e) => return Err(e.error.into()),
        }
    }

    Err(CanonicalError::SnapshotExhausted(input.to_path_buf()))
}

/// Canonicalize every `*.json` batch in `dir`.
///
/// The manifest, the report and earlier snapshots are skipped. A file that
/// fails is logged and listed in the report; the others still run.
pub fn canonicalize_directory(
    canonicalizer: &Canonicalizer,
    dir: &Path,
    config: &MinerConfig,
) -> Result<DirectoryReport, CanonicalError> {
    let now = Utc::now();
    let version = snapshot_version(now);

    let mut inputs: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        })
        .filter(|path| {
            let name = file_name(path);
            name != config.manifest_file && !is_derived(&name, &config.fixed_suffix)
        })
        .collect();
    inputs.sort();

    let mut report = DirectoryReport {
        version: version.clone(),
        manifest_path: dir.join(&config.manifest_file),
        report_path: dir.join(&config.report_file),
        ..Default::default()
    };

    for path in &inputs {
        match canonicalize_file(canonicalizer, path, &config.fixed_suffix, &version) {
            Ok(outcome) => report.files.push(outcome),
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "Batch skipped");
                report.failures.push((file_name(path), e.to_string()));
            }
        }
    }

    let manifest = Manifest {
        version: version.clone(),
        files: report.files.iter().map(|f| f.output_name()).collect(),
    };
    fs::write(
        &report.manifest_path,
        serde_json::to_string_pretty(&manifest)? + "\n",
    )?;
    fs::write(&report.report_path, render_report(&report, now))?;

    tracing::info!(
        files = report.files.len(),
        failures = report.failures.len(),
        changed = report.total_changed(),
        version = %version,
        "Canonicalization complete"
    );
    Ok(report)
}

pub fn render_report(report: &DirectoryReport, now: DateTime<Utc>) -> String {
    let mut out = format!(
        "JSON Fix Report {}\n",
        now.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    for f in &report.files {
        out.push_str(&format!(
            "{}: {} changed -> {}\n",
            f.input,
            f.changed,
            f.output_name()
        ));
        if f.skipped > 0 {
            out.push_str(&format!("{}: {} malformed entries skipped\n", f.input, f.skipped));
        }
    }
    for (name, reason) in &report.failures {
        out.push_str(&format!("{name}: not processed ({reason})\n"));
    }
    out.push_str(&format!("Total changed: {}\n", report.total_changed()));
    out
}
