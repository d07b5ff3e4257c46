use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;

use super::StoreError;
use crate::pipeline::mining::CollectedItem;

/// Heading of the Q&A overview file.
pub const OVERVIEW_HEADING: &str = "--- Q&A Übersicht ---";

/// Answer of a record: free text, or a list once canonicalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Text(String),
    List(Vec<String>),
}

impl Default for Answer {
    fn default() -> Self {
        Answer::Text(String::new())
    }
}

impl Answer {
    pub fn is_blank(&self) -> bool {
        match self {
            Answer::Text(text) => text.trim().is_empty(),
            Answer::List(items) => items.iter().all(|i| i.trim().is_empty()),
        }
    }
}

impl From<&str> for Answer {
    fn from(text: &str) -> Self {
        Answer::Text(text.to_string())
    }
}

/// One extracted study item.
///
/// Batches written by other tools use `question_text` / `correct_answer`;
/// both are read as aliases. Fields this crate does not know are kept in
/// `extra` and written back unchanged.
/// A `null` value reads like a missing one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pdf: String,
    #[serde(alias = "question_text", deserialize_with = "null_as_default")]
    pub question: String,
    #[serde(default, alias = "correct_answer", deserialize_with = "null_as_default")]
    pub answer: Answer,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl QaRecord {
    pub fn new(id: u64, pdf: &str, question: &str, answer: Answer, description: &str) -> Self {
        Self {
            id,
            pdf: pdf.to_string(),
            question: question.to_string(),
            answer,
            description: description.to_string(),
            extra: Map::new(),
        }
    }
}

/// Owns record-id allocation for one run. Ids start at 1, increase by one
/// per record and are never reused.
#[derive(Debug)]
pub struct RunContext {
    next_id: u64,
}

impl RunContext {
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    /// Continue numbering after the highest id in `existing`.
    pub fn continue_after(existing: &[QaRecord]) -> Self {
        let max = existing.iter().map(|r| r.id).max().unwrap_or(0);
        Self { next_id: max + 1 }
    }

    pub fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn peek_next(&self) -> u64 {
        self.next_id
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Append-only collection of the records of one extraction run.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: Vec<QaRecord>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from records of an earlier batch; new records follow them.
    pub fn with_records(records: Vec<QaRecord>) -> Self {
        Self { records }
    }

    pub fn append(&mut self, ctx: &mut RunContext, item: CollectedItem) -> &QaRecord {
        let id = ctx.allocate_id();
        self.records.push(QaRecord {
            id,
            pdf: item.document,
            question: item.question,
            answer: Answer::Text(item.answer),
            description: item.description,
            extra: Map::new(),
        });
        &self.records[self.records.len() - 1]
    }

    pub fn records(&self) -> &[QaRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the records as a pretty JSON array. The target is replaced
    /// atomically: readers see the old file or the complete new one.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        write_records(path, &self.records)
    }

    pub fn render_overview(&self) -> String {
        render_overview(&self.records)
    }
}

pub fn write_records(path: &Path, records: &[QaRecord]) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, records)?;
    tmp.write_all(b"\n")?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| StoreError::Persist {
        path: path.to_path_buf(),
        reason: e.error.to_string(),
    })?;
    Ok(())
}

/// `Q<id> (aus <pdf>): <question>` per record under [`OVERVIEW_HEADING`].
pub fn render_overview(records: &[QaRecord]) -> String {
    let mut out = String::from(OVERVIEW_HEADING);
    out.push('\n');
    for r in records {
        out.push_str(&format!("Q{} (aus {}): {}\n", r.id, r.pdf, r.question));
    }
    out
}
