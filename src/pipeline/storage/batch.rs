//! Loading of QA batch files.
//!
//! Accepted shapes: a JSON array of records, an object `{"questions": [...]}`,
//! or several arrays written back to back (`[...][...]`), which appending
//! tools leave behind. Concatenated fragments are read as a stream of JSON
//! values; a fragment or record that fails is skipped with a warning and
//! reading resumes at the next `][` seam after the failure.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Deserializer, Value};

use super::record_store::QaRecord;
use super::StoreError;

static FRAGMENT_SEAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\]\s*\[").expect("valid regex"));

#[derive(Debug, Default)]
pub struct LoadedBatch {
    pub records: Vec<QaRecord>,
    pub skipped_fragments: usize,
    pub skipped_records: usize,
}

impl LoadedBatch {
    pub fn skipped(&self) -> usize {
        self.skipped_fragments + self.skipped_records
    }
}

pub fn load_batch(path: &Path) -> Result<LoadedBatch, StoreError> {
    let text = std::fs::read_to_string(path)?;
    parse_batch(&text)
}

pub fn parse_batch(text: &str) -> Result<LoadedBatch, StoreError> {
    let mut batch = LoadedBatch::default();

    match serde_json::from_str::<Value>(text) {
        Ok(value) => {
            let items = top_level_items(value)?;
            push_records(&mut batch, items);
        }
        Err(whole_err) => {
            let parsed_any = parse_fragments(&mut batch, text);
            if !parsed_any {
                if batch.skipped_fragments < 2 {
                    return Err(StoreError::Json(whole_err));
                }
                return Err(StoreError::Malformed(batch.skipped_fragments));
            }
        }
    }

    Ok(batch)
}

fn top_level_items(value: Value) -> Result<Vec<Value>, StoreError> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("questions") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(StoreError::UnsupportedShape(
                "object without a \"questions\" array".into(),
            )),
        },
        other => Err(StoreError::UnsupportedShape(format!(
            "top-level {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn push_records(batch: &mut LoadedBatch, items: Vec<Value>) {
    for item in items {
        match serde_json::from_value::<QaRecord>(item) {
            Ok(record) => batch.records.push(record),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed record");
                batch.skipped_records += 1;
            }
        }
    }
}

/// Read back-to-back JSON values. Returns whether any fragment parsed.
fn parse_fragments(batch: &mut LoadedBatch, text: &str) -> bool {
    let mut parsed_any = false;
    let mut offset = 0;
    let mut index = 0;

    while offset < text.len() {
        let mut stream = Deserializer::from_str(&text[offset..]).into_iter::<Value>();
        let failed_at = loop {
            match stream.next() {
                Some(Ok(value)) => {
                    match top_level_items(value) {
                        Ok(items) => {
                            parsed_any = true;
                            push_records(batch, items);
                        }
                        Err(e) => {
                            tracing::warn!(fragment = index, error = %e, "Skipping batch fragment");
                            batch.skipped_fragments += 1;
                        }
                    }
                    index += 1;
                }
                Some(Err(e)) => {
                    tracing::warn!(fragment = index, error = %e, "Skipping malformed batch fragment");
                    batch.skipped_fragments += 1;
                    index += 1;
                    break Some(offset + stream.byte_offset());
                }
                None => break None,
            }
        };

        offset = match failed_at.and_then(|at| next_seam(text, at + 1)) {
            Some(next) => next,
            None => text.len(),
        };
    }

    parsed_any
}

/// Position of the `[` opening the next fragment at or after `from`.
fn next_seam(text: &str, from: usize) -> Option<usize> {
    let from = (from..=text.len()).find(|&i| text.is_char_boundary(i))?;
    FRAGMENT_SEAM_RE.find_at(text, from).map(|seam| seam.end() - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::storage::Answer;

    #[test]
    fn parses_plain_array() {
        let text = r#"[{"id": 1, "pdf": "a.pdf", "question": "Was ist eine OG?", "answer": "", "description": ""}]"#;
        let batch = parse_batch(text).unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.skipped(), 0);
    }

    #[test]
    fn parses_questions_object() {
        let text = r#"{"questions": [{"question_text": "Was ist Prokura?", "correct_answer": "Vollmacht"}]}"#;
        let batch = parse_batch(text).unwrap();
        assert_eq!(batch.records[0].question, "Was ist Prokura?");
        assert_eq!(batch.records[0].answer, Answer::from("Vollmacht"));
    }

    #[test]
    fn recovers_concatenated_arrays() {
        let text = "[{\"id\": 1, \"question\": \"Frage eins?\"}]\n[{\"id\": 2, \"question\": \"Frage zwei?\"}]";
        let batch = parse_batch(text).unwrap();
        let ids: Vec<u64> = batch.records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn brackets_inside_strings_do_not_split_records() {
        let text = r#"[{"id": 1, "question": "Quelle [1] [2] Was ist eine OG?"}][{"id": 2, "question": "Was ist eine KG?"}]"#;
        let batch = parse_batch(text).unwrap();
        let ids: Vec<u64> = batch.records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(batch.records[0].question, "Quelle [1] [2] Was ist eine OG?");
        assert_eq!(batch.skipped(), 0);
    }

    #[test]
    fn skips_broken_fragment() {
        let text = "[{\"id\": 1, \"question\": \"Frage eins?\"}][{\"id\": 2, \"question\": }][{\"id\": 3, \"question\": \"Frage drei?\"}]";
        let batch = parse_batch(text).unwrap();
        let ids: Vec<u64> = batch.records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(batch.skipped_fragments, 1);
    }

    #[test]
    fn skips_record_without_question() {
        let text = r#"[{"id": 1, "question": "Frage eins?"}, {"id": 2, "answer": "x"}, 17]"#;
        let batch = parse_batch(text).unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.skipped_records, 2);
    }

    #[test]
    fn unparseable_text_is_an_error() {
        assert!(matches!(parse_batch("not json"), Err(StoreError::Json(_))));
        assert!(matches!(parse_batch("[x][y]"), Err(StoreError::Malformed(2))));
    }

    #[test]
    fn rejects_unsupported_shapes() {
        assert!(matches!(parse_batch("42"), Err(StoreError::UnsupportedShape(_))));
        assert!(matches!(
            parse_batch(r#"{"items": []}"#),
            Err(StoreError::UnsupportedShape(_))
        ));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.json");
        std::fs::write(&path, r#"[{"question": "Was ist Skonto?"}]"#).unwrap();
        assert_eq!(load_batch(&path).unwrap().records.len(), 1);
    }
}
