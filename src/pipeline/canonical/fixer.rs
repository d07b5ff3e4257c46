use std::sync::LazyLock;

use regex::Regex;

use super::table::CanonicalTable;
use super::topic::{infer_aspect, infer_topic, Topic};
use crate::pipeline::storage::{Answer, QaRecord};

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)siehe\s*le(?:rn|hr)text|korrekte\s*bezeichnung|platzhalter|\btbd\b|\btodo\b")
        .expect("valid regex")
});

static ADVANTAGES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\**\s*vor-?\s?teile").expect("valid regex"));

static DISADVANTAGES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\**\s*nachteile").expect("valid regex"));

const TWO_ITEM_CUES: &[&str] = &["2 merkmal", "zwei merkmal", "2 eigenschaft", "zwei eigenschaft"];

/// Remove placeholder markers and bare `?` runs. Text without either is
/// returned unchanged; otherwise whitespace is collapsed.
pub fn strip_placeholders(text: &str) -> String {
    let has_marker = PLACEHOLDER_RE.is_match(text);
    let has_bare_marks = text.split_whitespace().any(is_question_marks);
    if !has_marker && !has_bare_marks {
        return text.to_string();
    }

    let replaced = PLACEHOLDER_RE.replace_all(text, " ");
    replaced
        .split_whitespace()
        .filter(|token| !is_question_marks(token))
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_question_marks(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c == '?')
}

pub fn demands_two_items(question: &str) -> bool {
    let lower = question.to_lowercase();
    TWO_ITEM_CUES.iter().any(|cue| lower.contains(cue))
}

/// Append each canonical phrase not already contained (case-insensitive)
/// in one of `items`.
fn append_missing(items: &mut Vec<String>, canon: &[String]) {
    let present: Vec<String> = items.iter().map(|i| i.trim().to_lowercase()).collect();
    for phrase in canon {
        let needle = phrase.to_lowercase();
        if !present.iter().any(|p| p.contains(&needle)) {
            items.push(phrase.clone());
        }
    }
}

fn complete_prompt(question: &str, topic: Option<Topic>) -> Option<String> {
    let kind = if ADVANTAGES_RE.is_match(question) {
        "Vorteile"
    } else if DISADVANTAGES_RE.is_match(question) {
        "Nachteile"
    } else {
        return None;
    };
    Some(match topic {
        Some(topic) => format!("{kind} der {}: Nennen Sie 2–3 Punkte.", topic.label()),
        None => format!("{kind}: Nennen Sie 2–3 Punkte."),
    })
}

/// Normalizes persisted records against a [`CanonicalTable`].
///
/// Re-running over its own output changes nothing as long as the table
/// stays the same.
pub struct Canonicalizer {
    table: CanonicalTable,
}

impl Canonicalizer {
    pub fn new(table: CanonicalTable) -> Self {
        Self { table }
    }

    /// Fix one record in place. Returns whether anything changed.
    pub fn fix_record(&self, record: &mut QaRecord) -> bool {
        let before = record.clone();

        record.question = strip_placeholders(&record.question);
        record.answer = match std::mem::take(&mut record.answer) {
            Answer::Text(text) => Answer::Text(strip_placeholders(&text)),
            Answer::List(items) => Answer::List(
                items
                    .iter()
                    .map(|item| strip_placeholders(item))
                    .filter(|item| !item.trim().is_empty())
                    .collect(),
            ),
        };

        let topic = infer_topic(&record.question);
        let aspect = infer_aspect(&record.question, topic);

        if let Some(prompt) = complete_prompt(&record.question, topic) {
            record.question = prompt;
        }

        let canon = topic
            .zip(aspect)
            .and_then(|(topic, aspect)| self.table.lookup(topic, aspect));

        if let Some(canon) = canon {
            if record.answer.is_blank() {
                record.answer = match canon {
                    [single] => Answer::Text(single.clone()),
                    _ => Answer::List(canon.to_vec()),
                };
            } else if let Answer::List(items) = &mut record.answer {
                append_missing(items, canon);
            }
        }

        if demands_two_items(&record.question) {
            if let Answer::Text(text) = &record.answer {
                if !text.trim().is_empty() {
                    let mut items = vec![text.clone()];
                    if let Some(canon) = canon {
                        append_missing(&mut items, canon);
                    }
                    record.answer = Answer::List(items);
                }
            }
        }

        let changed = *record != before;
        if changed {
            tracing::debug!(
                id = record.id,
                topic = topic.map(|t| t.as_str()),
                aspect = aspect.map(|a| a.as_str()),
                "Record canonicalized"
            );
        }
        changed
    }

    /// Fix every record, returning the number changed.
    pub fn fix_all(&self, records: &mut [QaRecord]) -> usize {
        records
            .iter_mut()
            .map(|r| self.fix_record(r))
            .filter(|changed| *changed)
            .count()
    }
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self::new(CanonicalTable::builtin())
    }
}
