use super::classify::QuestionClassifier;
use super::types::{Chunk, CollectedItem};

/// Pairs question chunks with the chunks that follow them.
///
/// Scanning from a question stops at the next question or at an empty
/// chunk, and never takes more than `max_chunks`. The first collected
/// chunk is the answer, the second the description.
pub struct AnswerCollector<'a> {
    classifier: &'a QuestionClassifier,
    max_chunks: usize,
}

impl<'a> AnswerCollector<'a> {
    pub fn new(classifier: &'a QuestionClassifier, max_chunks: usize) -> Self {
        Self {
            classifier,
            max_chunks,
        }
    }

    /// Answer and description for the question at `index`.
    pub fn collect_at(&self, chunks: &[Chunk], index: usize) -> (String, String) {
        let mut taken: Vec<&str> = Vec::with_capacity(self.max_chunks);

        for chunk in chunks.iter().skip(index + 1) {
            if taken.len() >= self.max_chunks {
                break;
            }
            if chunk.is_empty() || self.classifier.is_question(&chunk.text) {
                break;
            }
            taken.push(chunk.text.trim());
        }

        let mut iter = taken.into_iter();
        let answer = iter.next().unwrap_or_default().to_string();
        let description = iter.next().unwrap_or_default().to_string();
        (answer, description)
    }

    /// Every question in `chunks`, in order, with its collected spans.
    pub fn mine(&self, chunks: &[Chunk]) -> Vec<CollectedItem> {
        let mut items = Vec::new();
        for (index, chunk) in chunks.iter().enumerate() {
            let classification = self.classifier.classify(&chunk.text);
            if !classification.is_question() {
                continue;
            }
            let (answer, description) = self.collect_at(chunks, index);
            tracing::debug!(
                document = %chunk.document,
                ordinal = chunk.ordinal,
                matchers = ?classification.matched.iter().map(|k| k.as_str()).collect::<Vec<_>>(),
                has_answer = !answer.is_empty(),
                "Question detected"
            );
            items.push(CollectedItem {
                document: chunk.document.clone(),
                question: chunk.text.trim().to_string(),
                answer,
                description,
                matched: classification.matched,
            });
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .enumerate()
            .map(|(ordinal, t)| Chunk {
                document: "a.pdf".into(),
                ordinal,
                text: t.to_string(),
            })
            .collect()
    }

    #[test]
    fn answer_stops_before_next_question() {
        let classifier = QuestionClassifier::standard();
        let collector = AnswerCollector::new(&classifier, 2);
        let cs = chunks(&[
            "Berechne den Gewinn?",
            "Der Gewinn beträgt 200€.",
            "Wie hoch ist der Deckungsbeitrag?",
        ]);

        let (answer, description) = collector.collect_at(&cs, 0);
        assert_eq!(answer, "Der Gewinn beträgt 200€.");
        assert_eq!(description, "");
    }

    #[test]
    fn takes_answer_and_description() {
        let classifier = QuestionClassifier::standard();
        let collector = AnswerCollector::new(&classifier, 2);
        let cs = chunks(&[
            "Was versteht man unter Prokura?",
            "Eine umfassende handelsrechtliche Vollmacht.",
            "Sie wird im Firmenbuch eingetragen.",
            "Dieser dritte Satz gehört nicht mehr dazu.",
        ]);
        let (answer, description) = collector.collect_at(&cs, 0);
        assert_eq!(answer, "Eine umfassende handelsrechtliche Vollmacht.");
        assert_eq!(description, "Sie wird im Firmenbuch eingetragen.");
    }

    #[test]
    fn question_followed_by_question_has_no_answer() {
        let classifier = QuestionClassifier::standard();
        let collector = AnswerCollector::new(&classifier, 2);
        let cs = chunks(&["Was ist eine OG?", "Was ist eine KG?", "Eine Personengesellschaft."]);
        assert_eq!(collector.collect_at(&cs, 0), (String::new(), String::new()));
    }

    #[test]
    fn empty_chunk_stops_collection() {
        let classifier = QuestionClassifier::standard();
        let collector = AnswerCollector::new(&classifier, 2);
        let cs = chunks(&["Was ist eine AG?", "  ", "Eine Kapitalgesellschaft."]);
        assert_eq!(collector.collect_at(&cs, 0), (String::new(), String::new()));
    }

    #[test]
    fn last_chunk_question_has_no_answer() {
        let classifier = QuestionClassifier::standard();
        let collector = AnswerCollector::new(&classifier, 2);
        let cs = chunks(&["Einleitender Text zum Thema.", "Was ist eine GmbH?"]);
        assert_eq!(collector.collect_at(&cs, 1), (String::new(), String::new()));
    }

    #[test]
    fn max_chunks_limits_lookahead() {
        let classifier = QuestionClassifier::standard();
        let collector = AnswerCollector::new(&classifier, 1);
        let cs = chunks(&["Was ist Skonto?", "Ein Preisnachlass.", "Bei Zahlung innerhalb der Frist."]);
        let (answer, description) = collector.collect_at(&cs, 0);
        assert_eq!(answer, "Ein Preisnachlass.");
        assert_eq!(description, "");
    }

    #[test]
    fn mine_emits_every_question_in_order() {
        let classifier = QuestionClassifier::extended();
        let collector = AnswerCollector::new(&classifier, 2);
        let cs = chunks(&[
            "Einleitung ohne Frage.",
            "Nennen Sie 2 Merkmale der OG.",
            "Die Gesellschafter haften unbeschränkt.",
            "Was ist eine KG?",
            "Eine Personengesellschaft mit Kommanditisten.",
        ]);
        let items = collector.mine(&cs);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].question, "Nennen Sie 2 Merkmale der OG.");
        assert_eq!(items[0].answer, "Die Gesellschafter haften unbeschränkt.");
        assert_eq!(items[0].description, "");
        assert_eq!(items[1].question, "Was ist eine KG?");
        assert_eq!(items[1].answer, "Eine Personengesellschaft mit Kommanditisten.");
        assert!(items.iter().all(|i| i.document == "a.pdf"));
    }

    #[test]
    fn answer_is_never_a_question() {
        let classifier = QuestionClassifier::extended();
        let collector = AnswerCollector::new(&classifier, 2);
        let cs = chunks(&[
            "Aufgabe 1: Kostenvergleich",
            "Erläutern Sie die Vollkostenrechnung.",
            "Die Vollkostenrechnung verteilt alle Kosten.",
        ]);
        for item in collector.mine(&cs) {
            if !item.answer.is_empty() {
                assert!(!classifier.is_question(&item.answer));
            }
        }
    }
}
