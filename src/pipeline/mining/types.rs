use serde::Serialize;

/// A sentence- or paragraph-scale span of one document's linear stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Originating document (file name).
    pub document: String,
    /// Position among the kept chunks of that document, from 0.
    pub ordinal: usize,
    pub text: String,
}

impl Chunk {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Identifies one question heuristic. Diagnostic only, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatcherKind {
    TerminalMark,
    CalculationCue,
    HeadedTask,
    ImperativePrompt,
}

impl MatcherKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TerminalMark => "terminal_mark",
            Self::CalculationCue => "calculation_cue",
            Self::HeadedTask => "headed_task",
            Self::ImperativePrompt => "imperative_prompt",
        }
    }
}

/// Every matcher that fired on a chunk, in matcher order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub matched: Vec<MatcherKind>,
}

impl Classification {
    pub fn is_question(&self) -> bool {
        !self.matched.is_empty()
    }

    pub fn fired(&self, kind: MatcherKind) -> bool {
        self.matched.contains(&kind)
    }
}

/// A question chunk paired with the spans that follow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedItem {
    pub document: String,
    pub question: String,
    /// Empty when the next chunk is a question or blank.
    pub answer: String,
    pub description: String,
    pub matched: Vec<MatcherKind>,
}
