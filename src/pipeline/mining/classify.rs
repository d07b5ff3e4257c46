use std::sync::LazyLock;

use regex::Regex;

use super::types::{Classification, MatcherKind};

/// One independent question heuristic over a chunk's text.
///
/// Matchers never see each other; the classifier takes the union of all
/// of them, so adding one never changes what the others decide.
pub trait QuestionMatcher: Send + Sync {
    fn kind(&self) -> MatcherKind;
    fn matches(&self, text: &str) -> bool;
}

// ── Terminal mark ─────────────────────────────────────────

/// Chunk ends with `?`, ignoring trailing whitespace.
pub struct TerminalMarkMatcher;

impl QuestionMatcher for TerminalMarkMatcher {
    fn kind(&self) -> MatcherKind {
        MatcherKind::TerminalMark
    }

    fn matches(&self, text: &str) -> bool {
        text.trim_end().ends_with('?')
    }
}

// ── Calculation cue ───────────────────────────────────────

static DIGIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d").expect("valid regex"));

/// Words that ask for a computation.
static CALC_PROMPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)berechne|errechne|ermittle|ermitteln|bestimme|kalkuliere|wie\s+viel|wieviel|wie\s+hoch|rechnen\s+sie",
    )
    .expect("valid regex")
});

/// Commercial quantities that are usually the object of a computation.
static CALC_TERM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)gewinn|kosten|preis|umsatz|deckungsbeitrag|break[- ]?even|rentabilit[aä]t|wirtschaftlichkeit|lager|bestellmenge|zins|skonto|rabatt|wechselkurs|\broi\b|cashflow|amortisation|kapitalwert",
    )
    .expect("valid regex")
});

/// A stated result ("beträgt", "ergibt", "=") marks an answer, not a task.
static STATED_RESULT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bbeträgt\b|\bbetragen\b|\bergibt\b|\bergeben\b|\bliegt\s+bei\b|=")
        .expect("valid regex")
});

/// Chunk holds a digit and a computation prompt, or a digit and a
/// commercial quantity without a stated result.
pub struct CalculationCueMatcher;

impl QuestionMatcher for CalculationCueMatcher {
    fn kind(&self) -> MatcherKind {
        MatcherKind::CalculationCue
    }

    fn matches(&self, text: &str) -> bool {
        if !DIGIT_RE.is_match(text) {
            return false;
        }
        if CALC_PROMPT_RE.is_match(text) {
            return true;
        }
        CALC_TERM_RE.is_match(text) && !STATED_RESULT_RE.is_match(text)
    }
}

// ── Headed task ───────────────────────────────────────────

static HEADED_TASK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:aufgaben?|arbeitsauftrag|fragestellung|fragen|übung|case|fallstudie)[:\s•\-]+\S",
    )
    .expect("valid regex")
});

/// Chunk opens with an exercise header ("Aufgabe 3: ...", "Übung - ...").
pub struct HeadedTaskMatcher;

impl QuestionMatcher for HeadedTaskMatcher {
    fn kind(&self) -> MatcherKind {
        MatcherKind::HeadedTask
    }

    fn matches(&self, text: &str) -> bool {
        HEADED_TASK_RE.is_match(text.trim_start())
    }
}

// ── Imperative prompt ─────────────────────────────────────

static IMPERATIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:beschreiben|erläutern|erklären|begründen|nennen|vergleichen|analysieren|diskutieren|bewerten|zeigen|stellen|formulieren|identifizieren|gliedern|skizzieren|berechnen|bestimmen|ermitteln|rechnen|prüfen|beweisen)\w*\s+\S",
    )
    .expect("valid regex")
});

/// Chunk opens with an instruction verb ("Erläutern Sie ...").
pub struct ImperativePromptMatcher;

impl QuestionMatcher for ImperativePromptMatcher {
    fn kind(&self) -> MatcherKind {
        MatcherKind::ImperativePrompt
    }

    fn matches(&self, text: &str) -> bool {
        IMPERATIVE_RE.is_match(text.trim_start())
    }
}

// ── Classifier ────────────────────────────────────────────

/// Fixed, ordered set of matchers. A chunk is a question when any fires.
pub struct QuestionClassifier {
    matchers: Vec<Box<dyn QuestionMatcher>>,
}

impl QuestionClassifier {
    /// Terminal mark and calculation cue.
    pub fn standard() -> Self {
        Self {
            matchers: vec![Box::new(TerminalMarkMatcher), Box::new(CalculationCueMatcher)],
        }
    }

    /// Standard matchers plus headed-task and imperative-prompt.
    pub fn extended() -> Self {
        Self::standard()
            .with_matcher(Box::new(HeadedTaskMatcher))
            .with_matcher(Box::new(ImperativePromptMatcher))
    }

    pub fn from_flag(extended: bool) -> Self {
        if extended {
            Self::extended()
        } else {
            Self::standard()
        }
    }

    pub fn with_matcher(mut self, matcher: Box<dyn QuestionMatcher>) -> Self {
        self.matchers.push(matcher);
        self
    }

    pub fn matcher_kinds(&self) -> Vec<MatcherKind> {
        self.matchers.iter().map(|m| m.kind()).collect()
    }

    /// Run every matcher; no short-circuit, so provenance is complete.
    pub fn classify(&self, text: &str) -> Classification {
        Classification {
            matched: self
                .matchers
                .iter()
                .filter(|m| m.matches(text))
                .map(|m| m.kind())
                .collect(),
        }
    }

    pub fn is_question(&self, text: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(text))
    }
}
