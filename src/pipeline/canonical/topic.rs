//! Topic and aspect inference from question text.
//!
//! A question can mention several topics ("Unterschied OG und KG"); the
//! first rule in the fixed order below wins. The order is part of the
//! contract: reordering changes which reference answers are filled in.

use std::sync::LazyLock;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Og,
    Kg,
    Gmbh,
    Ag,
    Firma,
    Prokura,
    Handlungsvollmacht,
    Unternehmer,
    Plz,
}

impl Topic {
    /// Key prefix in the canonical table.
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Og => "og",
            Topic::Kg => "kg",
            Topic::Gmbh => "gmbh",
            Topic::Ag => "ag",
            Topic::Firma => "firma",
            Topic::Prokura => "prokura",
            Topic::Handlungsvollmacht => "handlungsvollmacht",
            Topic::Unternehmer => "unternehmer",
            Topic::Plz => "plz",
        }
    }

    /// Name used when rewriting a prompt. Each label infers back to the
    /// same topic, so a rewritten prompt is stable under a second pass.
    pub fn label(&self) -> &'static str {
        match self {
            Topic::Og => "OG",
            Topic::Kg => "KG",
            Topic::Gmbh => "GmbH",
            Topic::Ag => "AG",
            Topic::Firma => "Firma",
            Topic::Prokura => "Prokura",
            Topic::Handlungsvollmacht => "Handlungsvollmacht",
            Topic::Unternehmer => "Unternehmer",
            Topic::Plz => "Produktlebenszyklus",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aspect {
    Haftung,
    Organe,
    Funktionen,
    Merkmale,
    Phasen,
}

impl Aspect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aspect::Haftung => "haftung",
            Aspect::Organe => "organe",
            Aspect::Funktionen => "funktionen",
            Aspect::Merkmale => "merkmale",
            Aspect::Phasen => "phasen",
        }
    }
}

static OG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bog\b").expect("valid regex"));
static KG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bkg\b").expect("valid regex"));
static GMBH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bgmbh\b").expect("valid regex"));
static AG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bag\b").expect("valid regex"));

pub fn infer_topic(question: &str) -> Option<Topic> {
    let t = question.to_lowercase();

    if t.contains("offene gesellschaft") || OG_RE.is_match(&t) {
        return Some(Topic::Og);
    }
    if t.contains("kommandit") || KG_RE.is_match(&t) {
        return Some(Topic::Kg);
    }
    if GMBH_RE.is_match(&t) {
        return Some(Topic::Gmbh);
    }
    // "frage" guards against "AG" in headings like "Frage AG 3"
    if AG_RE.is_match(&t) && !t.contains("frage") {
        return Some(Topic::Ag);
    }
    if t.contains("firma") && !t.contains("firmenbuch") {
        return Some(Topic::Firma);
    }
    if t.contains("prokura") {
        return Some(Topic::Prokura);
    }
    if t.contains("handlungsvollmacht") {
        return Some(Topic::Handlungsvollmacht);
    }
    if t.contains("unternehmer") {
        return Some(Topic::Unternehmer);
    }
    if t.contains("produktlebenszyklus") {
        return Some(Topic::Plz);
    }
    None
}

pub fn infer_aspect(question: &str, topic: Option<Topic>) -> Option<Aspect> {
    let t = question.to_lowercase();

    if t.contains("haftung") {
        return Some(Aspect::Haftung);
    }
    if t.contains("organe") {
        return Some(Aspect::Organe);
    }
    if t.contains("funktion") {
        return Some(Aspect::Funktionen);
    }
    if t.contains("merkmal") {
        return Some(Aspect::Merkmale);
    }
    if t.contains("phase") && topic == Some(Topic::Plz) {
        return Some(Aspect::Phasen);
    }
    None
}
