use std::collections::BTreeMap;
use std::path::Path;

use super::topic::{Aspect, Topic};
use super::CanonicalError;

/// Reference answers keyed `<topic>_<aspect>`, e.g. `og_haftung`.
/// Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalTable {
    entries: BTreeMap<String, Vec<String>>,
}

const BUILTIN: &[(&str, &[&str])] = &[
    ("firma_funktionen", &["Kennzeichnungsfunktion", "Unterscheidungsfunktion"]),
    ("og_haftung", &["unbeschränkt", "solidarisch"]),
    ("og_merkmale", &["unbeschränkt", "solidarisch"]),
    ("kg_haftung", &["Komplementär unbeschränkt", "Kommanditist beschränkt (Einlage)"]),
    ("kg_merkmale", &["Komplementär unbeschränkt", "Kommanditist beschränkt (Einlage)"]),
    ("gmbh_haftung", &["beschränkt auf Gesellschaftsvermögen"]),
    ("ag_organe", &["Vorstand", "Aufsichtsrat", "Hauptversammlung"]),
    (
        "prokura_merkmale",
        &["umfassende handelsrechtliche Vollmacht", "im Firmenbuch eingetragen"],
    ),
    (
        "handlungsvollmacht_merkmale",
        &["beschränkte Vollmacht", "nicht im Firmenbuch eingetragen"],
    ),
    ("unternehmer_merkmale", &["selbständig, nachhaltig", "Gewinnerzielungsabsicht"]),
    ("plz_phasen", &["Einführung", "Wachstum", "Reife", "Sättigung", "Degeneration"]),
];

impl CanonicalTable {
    /// Hand-curated facts for Austrian company law (UGB) and marketing
    /// basics.
    pub fn builtin() -> Self {
        let entries = BUILTIN
            .iter()
            .map(|(key, phrases)| {
                (
                    key.to_string(),
                    phrases.iter().map(|p| p.to_string()).collect(),
                )
            })
            .collect();
        Self { entries }
    }

    /// Parse a `{"topic_aspect": ["phrase", ...]}` object.
    pub fn from_json(text: &str) -> Result<Self, CanonicalError> {
        let entries: BTreeMap<String, Vec<String>> = serde_json::from_str(text)?;
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> Result<Self, CanonicalError> {
        let text = std::fs::read_to_string(path)?;
        let table = Self::from_json(&text)?;
        tracing::info!(path = %path.display(), entries = table.len(), "Loaded canonical table");
        Ok(table)
    }

    pub fn lookup(&self, topic: Topic, aspect: Aspect) -> Option<&[String]> {
        self.get(&format!("{}_{}", topic.as_str(), aspect.as_str()))
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries
            .get(key)
            .filter(|phrases| !phrases.is_empty())
            .map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CanonicalTable {
    fn default() -> Self {
        Self::builtin()
    }
}
