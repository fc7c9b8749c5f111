pub mod builtin;

use serde::{ Deserialize, Serialize };
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Mild => "mild",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
        };
        write!(f, "{}", name)
    }
}

/// Broad body-system tags. Serialized as their Korean labels so knowledge
/// files read the same as the rendered responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Category {
    #[serde(rename = "신경계")]
    Neurological,
    #[serde(rename = "통증")]
    Pain,
    #[serde(rename = "전신증상")]
    Systemic,
    #[serde(rename = "소화기계")]
    Digestive,
    #[serde(rename = "호흡기계")]
    Respiratory,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::Neurological => "신경계",
            Category::Pain => "통증",
            Category::Systemic => "전신증상",
            Category::Digestive => "소화기계",
            Category::Respiratory => "호흡기계",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One advisory sentence per severity tier.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SeverityAdvice {
    pub mild: String,
    pub moderate: String,
    pub severe: String,
}

impl SeverityAdvice {
    pub fn for_level(&self, severity: Severity) -> &str {
        match severity {
            Severity::Mild => &self.mild,
            Severity::Moderate => &self.moderate,
            Severity::Severe => &self.severe,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SymptomEntry {
    pub name: String,
    pub keywords: Vec<String>,
    pub categories: Vec<Category>,
    pub related_symptoms: Vec<String>,
    pub possible_conditions: Vec<String>,
    pub severity_advice: SeverityAdvice,
    pub treatment: String,
    pub warning: String,
}

impl SymptomEntry {
    /// Literal substring containment, no normalization.
    pub fn matches(&self, input: &str) -> bool {
        self.keywords.iter().any(|keyword| input.contains(keyword.as_str()))
    }
}

/// Intensifier substrings used to infer a single severity per turn.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Intensifiers {
    pub severe: Vec<String>,
    pub moderate: Vec<String>,
}

impl Default for Intensifiers {
    fn default() -> Self {
        Self {
            severe: vec!["심한".into(), "극심한".into(), "매우".into()],
            moderate: vec!["조금".into(), "약간".into()],
        }
    }
}

impl Intensifiers {
    /// Severe wins over moderate; mild when neither is present.
    pub fn infer(&self, input: &str) -> Severity {
        if self.severe.iter().any(|word| input.contains(word.as_str())) {
            Severity::Severe
        } else if self.moderate.iter().any(|word| input.contains(word.as_str())) {
            Severity::Moderate
        } else {
            Severity::Mild
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidKnowledge {
    #[error("symptom entry with empty name")]
    EmptyName,
    #[error("symptom '{0}' has no keywords")]
    NoKeywords(String),
    #[error("symptom '{0}' has an empty keyword")]
    EmptyKeyword(String),
    #[error("duplicate symptom name '{0}'")]
    DuplicateName(String),
    #[error("{0} intensifier set is empty")]
    NoIntensifiers(Severity),
}

/// Read-only symptom table. Iteration order is insertion order and is the
/// order matched entries are reported in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct KnowledgeBase {
    symptoms: Vec<SymptomEntry>,
    #[serde(default)]
    intensifiers: Intensifiers,
}

impl KnowledgeBase {
    pub fn new(
        symptoms: Vec<SymptomEntry>,
        intensifiers: Intensifiers
    ) -> Result<Self, InvalidKnowledge> {
        let knowledge = Self { symptoms, intensifiers };
        knowledge.validate()?;
        Ok(knowledge)
    }

    pub fn validate(&self) -> Result<(), InvalidKnowledge> {
        let mut seen = HashSet::new();
        for entry in &self.symptoms {
            if entry.name.is_empty() {
                return Err(InvalidKnowledge::EmptyName);
            }
            if entry.keywords.is_empty() {
                return Err(InvalidKnowledge::NoKeywords(entry.name.clone()));
            }
            // An empty keyword is a substring of every input.
            if entry.keywords.iter().any(|k| k.is_empty()) {
                return Err(InvalidKnowledge::EmptyKeyword(entry.name.clone()));
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(InvalidKnowledge::DuplicateName(entry.name.clone()));
            }
        }
        if self.intensifiers.severe.is_empty() {
            return Err(InvalidKnowledge::NoIntensifiers(Severity::Severe));
        }
        if self.intensifiers.moderate.is_empty() {
            return Err(InvalidKnowledge::NoIntensifiers(Severity::Moderate));
        }
        Ok(())
    }

    pub fn entries(&self) -> impl Iterator<Item = &SymptomEntry> {
        self.symptoms.iter()
    }

    pub fn get(&self, name: &str) -> Option<&SymptomEntry> {
        self.symptoms.iter().find(|entry| entry.name == name)
    }

    pub fn intensifiers(&self) -> &Intensifiers {
        &self.intensifiers
    }

    pub fn len(&self) -> usize {
        self.symptoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symptoms.is_empty()
    }
}
