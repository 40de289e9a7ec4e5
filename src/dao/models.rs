use serde::{Deserialize, Serialize};

use crate::state::game::{Difficulty, Provenance};

/// Question as stored in the question bank files.
///
/// Field names follow the on-disk bank format (`q`, `answer`, `source`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Question text.
    #[serde(rename = "q")]
    pub text: String,
    /// Answer options; playable questions carry exactly four.
    pub options: Vec<String>,
    /// Index of the correct option.
    pub answer: usize,
    /// Category label.
    pub category: String,
    /// Difficulty bucket.
    pub difficulty: Difficulty,
    /// Curated (`static`) or user-submitted.
    #[serde(default = "default_source")]
    pub source: Provenance,
    /// RFC 3339 timestamp set when a user submission is stored.
    #[serde(default, rename = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

fn default_source() -> Provenance {
    Provenance::Curated
}

/// Everything the catalog holds at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogEntity {
    /// Curated questions followed by user submissions.
    pub questions: Vec<QuestionEntity>,
    /// Declared categories, lowercase.
    pub categories: Vec<String>,
}
