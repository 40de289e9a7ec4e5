use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationErrors};

use crate::{
    dao::models::QuestionEntity,
    dto::validation::{
        validate_category_name, validate_correct_index, validate_options, validate_question_text,
    },
    state::game::{Difficulty, Provenance},
};

/// Provenance filter for question listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum QuestionSource {
    /// Curated and user-submitted questions.
    #[default]
    All,
    /// Curated questions only.
    #[serde(alias = "static")]
    Curated,
    /// User-submitted questions only.
    User,
}

impl QuestionSource {
    /// Whether a question of `provenance` is listed.
    pub fn includes(self, provenance: Provenance) -> bool {
        match self {
            QuestionSource::All => true,
            QuestionSource::Curated => provenance == Provenance::Curated,
            QuestionSource::User => provenance == Provenance::User,
        }
    }
}

/// Query string of `GET /api/questions`.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct QuestionListQuery {
    /// `all` (default), `curated` or `user`.
    #[serde(default)]
    pub source: QuestionSource,
}

/// A question as exposed by the question bank API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDto {
    /// Question text.
    pub text: String,
    /// The four options in stored order.
    pub options: Vec<String>,
    /// Index of the correct option.
    pub correct_index: usize,
    /// Lowercase category.
    pub category: String,
    /// Difficulty bucket.
    pub difficulty: Difficulty,
    /// Curated or user-submitted.
    pub provenance: Provenance,
    /// Submission time (RFC 3339), user questions only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl From<QuestionEntity> for QuestionDto {
    fn from(value: QuestionEntity) -> Self {
        Self {
            text: value.text,
            options: value.options,
            correct_index: value.answer,
            category: value.category,
            difficulty: value.difficulty,
            provenance: value.source,
            created_at: value.created_at,
        }
    }
}

/// Body of `POST /api/questions`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewQuestionRequest {
    /// Question text, at least 8 characters.
    pub text: String,
    /// Exactly four distinct, non-empty options.
    pub options: Vec<String>,
    /// Index of the correct option, 0 to 3.
    pub correct_index: i64,
    /// Category label.
    pub category: String,
    /// `low`, `medium` or `high` (`baja`, `media`, `alta` accepted).
    pub difficulty: Difficulty,
}

impl Validate for NewQuestionRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_question_text(&self.text) {
            errors.add("text", e);
        }
        if let Err(e) = validate_options(&self.options) {
            errors.add("options", e);
        }
        if let Err(e) = validate_correct_index(self.correct_index) {
            errors.add("correctIndex", e);
        }
        if let Err(e) = validate_category_name(&self.category) {
            errors.add("category", e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl NewQuestionRequest {
    /// Normalised entity ready to be stored. Call after validation.
    pub fn into_entity(self) -> QuestionEntity {
        QuestionEntity {
            text: self.text.trim().to_string(),
            options: self
                .options
                .iter()
                .map(|option| option.trim().to_string())
                .collect(),
            answer: usize::try_from(self.correct_index).unwrap_or_default(),
            category: self.category.trim().to_lowercase(),
            difficulty: self.difficulty,
            source: Provenance::User,
            created_at: None,
        }
    }
}

/// Body of `POST /api/categories`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewCategoryRequest {
    /// Category label; stored trimmed and lowercase.
    pub name: String,
}

impl Validate for NewCategoryRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_category_name(&self.name) {
            errors.add("name", e);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Response of `POST /api/categories`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CategoryCreated {
    /// Stored category name.
    pub name: String,
    /// `false` when the category already existed.
    pub created: bool,
}

/// Response of `GET /api/categories`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CategoryList {
    /// Sorted, deduplicated category names.
    pub categories: Vec<String>,
}

/// Response of `GET /api/catalog`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSummary {
    /// Sorted, deduplicated category names.
    pub categories: Vec<String>,
    /// Number of questions per category.
    pub counts: BTreeMap<String, usize>,
    /// Curated questions.
    pub curated_count: usize,
    /// User-submitted questions.
    pub user_count: usize,
    /// All questions.
    pub total_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> NewQuestionRequest {
        NewQuestionRequest {
            text: "  Which ocean is the largest? ".into(),
            options: vec![
                "Pacific ".into(),
                "Atlantic".into(),
                "Indian".into(),
                "Arctic".into(),
            ],
            correct_index: 0,
            category: " Geography".into(),
            difficulty: Difficulty::Low,
        }
    }

    #[test]
    fn valid_request_becomes_normalised_user_entity() {
        let request = request();
        assert!(request.validate().is_ok());

        let entity = request.into_entity();
        assert_eq!(entity.text, "Which ocean is the largest?");
        assert_eq!(entity.options[0], "Pacific");
        assert_eq!(entity.category, "geography");
        assert_eq!(entity.source, Provenance::User);
    }

    #[test]
    fn every_invalid_field_is_reported() {
        let request = NewQuestionRequest {
            text: "short".into(),
            options: vec!["a".into(), "A".into(), "b".into(), "c".into()],
            correct_index: 7,
            category: "".into(),
            ..request()
        };
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        for field in ["text", "options", "correctIndex", "category"] {
            assert!(fields.contains_key(field), "missing error for {field}");
        }
    }

    #[test]
    fn difficulty_aliases_are_accepted() {
        let request: NewQuestionRequest = serde_json::from_str(
            r#"{"text":"Who painted the Mona Lisa?","options":["Leonardo","Raphael","Titian","Giotto"],"correctIndex":0,"category":"art","difficulty":"alta"}"#,
        )
        .unwrap();
        assert_eq!(request.difficulty, Difficulty::High);
    }

    #[test]
    fn static_source_means_curated() {
        let query: QuestionListQuery = serde_json::from_str(r#"{"source":"static"}"#).unwrap();
        assert_eq!(query.source, QuestionSource::Curated);
        assert!(!query.source.includes(Provenance::User));
    }
}
