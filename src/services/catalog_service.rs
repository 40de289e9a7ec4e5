//! Question bank operations behind the REST API.

use std::{collections::BTreeMap, collections::BTreeSet, future::Future};

use tokio::time::timeout;
use tracing::info;

use crate::{
    dao::{models::CatalogEntity, storage::StorageResult},
    dto::{
        catalog::{
            CatalogSummary, CategoryCreated, CategoryList, NewCategoryRequest, NewQuestionRequest,
            QuestionDto, QuestionSource,
        },
        validation::normalized,
    },
    error::ServiceError,
    state::{SharedState, game::Provenance},
};

/// Run a storage call under the configured catalog timeout.
async fn bounded<T>(
    state: &SharedState,
    call: impl Future<Output = StorageResult<T>>,
) -> Result<T, ServiceError> {
    timeout(state.config().catalog_timeout(), call)
        .await
        .map_err(|_| ServiceError::Timeout)?
        .map_err(ServiceError::from)
}

async fn load(state: &SharedState) -> Result<CatalogEntity, ServiceError> {
    let store = state.require_catalog_store().await?;
    bounded(state, store.load_catalog()).await
}

/// List questions filtered by provenance.
pub async fn list_questions(
    state: &SharedState,
    source: QuestionSource,
) -> Result<Vec<QuestionDto>, ServiceError> {
    let catalog = load(state).await?;
    Ok(catalog
        .questions
        .into_iter()
        .filter(|question| source.includes(question.source))
        .map(QuestionDto::from)
        .collect())
}

/// Store a validated user question, refusing duplicates of an existing text.
pub async fn create_question(
    state: &SharedState,
    request: NewQuestionRequest,
) -> Result<QuestionDto, ServiceError> {
    let store = state.require_catalog_store().await?;
    let entity = request.into_entity();

    let catalog = bounded(state, store.load_catalog()).await?;
    let key = normalized(&entity.text);
    if catalog
        .questions
        .iter()
        .any(|existing| normalized(&existing.text) == key)
    {
        return Err(ServiceError::Conflict(format!(
            "question `{}` already exists",
            entity.text
        )));
    }

    let stored = bounded(state, store.append_user_question(entity)).await?;
    info!(category = %stored.category, "user question added");
    Ok(stored.into())
}

/// Declared categories plus every category used by a question.
pub async fn list_categories(state: &SharedState) -> Result<CategoryList, ServiceError> {
    let catalog = load(state).await?;
    Ok(CategoryList {
        categories: category_union(&catalog).into_iter().collect(),
    })
}

/// Declare a category; names already listed (declared or used by a question)
/// report `created = false`.
pub async fn add_category(
    state: &SharedState,
    request: NewCategoryRequest,
) -> Result<CategoryCreated, ServiceError> {
    let store = state.require_catalog_store().await?;
    let name = request.name.trim().to_lowercase();

    let catalog = bounded(state, store.load_catalog()).await?;
    if category_union(&catalog).contains(&name) {
        return Ok(CategoryCreated {
            name,
            created: false,
        });
    }

    let created = bounded(state, store.add_category(name.clone())).await?;
    if created {
        info!(category = %name, "category added");
    }
    Ok(CategoryCreated { name, created })
}

/// Category and provenance counts of the whole bank.
pub async fn catalog_summary(state: &SharedState) -> Result<CatalogSummary, ServiceError> {
    let catalog = load(state).await?;
    Ok(summarize(&catalog))
}

fn category_union(catalog: &CatalogEntity) -> BTreeSet<String> {
    catalog
        .categories
        .iter()
        .map(String::as_str)
        .chain(catalog.questions.iter().map(|q| q.category.as_str()))
        .map(|name| name.trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}

fn summarize(catalog: &CatalogEntity) -> CatalogSummary {
    let mut counts = BTreeMap::new();
    let mut curated_count = 0;
    for question in &catalog.questions {
        *counts
            .entry(question.category.trim().to_lowercase())
            .or_insert(0) += 1;
        if question.source == Provenance::Curated {
            curated_count += 1;
        }
    }
    let total_count = catalog.questions.len();

    CatalogSummary {
        categories: category_union(catalog).into_iter().collect(),
        counts,
        curated_count,
        user_count: total_count - curated_count,
        total_count,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{catalog_store::memory::MemoryCatalogStore, models::QuestionEntity},
        state::{AppState, game::Difficulty},
    };

    fn entity(text: &str, category: &str, source: Provenance) -> QuestionEntity {
        QuestionEntity {
            text: text.into(),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            answer: 1,
            category: category.into(),
            difficulty: Difficulty::Medium,
            source,
            created_at: None,
        }
    }

    async fn state_with(catalog: CatalogEntity) -> SharedState {
        let (state, _inbox) = AppState::new(AppConfig::default());
        state
            .install_catalog_store(Arc::new(MemoryCatalogStore::new(catalog)))
            .await;
        state
    }

    fn bank() -> CatalogEntity {
        CatalogEntity {
            questions: vec![
                entity("Who wrote Hamlet?", "literature", Provenance::Curated),
                entity("Largest planet?", "Science", Provenance::Curated),
                entity("Fastest land animal?", "science", Provenance::User),
            ],
            categories: vec!["history".into(), "science".into()],
        }
    }

    fn request(text: &str) -> NewQuestionRequest {
        NewQuestionRequest {
            text: text.into(),
            options: vec!["one".into(), "two".into(), "three".into(), "four".into()],
            correct_index: 2,
            category: "Numbers".into(),
            difficulty: Difficulty::Low,
        }
    }

    #[tokio::test]
    async fn lists_questions_by_source() {
        let state = state_with(bank()).await;

        let all = list_questions(&state, QuestionSource::All).await.unwrap();
        let user = list_questions(&state, QuestionSource::User).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(user.len(), 1);
        assert_eq!(user[0].text, "Fastest land animal?");
    }

    #[tokio::test]
    async fn duplicate_question_text_conflicts() {
        let state = state_with(bank()).await;

        let err = create_question(&state, request("  who WROTE   hamlet? "))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let created = create_question(&state, request("How many sides has a hexagon?"))
            .await
            .unwrap();
        assert_eq!(created.provenance, Provenance::User);
        assert_eq!(created.category, "numbers");
        assert_eq!(
            list_questions(&state, QuestionSource::User).await.unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn categories_are_merged_and_sorted() {
        let state = state_with(bank()).await;

        let created = add_category(
            &state,
            NewCategoryRequest {
                name: " Geography ".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(created, CategoryCreated {
            name: "geography".into(),
            created: true,
        });

        let again = add_category(
            &state,
            NewCategoryRequest {
                name: "science".into(),
            },
        )
        .await
        .unwrap();
        assert!(!again.created);

        let list = list_categories(&state).await.unwrap();
        assert_eq!(list.categories, [
            "geography",
            "history",
            "literature",
            "science"
        ]);
    }

    #[tokio::test]
    async fn category_used_by_a_question_is_not_created_again() {
        let state = state_with(bank()).await;

        let listed = list_categories(&state).await.unwrap();
        assert!(listed.categories.contains(&"literature".to_string()));

        let outcome = add_category(
            &state,
            NewCategoryRequest {
                name: "Literature".into(),
            },
        )
        .await
        .unwrap();
        assert!(!outcome.created);
        assert_eq!(list_categories(&state).await.unwrap(), listed);
    }

    #[tokio::test]
    async fn summary_counts_by_category_and_source() {
        let state = state_with(bank()).await;
        let summary = catalog_summary(&state).await.unwrap();

        assert_eq!(summary.total_count, 3);
        assert_eq!(summary.curated_count, 2);
        assert_eq!(summary.user_count, 1);
        assert_eq!(summary.counts["science"], 2);
        assert_eq!(summary.counts["literature"], 1);
    }

    #[tokio::test]
    async fn degraded_state_reports_unavailable() {
        let (state, _inbox) = AppState::new(AppConfig::default());
        let err = catalog_summary(&state).await.unwrap_err();
        assert!(matches!(err, ServiceError::Degraded));
    }
}
