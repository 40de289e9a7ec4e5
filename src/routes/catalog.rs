use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
};
use axum_valid::Valid;

use crate::{
    dto::catalog::{
        CatalogSummary, CategoryCreated, CategoryList, NewCategoryRequest, NewQuestionRequest,
        QuestionDto, QuestionListQuery,
    },
    error::AppError,
    services::catalog_service,
    state::SharedState,
};

/// Question bank endpoints used by the host screen and the question form.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/questions", get(list_questions).post(create_question))
        .route("/api/categories", get(list_categories).post(create_category))
        .route("/api/catalog", get(catalog_summary))
}

/// List questions of the bank, optionally filtered by provenance.
#[utoipa::path(
    get,
    path = "/api/questions",
    tag = "catalog",
    params(QuestionListQuery),
    responses(
        (status = 200, description = "Questions of the bank", body = [QuestionDto]),
        (status = 503, description = "Question bank unavailable")
    )
)]
pub async fn list_questions(
    State(state): State<SharedState>,
    Query(query): Query<QuestionListQuery>,
) -> Result<Json<Vec<QuestionDto>>, AppError> {
    Ok(Json(
        catalog_service::list_questions(&state, query.source).await?,
    ))
}

/// Submit a new user question.
#[utoipa::path(
    post,
    path = "/api/questions",
    tag = "catalog",
    request_body = NewQuestionRequest,
    responses(
        (status = 201, description = "Question stored", body = QuestionDto),
        (status = 400, description = "Invalid question"),
        (status = 409, description = "A question with the same text exists"),
        (status = 503, description = "Question bank unavailable")
    )
)]
pub async fn create_question(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<NewQuestionRequest>>,
) -> Result<(StatusCode, Json<QuestionDto>), AppError> {
    let question = catalog_service::create_question(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

/// List known categories.
#[utoipa::path(
    get,
    path = "/api/categories",
    tag = "catalog",
    responses(
        (status = 200, description = "Sorted category names", body = CategoryList),
        (status = 503, description = "Question bank unavailable")
    )
)]
pub async fn list_categories(
    State(state): State<SharedState>,
) -> Result<Json<CategoryList>, AppError> {
    Ok(Json(catalog_service::list_categories(&state).await?))
}

/// Declare a category.
#[utoipa::path(
    post,
    path = "/api/categories",
    tag = "catalog",
    request_body = NewCategoryRequest,
    responses(
        (status = 200, description = "Category stored or already present", body = CategoryCreated),
        (status = 400, description = "Invalid category name"),
        (status = 503, description = "Question bank unavailable")
    )
)]
pub async fn create_category(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<NewCategoryRequest>>,
) -> Result<Json<CategoryCreated>, AppError> {
    Ok(Json(catalog_service::add_category(&state, payload).await?))
}

/// Summarise the bank per category and provenance.
#[utoipa::path(
    get,
    path = "/api/catalog",
    tag = "catalog",
    responses(
        (status = 200, description = "Bank summary", body = CatalogSummary),
        (status = 503, description = "Question bank unavailable")
    )
)]
pub async fn catalog_summary(
    State(state): State<SharedState>,
) -> Result<Json<CatalogSummary>, AppError> {
    Ok(Json(catalog_service::catalog_summary(&state).await?))
}
