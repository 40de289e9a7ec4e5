use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the trivia backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::websocket::ws_handler,
        crate::routes::catalog::list_questions,
        crate::routes::catalog::create_question,
        crate::routes::catalog::list_categories,
        crate::routes::catalog::create_category,
        crate::routes::catalog::catalog_summary,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::catalog::QuestionDto,
            crate::dto::catalog::NewQuestionRequest,
            crate::dto::catalog::NewCategoryRequest,
            crate::dto::catalog::CategoryCreated,
            crate::dto::catalog::CategoryList,
            crate::dto::catalog::CatalogSummary,
            crate::dto::catalog::QuestionSource,
            crate::state::game::Difficulty,
            crate::state::game::Provenance,
            crate::dto::ws::JoinPayload,
            crate::dto::ws::StartPayload,
            crate::dto::ws::LobbyPayload,
            crate::dto::ws::QuestionPayload,
            crate::dto::ws::AnswerCounts,
            crate::dto::ws::RevealPayload,
            crate::dto::ws::EndPayload,
            crate::dto::ws::PlayerJoinedPayload,
            crate::dto::ws::ErrorPayload,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "catalog", description = "Question bank management"),
        (name = "session", description = "Live session WebSocket; frames are {event, data} envelopes"),
    )
)]
pub struct ApiDoc;
