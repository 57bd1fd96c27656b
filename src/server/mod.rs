// HTTP surface: the ask endpoint, the offline-tool trigger routes, and the
// static landing page. The vector store is initialized exactly once here,
// before the router starts, and is read-only afterwards.

#[cfg(test)]
mod tests;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, info};

use crate::api::AipipeClient;
use crate::config::Config;
use crate::logbook::QuestionLog;
use crate::pipeline::{AskPipeline, AskResponse};
use crate::store::KnowledgeStore;
use crate::{Result, TaError};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pipeline: Arc<AskPipeline<KnowledgeStore>>,
}

/// Body of the ask endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    pub question: String,
    /// Optional base64-encoded image
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScrapeForumParams {
    limit_title_pages: Option<u32>,
}

/// Build the store and pipeline, then serve until the process is stopped.
#[inline]
pub async fn run_server(config: Config) -> Result<()> {
    let store = KnowledgeStore::connect(&config).await?;
    let loaded = store.initialize().await?;
    info!("Vector store ready with {} rows", loaded);

    let client = Arc::new(
        AipipeClient::new(&config).map_err(|e| TaError::Config(e.to_string()))?,
    );
    let questions = QuestionLog::new(&config.paths.question_log_dir);
    let pipeline = Arc::new(AskPipeline::new(Arc::new(store), client, questions));

    let bind = config.server.bind.clone();
    let static_dir = config.server.static_dir.clone();
    let state = AppState {
        config: Arc::new(config),
        pipeline,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/ask", post(ask_question))
        .route("/api/ask/", post(ask_question))
        .route("/scrap/discourse", get(trigger_forum_scrape))
        .route("/scrap/content", get(trigger_content_crawl))
        .route("/form_kb", get(trigger_build_kb))
        .route("/make_embeds", get(trigger_make_embeds))
        .fallback_service(ServeDir::new(static_dir))
        .layer(cors)
        .with_state(state);

    info!("Listening on http://{}", bind);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| TaError::Server(e.to_string()))?;

    Ok(())
}

/// Request-path failures surface as a generic 500 with no detail; the
/// cause is logged server-side only.
struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("Request failed: {:#}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "internal server error" })),
        )
            .into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(error: E) -> Self {
        Self(error.into())
    }
}

async fn ask_question(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> std::result::Result<Json<AskResponse>, AppError> {
    let response = state
        .pipeline
        .answer(&request.question, request.image.as_deref())
        .await?;
    Ok(Json(response))
}

async fn trigger_forum_scrape(
    State(state): State<AppState>,
    Query(params): Query<ScrapeForumParams>,
) -> std::result::Result<Json<serde_json::Value>, AppError> {
    let config = Arc::clone(&state.config);
    let summary = tokio::task::spawn_blocking(move || {
        crate::forum::scrape_forum(&config, params.limit_title_pages)
    })
    .await
    .map_err(|e| anyhow::anyhow!("Forum scrape task panicked: {}", e))??;

    Ok(Json(serde_json::json!({
        "message": "Forum scrape finished",
        "posts_fetched": summary.posts_fetched,
        "posts_total": summary.posts_total,
    })))
}

async fn trigger_content_crawl(
    State(state): State<AppState>,
) -> std::result::Result<Json<serde_json::Value>, AppError> {
    let config = Arc::clone(&state.config);
    let summary =
        tokio::task::spawn_blocking(move || crate::crawler::crawl_course_content(&config))
            .await
            .map_err(|e| anyhow::anyhow!("Content crawl task panicked: {}", e))??;

    Ok(Json(serde_json::json!({
        "message": "Course-content crawl finished",
        "pages_saved": summary.pages_saved,
    })))
}

async fn trigger_build_kb(
    State(state): State<AppState>,
) -> std::result::Result<Json<serde_json::Value>, AppError> {
    let config = Arc::clone(&state.config);
    let documents =
        tokio::task::spawn_blocking(move || crate::kb::build_knowledge_base(&config))
            .await
            .map_err(|e| anyhow::anyhow!("KB build task panicked: {}", e))??;

    Ok(Json(serde_json::json!({
        "message": "Knowledge base formatted",
        "documents": documents,
    })))
}

async fn trigger_make_embeds(
    State(state): State<AppState>,
) -> std::result::Result<Json<serde_json::Value>, AppError> {
    let config = Arc::clone(&state.config);
    let documents =
        tokio::task::spawn_blocking(move || crate::kb::embed::generate_embeddings(&config))
            .await
            .map_err(|e| anyhow::anyhow!("Embedding task panicked: {}", e))??;

    Ok(Json(serde_json::json!({
        "message": "Embeddings generated",
        "documents": documents,
    })))
}
