//! HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/notes/{user}/{id}` | Stored note (created empty on first access) |
//! | `POST` | `/notes/{user}/{id}` | Submit `{"text": "..."}` and return the updated note |
//! | `GET`  | `/documents/{user}` | Completed documents, newest first |
//! | `POST` | `/documents/{user}` | Submit `{"content": "...", "url"?, "id"?}`, return the analyzed document |
//! | `GET`  | `/documents/{user}/{id}` | Stored document |
//! | `POST` | `/search/{user}` | Submit `{"query": "..."}`, return `{"documents": [...]}` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "Not found: document d1" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `upstream_error` (502),
//! `internal` (500).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

use threadline_core::models::{DocumentRecord, Note};
use threadline_core::pipeline::NotePipeline;

use crate::config::Config;
use crate::runtime;

#[derive(Clone)]
struct AppState {
    pipeline: Arc<NotePipeline>,
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pipeline = runtime::build_pipeline(config).await?;
    let bind_addr = config.server.bind.clone();

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "server listening");
    axum::serve(listener, router(pipeline)).await?;

    Ok(())
}

pub fn router(pipeline: NotePipeline) -> Router {
    let state = AppState {
        pipeline: Arc::new(pipeline),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/notes/{user}/{id}", get(handle_get_note).post(handle_update_note))
        .route(
            "/documents/{user}",
            get(handle_list_documents).post(handle_add_document),
        )
        .route("/documents/{user}/{id}", get(handle_get_document))
        .route("/search/{user}", post(handle_search))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

impl From<threadline_core::Error> for AppError {
    fn from(err: threadline_core::Error) -> Self {
        use threadline_core::Error;
        let message = err.to_string();
        match err {
            Error::NotFound(_) => not_found(message),
            e if e.is_external() => AppError {
                status: StatusCode::BAD_GATEWAY,
                code: "upstream_error",
                message,
            },
            _ => AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "internal",
                message,
            },
        }
    }
}

// ============ Handlers ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn handle_get_note(
    State(state): State<AppState>,
    Path((user, id)): Path<(String, String)>,
) -> Result<Json<Note>, AppError> {
    let note = state.pipeline.store().get_or_create_note(&user, &id).await?;
    Ok(Json(note))
}

#[derive(Debug, Deserialize)]
struct UpdateNoteRequest {
    text: String,
}

#[derive(Debug, Serialize)]
struct UpdateNoteResponse {
    note: Note,
    reused: bool,
}

async fn handle_update_note(
    State(state): State<AppState>,
    Path((user, id)): Path<(String, String)>,
    Json(request): Json<UpdateNoteRequest>,
) -> Result<Json<UpdateNoteResponse>, AppError> {
    if id.trim().is_empty() {
        return Err(bad_request("note id must not be empty"));
    }
    let update = state
        .pipeline
        .update_note(&user, &id, &request.text)
        .await
        .map_err(|e| {
            warn!(user = %user, note_id = %id, error = %e, "note update failed");
            AppError::from(e)
        })?;
    Ok(Json(UpdateNoteResponse {
        note: update.note,
        reused: update.reused,
    }))
}

async fn handle_get_document(
    State(state): State<AppState>,
    Path((user, id)): Path<(String, String)>,
) -> Result<Json<DocumentRecord>, AppError> {
    let doc = state.pipeline.document(&user, &id).await?;
    Ok(Json(doc))
}

async fn handle_list_documents(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Json<Vec<DocumentRecord>>, AppError> {
    let documents = state.pipeline.list_documents(&user).await?;
    Ok(Json(documents))
}

#[derive(Debug, Deserialize)]
struct AddDocumentRequest {
    content: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    id: Option<String>,
}

async fn handle_add_document(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Json(request): Json<AddDocumentRequest>,
) -> Result<Json<DocumentRecord>, AppError> {
    if request.content.trim().is_empty() {
        return Err(bad_request("content must not be empty"));
    }
    let id = request.id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let doc = state
        .pipeline
        .add_document(&user, &id, &request.content, request.url)
        .await
        .map_err(|e| {
            warn!(user = %user, document_id = %id, error = %e, "document analysis failed");
            AppError::from(e)
        })?;
    Ok(Json(doc))
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    query: String,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    documents: Vec<DocumentRecord>,
}

async fn handle_search(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    let documents = state.pipeline.search(&user, &request.query).await?;
    Ok(Json(SearchResponse { documents }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadline_core::models::RecordStatus;
    use threadline_core::similarity::MatchOptions;
    use threadline_core::store::memory::InMemoryStore;
    use threadline_core::store::DocumentStore;

    use crate::embedding::DisabledEmbedder;
    use crate::generation::DisabledGenerator;

    fn state() -> AppState {
        AppState {
            pipeline: Arc::new(NotePipeline::new(
                Arc::new(DisabledGenerator),
                Arc::new(DisabledEmbedder),
                Arc::new(InMemoryStore::new()),
                MatchOptions::default(),
            )),
        }
    }

    #[test]
    fn test_error_mapping() {
        use threadline_core::Error;
        assert_eq!(
            AppError::from(Error::NotFound("x".into())).status,
            StatusCode::NOT_FOUND
        );
        let upstream = AppError::from(Error::Generation("down".into()));
        assert_eq!(upstream.status, StatusCode::BAD_GATEWAY);
        assert_eq!(upstream.code, "upstream_error");
        assert_eq!(
            AppError::from(Error::Store("disk".into())).status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_missing_document_is_404() {
        let err = handle_get_document(State(state()), Path(("u".into(), "d1".into())))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.code, "not_found");
        assert!(err.message.contains("d1"));
    }

    #[tokio::test]
    async fn test_stored_document_listed_and_fetched() {
        let state = state();
        let doc = DocumentRecord {
            id: "d1".into(),
            title: "Fern care".into(),
            status: RecordStatus::Completed,
            ..Default::default()
        };
        state.pipeline.store().put_document("u", &doc).await.unwrap();

        let Json(listed) = handle_list_documents(State(state.clone()), Path("u".into()))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        let Json(fetched) = handle_get_document(State(state), Path(("u".into(), "d1".into())))
            .await
            .unwrap();
        assert_eq!(fetched.title, "Fern care");
    }

    #[tokio::test]
    async fn test_empty_document_content_is_bad_request() {
        let err = handle_add_document(
            State(state()),
            Path("u".into()),
            Json(AddDocumentRequest {
                content: "  ".into(),
                url: None,
                id: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_document_analysis_failure_is_upstream_error() {
        let state = state();
        let err = handle_add_document(
            State(state.clone()),
            Path("u".into()),
            Json(AddDocumentRequest {
                content: "An article about ferns.".into(),
                url: None,
                id: Some("d9".into()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, "upstream_error");
        let pending = state.pipeline.store().get_document("u", "d9").await.unwrap().unwrap();
        assert_eq!(pending.content, "An article about ferns.");
    }

    #[tokio::test]
    async fn test_empty_search_returns_no_documents() {
        let Json(response) = handle_search(
            State(state()),
            Path("u".into()),
            Json(SearchRequest { query: "\n".into() }),
        )
        .await
        .unwrap();
        assert!(response.documents.is_empty());
    }

    #[tokio::test]
    async fn test_get_note_creates_empty_note() {
        let Json(note) = handle_get_note(State(state()), Path(("u".into(), "n1".into())))
            .await
            .unwrap();
        assert_eq!(note.id, "n1");
        assert!(note.raw_text.is_empty());
        assert!(note.suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_empty_submission_to_new_note_needs_no_provider() {
        let Json(response) = handle_update_note(
            State(state()),
            Path(("u".into(), "n1".into())),
            Json(UpdateNoteRequest {
                text: String::new(),
            }),
        )
        .await
        .unwrap();
        assert!(response.reused);
    }

    #[tokio::test]
    async fn test_provider_failure_is_upstream_error() {
        let err = handle_update_note(
            State(state()),
            Path(("u".into(), "n1".into())),
            Json(UpdateNoteRequest {
                text: "I keep forgetting to water the plants.".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, "upstream_error");
    }
}
