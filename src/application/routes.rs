//! HTTP routes over the text storage and request log DAOs

use crate::application::maintenance::{run_cleanup, CleanupReport};
use crate::config::MaintenanceSettings;
use crate::domain::{RequestLog, TextEntry};
use crate::infrastructure::{DatabaseManager, RequestLogDao, TextStorageDao};
use crate::Error;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<dyn DatabaseManager>,
    pub texts: TextStorageDao,
    pub logs: RequestLogDao,
    pub maintenance: MaintenanceSettings,
}

impl AppState {
    pub fn new(manager: Arc<dyn DatabaseManager>, maintenance: MaintenanceSettings) -> Self {
        Self {
            texts: TextStorageDao::new(Arc::clone(&manager)),
            logs: RequestLogDao::new(Arc::clone(&manager)),
            manager,
            maintenance,
        }
    }
}

/// Public routes, plus the unauthenticated admin routes when `admin_routes` is set
pub fn router(state: AppState, admin_routes: bool) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route("/texts", post(store_text))
        .route("/texts/saved", get(saved_texts))
        .route("/texts/{id}", get(get_text).delete(delete_text))
        .route("/texts/{id}/save", put(update_save_flag));

    let router = if admin_routes {
        router
            .route("/request-logs", get(request_logs))
            .route("/maintenance/cleanup", post(cleanup))
    } else {
        router
    };

    router.with_state(state)
}

/// JSON error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Handler error carrying the crate error to the response boundary
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self.0.root() {
            Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Transient { .. } | Error::Construction(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self.0.root() {
            Error::Validation { .. } => "INVALID_REQUEST",
            Error::NotFound { .. } => "NOT_FOUND",
            Error::Transient { .. } | Error::Construction(_) => "DATABASE_UNAVAILABLE",
            _ => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            error!(error = %self.0, "Request failed");
            "The database is unavailable or returned an error".to_string()
        } else {
            self.0.root().to_string()
        };

        (status, Json(ErrorResponse::new(self.code(), message))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

async fn health(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    state.manager.ping().await?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct StoreTextRequest {
    pub content: String,
    #[serde(default)]
    pub save: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreTextResponse {
    pub id: String,
}

async fn store_text(
    State(state): State<AppState>,
    Json(request): Json<StoreTextRequest>,
) -> ApiResult<(StatusCode, Json<StoreTextResponse>)> {
    let id = state.texts.store_text(&request.content, request.save).await?;
    Ok((
        StatusCode::CREATED,
        Json(StoreTextResponse { id: id.to_string() }),
    ))
}

async fn get_text(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TextEntry>> {
    Ok(Json(state.texts.get_text_by_id(&id).await?))
}

async fn saved_texts(State(state): State<AppState>) -> ApiResult<Json<Vec<TextEntry>>> {
    Ok(Json(state.texts.get_all_saved_entries().await?))
}

#[derive(Debug, Deserialize)]
pub struct SaveFlagRequest {
    pub save: bool,
}

async fn update_save_flag(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SaveFlagRequest>,
) -> ApiResult<StatusCode> {
    state.texts.update_text_save_flag(&id, request.save).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_text(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.texts.delete_text_by_id(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_page_limit() -> u32 {
    50
}

#[derive(Debug, Serialize)]
pub struct RequestLogPage {
    pub total: u64,
    pub logs: Vec<RequestLog>,
}

async fn request_logs(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<RequestLogPage>> {
    let logs = state.logs.get_request_logs(page.limit, page.offset).await?;
    let total = state.logs.count_request_logs().await?;
    Ok(Json(RequestLogPage { total, logs }))
}

async fn cleanup(State(state): State<AppState>) -> Json<CleanupReport> {
    Json(run_cleanup(&state.texts, &state.logs, &state.maintenance).await)
}
