//! Read-only HTTP surface over the recording store

use crate::infrastructure::{
    AlertWithPromptAndOutputRow, Database, DbReader, PromptWithOutputRow,
};
use crate::Error;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

#[derive(Clone)]
pub struct DashboardState {
    database: Arc<Database>,
    reader: DbReader,
}

impl DashboardState {
    pub fn new(database: Arc<Database>, reader: DbReader) -> Self {
        Self { database, reader }
    }
}

/// JSON error body for failed dashboard requests
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(error = %self.0, "Dashboard query failed");
        let body = ErrorBody {
            code: "STORAGE_ERROR",
            message: self.0.to_string(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

async fn health(State(state): State<DashboardState>) -> Response {
    match state.database.health_check().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response(),
        Err(e) => {
            error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
                .into_response()
        }
    }
}

async fn list_prompts(
    State(state): State<DashboardState>,
) -> Result<Json<Vec<PromptWithOutputRow>>, ApiError> {
    Ok(Json(state.reader.get_prompts_with_output().await?))
}

async fn list_alerts(
    State(state): State<DashboardState>,
) -> Result<Json<Vec<AlertWithPromptAndOutputRow>>, ApiError> {
    Ok(Json(state.reader.get_alerts_with_prompt_and_output().await?))
}

pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/prompts", get(list_prompts))
        .route("/api/v1/alerts", get(list_alerts))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
