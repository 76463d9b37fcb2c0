//! HTTP boundary: `POST /rag` and `GET /healthz`.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::RagError;
use crate::service::{IndexStatus, RagService};

const MISSING_QUESTION: &str = "Missing question.";
const RETRIEVAL_FAILED: &str = "Failed to retrieve context.";

/// Body of `POST /rag`.
#[derive(Debug, Deserialize)]
pub struct RagRequest {
    /// The user's question.
    #[serde(default)]
    pub question: Option<String>,
}

/// Successful reply of `POST /rag`.
#[derive(Debug, Serialize, Deserialize)]
pub struct RagResponse {
    /// Grounded context, or the sentinel.
    pub context: String,
}

/// Error reply shared by every route.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Generic, caller-facing message.
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

/// Builds the router over a shared service.
pub fn router(service: Arc<RagService>) -> Router {
    Router::new()
        .route("/rag", post(rag_handler))
        .route("/healthz", get(healthz))
        .with_state(service)
}

async fn rag_handler(
    State(service): State<Arc<RagService>>,
    payload: Result<Json<RagRequest>, JsonRejection>,
) -> Result<Json<RagResponse>, ApiError> {
    let question = payload
        .ok()
        .and_then(|Json(request)| request.question)
        .filter(|question| !question.trim().is_empty())
        .ok_or_else(|| bad_request(MISSING_QUESTION))?;

    info!(question = %question, "rag request");
    match service.build_rag_context(&question).await {
        Ok(context) => Ok(Json(RagResponse { context })),
        Err(RagError::InvalidRequest(message)) => Err(bad_request(&message)),
        Err(err) => {
            error!(error = %err, "rag request failed");
            Err(internal_error())
        }
    }
}

async fn healthz(State(service): State<Arc<RagService>>) -> Json<IndexStatus> {
    Json(service.status())
}

fn bad_request(message: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
}

fn internal_error() -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: RETRIEVAL_FAILED.to_string(),
        }),
    )
}
