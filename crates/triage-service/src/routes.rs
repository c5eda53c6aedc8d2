//! HTTP routes and handlers

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info_span, warn, Instrument};
use triage_core::{ComplaintData, Error, Priority};
use triage_policy::Decision;

use crate::config::OutputShape;
use crate::pipeline::{self, Source};
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/classify", post(classify))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn metrics(State(state): State<AppState>) -> String {
    state
        .metrics_handle
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}

/// `{category, confidence}`
#[derive(Debug, Serialize)]
struct CategoryResponse {
    category: String,
    confidence: f32,
}

/// `{department, priority, confidence}`
#[derive(Debug, Serialize)]
struct DepartmentResponse {
    department: String,
    priority: Priority,
    confidence: f32,
}

/// `{prediction: <raw inference output>}`
#[derive(Debug, Serialize)]
struct RawResponse {
    prediction: Value,
}

async fn classify(
    State(state): State<AppState>,
    Json(req): Json<ComplaintData>,
) -> Result<Response, AppError> {
    let request_id = uuid::Uuid::new_v4();
    let span = info_span!("classify", %request_id);

    let shape = state.config.output;
    if shape == OutputShape::Raw {
        let prediction = pipeline::raw(state.classifier.as_ref(), &req.text, Source::Http)
            .instrument(span)
            .await?;
        return Ok(Json(RawResponse { prediction }).into_response());
    }

    let decision = pipeline::triage(
        state.classifier.as_ref(),
        &state.policy,
        &req.text,
        Source::Http,
    )
    .instrument(span)
    .await?;

    Ok(render(shape, decision))
}

/// Shape a triage decision for the configured output
fn render(shape: OutputShape, decision: Decision) -> Response {
    match shape {
        OutputShape::Department => Json(DepartmentResponse {
            department: decision.label,
            priority: decision.priority,
            confidence: decision.confidence,
        })
        .into_response(),
        OutputShape::Category | OutputShape::Raw => Json(CategoryResponse {
            category: decision.label,
            confidence: decision.confidence,
        })
        .into_response(),
    }
}

/// Error handling
#[derive(Debug)]
pub struct AppError(Error);

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = match self.0 {
            Error::Upstream { status, body } => {
                let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                warn!(%status, "Inference upstream failed");
                (status, body)
            }
            Error::ModelUnavailable(message) => {
                warn!(%message, "Inference model unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, message)
            }
            err @ Error::UnexpectedResponse(_) => {
                error!(error = %err, "Inference response could not be normalized");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            err => {
                error!(error = %err, "Classification failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
