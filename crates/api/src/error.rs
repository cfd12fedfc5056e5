//! Maps engine-level failures onto the Control API's HTTP status vocabulary
//! (§6: "400 on validation; 404 if flowVersion missing; 409 if flowVersion
//! not published").

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use flowright_engine::EngineError;
use flowright_execution::StoreError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("flow version `{0}` not found")]
    FlowVersionNotFound(flowright_core::FlowVersionId),

    #[error("flow version `{0}` is not published")]
    NotPublished(flowright_core::FlowVersionId),

    #[error(transparent)]
    Validation(#[from] flowright_workflow::ValidationError),

    #[error("execution `{0}` not found")]
    ExecutionNotFound(flowright_core::ExecutionId),

    #[error("no waiting node matches resume token `{0}`")]
    UnknownResumeToken(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::FlowVersionNotFound(_) | Self::ExecutionNotFound(_) => StatusCode::NOT_FOUND,
            Self::NotPublished(_) => StatusCode::CONFLICT,
            Self::Validation(_) | Self::UnknownResumeToken(_) => StatusCode::BAD_REQUEST,
            Self::Engine(EngineError::FlowVersionNotFound(_)) => StatusCode::NOT_FOUND,
            Self::Engine(EngineError::NotPublished(_)) => StatusCode::CONFLICT,
            Self::Engine(EngineError::Validation(_)) => StatusCode::BAD_REQUEST,
            Self::Engine(_) | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
