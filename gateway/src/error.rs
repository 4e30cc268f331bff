//! API error body: `{code, message, details?}`

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use collection_planner::PlannerError;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error, Serialize)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code: status.as_u16(),
            message: message.into(),
            details: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

fn status_for(err: &PlannerError) -> StatusCode {
    match err {
        PlannerError::Geometry(_) | PlannerError::Validation(_) => StatusCode::BAD_REQUEST,
        PlannerError::CapabilityNotFound(_) | PlannerError::PlanNotFound(_) => StatusCode::NOT_FOUND,
        PlannerError::InvalidTransition { .. } | PlannerError::Cancelled => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<PlannerError> for ApiError {
    fn from(err: PlannerError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            tracing::error!("Request failed: {}", err);
        }

        let mut details = err.details().unwrap_or_else(|| json!({}));
        if let Some(obj) = details.as_object_mut() {
            obj.insert("error".to_string(), json!(err.code()));
        }

        Self {
            code: status.as_u16(),
            message: err.to_string(),
            details: Some(details),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}
