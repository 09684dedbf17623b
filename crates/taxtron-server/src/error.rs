use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::workflow::WorkflowError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PaymentRequired(String),

    #[error("Too many requests")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<WorkflowError> for ServerError {
    fn from(e: WorkflowError) -> Self {
        match e {
            WorkflowError::NotFound(m) => ServerError::NotFound(m),
            WorkflowError::Forbidden(m) => ServerError::Forbidden(m),
            WorkflowError::Validation(m) | WorkflowError::InvalidOperation(m) => {
                ServerError::BadRequest(m)
            }
            WorkflowError::Conflict(m) => ServerError::Conflict(m),
            WorkflowError::PaymentRequired(m) => ServerError::PaymentRequired(m),
            WorkflowError::Store(e) => ServerError::Internal(e.to_string()),
            e @ WorkflowError::Task(_) => ServerError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServerError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServerError::Conflict(_) => StatusCode::CONFLICT,
            ServerError::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            ServerError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            ServerError::Internal(cause) => {
                tracing::error!(error = %cause, "request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = serde_json::json!({
            "success": false,
            "message": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taxtron_store::StoreError;

    #[test]
    fn workflow_errors_map_to_status_codes() {
        let cases = [
            (WorkflowError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (WorkflowError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (WorkflowError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (WorkflowError::InvalidOperation("x".into()), StatusCode::BAD_REQUEST),
            (WorkflowError::Conflict("x".into()), StatusCode::CONFLICT),
            (WorkflowError::PaymentRequired("x".into()), StatusCode::PAYMENT_REQUIRED),
            (
                WorkflowError::Store(StoreError::Migration("boom".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                WorkflowError::Task("spawn_blocking failed: task panicked".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            let response = ServerError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }
}
