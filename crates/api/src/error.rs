//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{AdoptionError, DomainError};
use event_store::EventStoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match &err {
        DomainError::Adoption(adoption_err) => match adoption_err {
            AdoptionError::ReasonRequired
            | AdoptionError::ChurnReasonRequired
            | AdoptionError::InvalidMrr { .. }
            | AdoptionError::InvalidCloseConfidence { .. } => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            AdoptionError::AdoptionNotFound
            | AdoptionError::ProcessNotFound { .. }
            | AdoptionError::StageNotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
            AdoptionError::InvalidPhaseTransition { .. }
            | AdoptionError::TerminalPhase { .. }
            | AdoptionError::WrongProcessKind { .. }
            | AdoptionError::NoActiveProcess
            | AdoptionError::NotInProcess { .. }
            | AdoptionError::NoProcessOfKind { .. }
            | AdoptionError::NoInitialStage { .. }
            | AdoptionError::NoTerminalStage { .. } => (StatusCode::CONFLICT, err.to_string()),
        },
        DomainError::AggregateNotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        DomainError::EventStore(EventStoreError::ConcurrencyConflict { .. }) => {
            (StatusCode::CONFLICT, err.to_string())
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<projections::ProjectionError> for ApiError {
    fn from(err: projections::ProjectionError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
