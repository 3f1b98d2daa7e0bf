use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Conflict",
    "code": "already_assigned",
    "message": "Already assigned: note STT-JKT-20240101-0A1B2C3D is loaded in another open batch",
    "request_id": "req-abc123xyz",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Conflict", "Not Found")
    pub error: String,
    /// Machine-readable failure reason
    pub code: String,
    /// Human-readable error description
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// ISO 8601 timestamp when error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The note's current status does not satisfy the operation's precondition.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// The note is already `TERKIRIM` or `RETURN`.
    #[error("Already terminal: {0}")]
    AlreadyTerminal(String),

    /// The note's (origin, destination) does not match the batch.
    #[error("Route mismatch: {0}")]
    RouteMismatch(String),

    /// The note cannot join a delivery run in its current status or location.
    #[error("Not eligible: {0}")]
    NotEligible(String),

    /// The note is already a member of another open batch or run.
    #[error("Already assigned: {0}")]
    AlreadyAssigned(String),

    #[error("No vehicle available: {0}")]
    NoVehicleAvailable(String),

    /// A batch, run or queue lifecycle operation was called out of order.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for String {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self)
    }
}

impl IntoDbErr for &str {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self.to_string())
    }
}

impl ServiceError {
    /// Generic constructor that normalizes any supported database error input.
    pub fn db_error<E: IntoDbErr>(error: E) -> Self {
        ServiceError::DatabaseError(error.into_db_err())
    }

    /// Stable, machine-distinguishable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "database_error",
            Self::NotFound(_) => "not_found",
            Self::ValidationError(_) => "validation_error",
            Self::InvalidInput(_) => "invalid_input",
            Self::Conflict(_) => "conflict",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::AlreadyTerminal(_) => "already_terminal",
            Self::RouteMismatch(_) => "route_mismatch",
            Self::NotEligible(_) => "not_eligible",
            Self::AlreadyAssigned(_) => "already_assigned",
            Self::NoVehicleAvailable(_) => "no_vehicle_available",
            Self::InvalidState(_) => "invalid_state",
            Self::InternalError(_) | Self::Other(_) => "internal_error",
        }
    }

    /// True for the workflow rejections a caller can act on (as opposed to
    /// infrastructure failures).
    pub fn is_workflow_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidTransition(_)
                | Self::AlreadyTerminal(_)
                | Self::RouteMismatch(_)
                | Self::NotEligible(_)
                | Self::AlreadyAssigned(_)
                | Self::NoVehicleAvailable(_)
                | Self::InvalidState(_)
        )
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_)
            | Self::InvalidTransition(_)
            | Self::AlreadyTerminal(_)
            | Self::AlreadyAssigned(_)
            | Self::NoVehicleAvailable(_)
            | Self::InvalidState(_) => StatusCode::CONFLICT,
            Self::RouteMismatch(_) | Self::NotEligible(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::DatabaseError(_) | Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) | Self::Other(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            code: self.code().to_string(),
            message: self.response_message(),
            details: None,
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}
