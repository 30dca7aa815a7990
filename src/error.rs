use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::json;

/// Failures surfaced by the attendance engine.
///
/// A denied check-in/out is not an error: it comes back as a `CheckDecision`
/// with `allowed: false`.
#[derive(Debug, Display)]
pub enum EngineError {
    /// No shift could be resolved for the employee.
    #[display(fmt = "configuration error: {}", _0)]
    Configuration(String),

    /// Auto-completion proposals or a manual correction failed validation.
    #[display(fmt = "validation error: {}", _0)]
    Validation(String),

    /// A holiday/leave/overtime lookup failed after all retries.
    #[display(fmt = "collaborator unavailable: {}", _0)]
    CollaboratorUnavailable(String),

    /// Another request is mutating the same employee-day; safe to retry.
    #[display(fmt = "concurrent update for employee {} on {}", employee_id, date)]
    ConcurrencyConflict {
        employee_id: u64,
        date: chrono::NaiveDate,
    },

    #[display(fmt = "{} not found", _0)]
    NotFound(String),

    #[display(fmt = "bad request: {}", _0)]
    BadRequest(String),

    #[display(fmt = "database error: {}", _0)]
    Database(String),
}

impl std::error::Error for EngineError {}

impl EngineError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::ConcurrencyConflict { .. } | EngineError::CollaboratorUnavailable(_)
        )
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(e: sqlx::Error) -> Self {
        EngineError::Database(e.to_string())
    }
}

impl ResponseError for EngineError {
    fn status_code(&self) -> StatusCode {
        match self {
            EngineError::Configuration(_) | EngineError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            EngineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::CollaboratorUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::ConcurrencyConflict { .. } => StatusCode::CONFLICT,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // internal details stay in the log
        let message = match self {
            EngineError::Configuration(_) | EngineError::Database(_) => {
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(json!({
            "message": message,
            "retryable": self.is_retryable(),
        }))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
