use crate::models::Step;
use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;

pub const QUOTA_MESSAGE: &str = "API quota exceeded. Please try again later.";
pub const SAFETY_MESSAGE: &str =
    "Image could not be processed due to safety guidelines. Please try a different image.";
pub const GENERIC_FAILURE_MESSAGE: &str =
    "Failed to generate design brief. Please try again with a different image.";
pub const MISSING_KEY_MESSAGE: &str =
    "API key is not configured. Please add your Gemini API key to continue.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceFailure {
    Quota,
    Safety,
    MalformedResponse,
    Transport,
    Timeout,
    Other,
}

/// Failure of a single brief generation attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BriefError {
    #[error("{0}")]
    Validation(String),
    /// No credential for the live service. The only kind that triggers the mock fallback.
    #[error("{0}")]
    Configuration(String),
    #[error("{message}")]
    Service { kind: ServiceFailure, message: String },
}

impl BriefError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn missing_credential() -> Self {
        Self::Configuration(MISSING_KEY_MESSAGE.to_string())
    }

    pub fn service(kind: ServiceFailure, message: impl Into<String>) -> Self {
        Self::Service { kind, message: message.into() }
    }

    pub fn quota() -> Self {
        Self::service(ServiceFailure::Quota, QUOTA_MESSAGE)
    }

    pub fn safety() -> Self {
        Self::service(ServiceFailure::Safety, SAFETY_MESSAGE)
    }

    pub fn malformed(detail: impl std::fmt::Display) -> Self {
        tracing::debug!("malformed brief response: {}", detail);
        Self::service(ServiceFailure::MalformedResponse, GENERIC_FAILURE_MESSAGE)
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WizardError {
    #[error(transparent)]
    Brief(#[from] BriefError),
    #[error("cannot {action} from the {step} step")]
    InvalidTransition { action: &'static str, step: Step },
    #[error("a design brief is already being generated")]
    GenerationInProgress,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("submission transport failed: {0}")]
    Transport(String),
    #[error("submission rejected: status={status} body={body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Errors surfaced by the HTTP layer.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request session not found")]
    SessionNotFound,
    #[error("invalid request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Wizard(#[from] WizardError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<BriefError> for ApiError {
    fn from(e: BriefError) -> Self {
        ApiError::Wizard(WizardError::Brief(e))
    }
}

impl ApiError {
    fn status_and_label(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::SessionNotFound => (StatusCode::NOT_FOUND, "Not found"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "Bad request"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error"),
            ApiError::Wizard(WizardError::InvalidTransition { .. })
            | ApiError::Wizard(WizardError::GenerationInProgress) => (StatusCode::CONFLICT, "Invalid step"),
            ApiError::Wizard(WizardError::Brief(brief)) => match brief {
                BriefError::Validation(_) => (StatusCode::BAD_REQUEST, "Validation error"),
                BriefError::Configuration(_) => (StatusCode::SERVICE_UNAVAILABLE, "Configuration error"),
                BriefError::Service { kind, .. } => match kind {
                    ServiceFailure::Quota => (StatusCode::TOO_MANY_REQUESTS, "AI service error"),
                    ServiceFailure::Timeout => (StatusCode::GATEWAY_TIMEOUT, "AI service error"),
                    _ => (StatusCode::BAD_GATEWAY, "AI service error"),
                },
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, label) = self.status_and_label();
        (status, Json(json!({ "error": label, "message": self.to_string() }))).into_response()
    }
}
