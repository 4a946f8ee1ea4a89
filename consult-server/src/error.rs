//! Request failures and how they are shown.
//!
//! Page routes render an HTML error page; `/api/*` routes answer with
//! `{"error": ..., "message": ...}`. Record problems are shown as-is because
//! the clinician can fix them in the EHR. Upstream and internal details go
//! to the log only.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use consult_core::{ErrorKind, RecordError};
use consult_upstream::UpstreamError;
use serde_json::json;
use thiserror::Error;

use crate::page;

#[derive(Error, Debug)]
pub enum ConsultError {
    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// No authorized SMART session for this browser
    #[error("{0}")]
    Unauthorized(String),

    /// Launch or redirect request that cannot be honoured
    #[error("{0}")]
    Launch(String),

    #[error("{0}")]
    Internal(String),
}

impl ConsultError {
    pub fn status(&self) -> StatusCode {
        match self {
            ConsultError::Record(e) => match e.kind() {
                ErrorKind::Prevented => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::Malformed => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ConsultError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ConsultError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ConsultError::Launch(_) => StatusCode::BAD_REQUEST,
            ConsultError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ConsultError::Record(e) => e.code(),
            ConsultError::Upstream(_) => "upstream-failure",
            ConsultError::Unauthorized(_) => "unauthorized",
            ConsultError::Launch(_) => "bad-launch",
            ConsultError::Internal(_) => "internal-error",
        }
    }

    /// Message safe to show to the user
    pub fn public_message(&self) -> String {
        match self {
            ConsultError::Record(e) if e.kind() == ErrorKind::Prevented => {
                format!("Operation prevented: {}", e)
            }
            ConsultError::Record(_) | ConsultError::Internal(_) => {
                "Something went wrong processing the patient's record.".to_string()
            }
            ConsultError::Upstream(e) => format!(
                "An external service ({}) did not respond as expected. Please try again later.",
                e.service()
            ),
            ConsultError::Unauthorized(msg) | ConsultError::Launch(msg) => msg.clone(),
        }
    }

    fn log(&self) {
        match self {
            ConsultError::Record(e) if e.kind() == ErrorKind::Prevented => {
                tracing::info!(code = self.code(), "Consultation prevented: {}", e);
            }
            ConsultError::Upstream(e) => {
                tracing::error!(service = e.service(), "Upstream failure: {}", e);
            }
            ConsultError::Unauthorized(msg) | ConsultError::Launch(msg) => {
                tracing::warn!(code = self.code(), "{}", msg);
            }
            other => tracing::error!(code = other.code(), "Consultation failed: {}", other),
        }
    }

    fn title(&self) -> &'static str {
        match self {
            ConsultError::Record(e) if e.kind() == ErrorKind::Prevented => {
                "Consultation unavailable for this patient"
            }
            ConsultError::Unauthorized(_) | ConsultError::Launch(_) => "Launch required",
            _ => "Something went wrong",
        }
    }
}

impl IntoResponse for ConsultError {
    fn into_response(self) -> Response {
        self.log();
        let relaunch = matches!(self, ConsultError::Unauthorized(_) | ConsultError::Launch(_));
        let body = page::render_error(self.title(), &self.public_message(), relaunch);
        (self.status(), Html(body)).into_response()
    }
}

/// JSON rendering of [`ConsultError`] for the `/api` routes
#[derive(Debug)]
pub struct ApiError(pub ConsultError);

impl From<ConsultError> for ApiError {
    fn from(err: ConsultError) -> Self {
        ApiError(err)
    }
}

impl From<RecordError> for ApiError {
    fn from(err: RecordError) -> Self {
        ApiError(err.into())
    }
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        ApiError(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        err.log();
        let body = json!({
            "error": err.code(),
            "message": err.public_message(),
        });
        (err.status(), Json(body)).into_response()
    }
}
