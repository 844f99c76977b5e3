use crate::auth::DenialReason;
use crate::clients::ValidationError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Errors returned by protected endpoints, rendered as `{"errors": [{code, title}]}`
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("access denied: {}", .0.code())]
    Denied(DenialReason),
    #[error("client not found")]
    ClientNotFound,
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("malformed request body: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub errors: Vec<ErrorEntry>,
}

#[derive(Debug, Serialize)]
pub struct ErrorEntry {
    pub code: String,
    pub title: String,
}

impl From<DenialReason> for ApiError {
    fn from(reason: DenialReason) -> Self {
        Self::Denied(reason)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Denied(DenialReason::InsufficientPrivileges) => StatusCode::FORBIDDEN,
            Self::Denied(_) => StatusCode::UNAUTHORIZED,
            Self::ClientNotFound => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Denied(reason) => reason.code(),
            Self::ClientNotFound => "ClientNotFound",
            Self::Validation(_) => "ValidationFailed",
            Self::BadRequest(_) => "BadRequest",
            Self::Internal(_) => "InternalError",
        }
    }

    fn title(&self) -> String {
        match self {
            Self::Denied(DenialReason::TokenMissing) => "A bearer token is required".to_string(),
            Self::Denied(DenialReason::TokenInvalid) => "The bearer token is invalid".to_string(),
            Self::Denied(DenialReason::TokenExpired) => "The bearer token has expired".to_string(),
            Self::Denied(DenialReason::InsufficientPrivileges) => {
                "The token does not grant the required scope".to_string()
            }
            // internals stay in the logs
            Self::Internal(_) => "Something went wrong".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(e) = &self {
            tracing::error!("Request failed: {:#}", e);
        }
        let body = ErrorBody {
            errors: vec![ErrorEntry {
                code: self.code().to_string(),
                title: self.title(),
            }],
        };
        (self.status(), Json(body)).into_response()
    }
}
