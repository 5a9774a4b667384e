use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::accounts::otp::OtpError;

/// Raised by the stores when a unique constraint rejects a write.
#[derive(Debug, Error)]
#[error("{0} already in use")]
pub struct UniqueViolation(pub &'static str);

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Validation {
        field: Option<&'static str>,
        message: String,
    },

    #[error("authentication required")]
    Unauthenticated { next: String },

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Invalid user.")]
    InvalidUser,

    #[error(transparent)]
    Otp(#[from] OtpError),

    #[error("{0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(anyhow::Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub field: Option<&'static str>,
}

impl AppError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: Some(field),
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::InvalidUser | AppError::Otp(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthenticated { .. } => StatusCode::SEE_OTHER,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<UniqueViolation>() {
            Ok(dup) => AppError::Conflict(dup.to_string()),
            Err(err) => AppError::Internal(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::Unauthenticated { next } => {
                return Redirect::to(&format!("/login?next={}", urlencoding::encode(&next))).into_response();
            }
            AppError::Internal(ref e) => {
                tracing::error!(error = %e, "internal error");
                ErrorBody {
                    error: "An internal error occurred".into(),
                    field: None,
                }
            }
            AppError::Validation { field, ref message } => ErrorBody {
                error: message.clone(),
                field,
            },
            AppError::Otp(ref e) => ErrorBody {
                error: e.to_string(),
                field: Some("otp"),
            },
            ref other => ErrorBody {
                error: other.to_string(),
                field: None,
            },
        };
        (status, Json(body)).into_response()
    }
}
