//! User-facing error taxonomy for the OTP and registration flows.
//!
//! Each variant carries a stable machine-readable `kind` for clients plus a
//! message safe to show to end users. Store and provider failures collapse
//! into generic responses; their details only reach the logs.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum OtpError {
    #[error("{0}")]
    Validation(String),

    #[error("User not found")]
    NotFound,

    #[error("Too many requests. Please try again in {retry_after_minutes} minutes.")]
    RateLimited { retry_after_minutes: i64 },

    #[error("Account is temporarily locked. Please try again in {remaining_minutes} minutes.")]
    Locked { remaining_minutes: i64 },

    #[error("Too many failed attempts. Account locked for {lockout_minutes} minutes.")]
    LockedOut { lockout_minutes: i64 },

    #[error("No verification code was requested. Please request a new code.")]
    NoChallenge,

    #[error("Verification code has expired. Please request a new one.")]
    Expired,

    #[error("Invalid verification code. {attempts_remaining} attempts remaining.")]
    InvalidCode { attempts_remaining: u32 },

    #[error("A contact with this document number is already registered.")]
    Conflict,

    #[error("Failed to send the verification code. Please try again later.")]
    Transport,

    #[error("OTP verification is not enabled")]
    Disabled,

    #[error("Internal error")]
    Storage(#[from] anyhow::Error),
}

impl OtpError {
    /// Stable identifier clients can branch on.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound => "not_found",
            Self::RateLimited { .. } => "rate_limited",
            Self::Locked { .. } => "locked",
            Self::LockedOut { .. } => "locked_out",
            Self::NoChallenge => "no_challenge",
            Self::Expired => "expired",
            Self::InvalidCode { .. } => "invalid_code",
            Self::Conflict => "conflict",
            Self::Transport => "transport_error",
            Self::Disabled => "disabled",
            Self::Storage(_) => "internal",
        }
    }

    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::NoChallenge | Self::InvalidCode { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Locked { .. } | Self::LockedOut { .. } => StatusCode::LOCKED,
            Self::Expired => StatusCode::GONE,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Transport => StatusCode::SERVICE_UNAVAILABLE,
            Self::Disabled => StatusCode::FORBIDDEN,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for OtpError {
    fn into_response(self) -> Response {
        if let Self::Storage(err) = &self {
            // Internal detail stays in the logs; the client sees a generic body.
            error!("storage failure in OTP flow: {err:#}");
        }

        let mut body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        match &self {
            Self::RateLimited {
                retry_after_minutes,
            } => {
                body["retry_after_minutes"] = json!(retry_after_minutes);
            }
            Self::Locked { remaining_minutes } => {
                body["remaining_minutes"] = json!(remaining_minutes);
            }
            Self::LockedOut { lockout_minutes } => {
                body["lockout_minutes"] = json!(lockout_minutes);
            }
            Self::InvalidCode { attempts_remaining } => {
                body["attempts_remaining"] = json!(attempts_remaining);
            }
            _ => {}
        }

        (self.status_code(), Json(body)).into_response()
    }
}
