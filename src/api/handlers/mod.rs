//! API handlers and shared request utilities.
//!
//! Every guest endpoint runs the same gauntlet before touching the engine:
//! honeypot check, per-IP rate limit, then input sanitization. Failures are
//! returned as the machine-readable error taxonomy in [`crate::otp::error`].

pub mod auth;
pub mod health;
pub mod otp;
pub mod registration;
pub mod root;
pub mod types;

use axum::http::HeaderMap;
use std::sync::Arc;
use tracing::warn;

use crate::otp::{OtpEngine, OtpError};
use crate::rate_limit::{RateLimitAction, RateLimitDecision, RateLimiter};
use crate::token::TokenService;

/// Shared handler state: the engine plus the per-IP request limiter.
pub struct AppState {
    engine: OtpEngine,
    limiter: Arc<dyn RateLimiter>,
    tokens: TokenService,
}

impl AppState {
    #[must_use]
    pub fn new(engine: OtpEngine, limiter: Arc<dyn RateLimiter>) -> Self {
        let tokens = engine.tokens().clone();
        Self {
            engine,
            limiter,
            tokens,
        }
    }

    #[must_use]
    pub fn engine(&self) -> &OtpEngine {
        &self.engine
    }

    pub(crate) fn tokens(&self) -> &TokenService {
        &self.tokens
    }
}

/// Extract a client IP for rate limiting from common proxy headers.
pub(crate) fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Honeypot gate: bots fill hidden fields, humans never see them. A filled
/// field gets a generic validation error so detection stays invisible.
pub(crate) fn check_honeypot(
    honeypot: Option<&str>,
    headers: &HeaderMap,
) -> Result<(), OtpError> {
    match honeypot {
        Some(value) if !value.trim().is_empty() => {
            let ip = extract_client_ip(headers).unwrap_or_else(|| "unknown".to_string());
            warn!(ip = %ip, "honeypot field filled, rejecting request");
            Err(OtpError::Validation("Invalid request".to_string()))
        }
        _ => Ok(()),
    }
}

/// Per-IP fixed-window limit for an endpoint action.
pub(crate) async fn enforce_ip_limit(
    state: &AppState,
    headers: &HeaderMap,
    action: RateLimitAction,
) -> Result<(), OtpError> {
    let ip = extract_client_ip(headers).unwrap_or_else(|| "unknown".to_string());
    match state.limiter.check_and_increment(action, &ip).await {
        RateLimitDecision::Allowed => Ok(()),
        RateLimitDecision::Limited {
            retry_after_seconds,
        } => Err(OtpError::RateLimited {
            retry_after_minutes: (i64::try_from(retry_after_seconds).unwrap_or(60) / 60).max(1),
        }),
    }
}
