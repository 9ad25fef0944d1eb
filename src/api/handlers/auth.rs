//! Bearer-token guard and session endpoints for authenticated contacts.
//!
//! The guard is an explicit function the handlers call, not middleware
//! magic: it reads the token from the `Authorization: Bearer` header or the
//! legacy `X-Contact-Token` header and resolves it through the token
//! service.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::error;

use super::types::ContactResponse;
use super::AppState;
use crate::store::ContactRecord;
use crate::token::TokenService;

const CONTACT_TOKEN_HEADER: &str = "x-contact-token";

fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        let trimmed = value.trim();
        if let Some(token) = trimmed
            .strip_prefix("Bearer ")
            .or_else(|| trimmed.strip_prefix("bearer "))
        {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }
    headers
        .get(CONTACT_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Resolve the request's token into a contact, if any.
///
/// Returns `Ok(None)` for missing, unknown, or expired tokens; `Err` only
/// for store failures.
pub(crate) async fn authenticate_contact(
    headers: &HeaderMap,
    tokens: &TokenService,
) -> Result<Option<ContactRecord>, StatusCode> {
    let Some(token) = extract_token(headers) else {
        return Ok(None);
    };
    match tokens.resolve(&token).await {
        Ok(record) => Ok(record),
        Err(err) => {
            error!("failed to resolve contact token: {err:#}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/auth/me",
    responses(
        (status = 200, description = "Authenticated contact", body = ContactResponse),
        (status = 401, description = "Missing, invalid, or expired token")
    ),
    tag = "auth"
)]
pub async fn me(headers: HeaderMap, state: Extension<Arc<AppState>>) -> impl IntoResponse {
    match authenticate_contact(&headers, state.tokens()).await {
        Ok(Some(contact)) => {
            (StatusCode::OK, Json(ContactResponse::from(contact))).into_response()
        }
        Ok(None) => StatusCode::UNAUTHORIZED.into_response(),
        Err(status) => status.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Token cleared (idempotent)")
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, state: Extension<Arc<AppState>>) -> impl IntoResponse {
    // Always 204: logging out with a dead token is not an error.
    if let Ok(Some(contact)) = authenticate_contact(&headers, state.tokens()).await {
        if let Err(err) = state.tokens().revoke(contact.id).await {
            error!("failed to revoke contact token: {err:#}");
        }
    }
    StatusCode::NO_CONTENT.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extract_token_reads_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(extract_token(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn extract_token_reads_contact_header() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTACT_TOKEN_HEADER, HeaderValue::from_static("abc123"));
        assert_eq!(extract_token(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn bearer_header_wins_over_contact_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer first"));
        headers.insert(CONTACT_TOKEN_HEADER, HeaderValue::from_static("second"));
        assert_eq!(extract_token(&headers), Some("first".to_string()));
    }

    #[test]
    fn empty_or_missing_tokens_are_none() {
        assert_eq!(extract_token(&HeaderMap::new()), None);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(extract_token(&headers), None);
        let mut headers = HeaderMap::new();
        headers.insert(CONTACT_TOKEN_HEADER, HeaderValue::from_static(" "));
        assert_eq!(extract_token(&headers), None);
    }
}
