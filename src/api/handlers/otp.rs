//! Endpoints for the existing-contact OTP flow.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;

use super::types::{
    OtpIssuedResponse, OtpSettingsResponse, RequestOtpRequest, VerifiedResponse, VerifyOtpRequest,
};
use super::{AppState, check_honeypot, enforce_ip_limit};
use crate::otp::{Channel, OtpError};
use crate::otp::validate::{sanitize_string, validate_document};
use crate::rate_limit::RateLimitAction;

const MAX_CODE_LENGTH: usize = 32;

/// Public OTP settings for the frontend; no secrets, and nothing but the
/// enabled flag when verification is off.
#[utoipa::path(
    get,
    path = "/v1/otp/settings",
    responses(
        (status = 200, description = "Public OTP settings", body = OtpSettingsResponse),
        (status = 429, description = "Rate limited")
    ),
    tag = "otp"
)]
pub async fn get_otp_settings(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> impl IntoResponse {
    if let Err(err) = enforce_ip_limit(&state, &headers, RateLimitAction::OtpSettings).await {
        return err.into_response();
    }

    let config = state.engine().config();
    let response = if config.enabled() {
        OtpSettingsResponse {
            enabled: true,
            otp_length: Some(config.otp_length()),
            expiry_minutes: Some(config.expiry_minutes()),
            default_channel: Some(config.default_channel()),
            sms_available: Some(config.sms_available()),
            whatsapp_available: Some(config.whatsapp_available()),
        }
    } else {
        OtpSettingsResponse {
            enabled: false,
            otp_length: None,
            expiry_minutes: None,
            default_channel: None,
            sms_available: None,
            whatsapp_available: None,
        }
    };
    (StatusCode::OK, Json(response)).into_response()
}

#[utoipa::path(
    post,
    path = "/v1/otp/request",
    request_body = RequestOtpRequest,
    responses(
        (status = 200, description = "Code sent to the contact's phone", body = OtpIssuedResponse),
        (status = 404, description = "Unknown document or no phone on file"),
        (status = 423, description = "Contact is temporarily locked"),
        (status = 429, description = "Rate limited"),
        (status = 503, description = "Delivery provider failure")
    ),
    tag = "otp"
)]
pub async fn request_otp(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    payload: Option<Json<RequestOtpRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return OtpError::Validation("Missing payload".to_string()).into_response();
    };
    if let Err(err) = check_honeypot(request.honeypot.as_deref(), &headers) {
        return err.into_response();
    }
    if let Err(err) = enforce_ip_limit(&state, &headers, RateLimitAction::RequestOtp).await {
        return err.into_response();
    }

    let document = match validate_document(&request.document) {
        Ok(document) => document,
        Err(err) => return err.into_response(),
    };
    let channel = request
        .channel
        .as_deref()
        .map_or_else(|| state.engine().config().default_channel(), Channel::from_param);

    match state.engine().request_otp(&document, channel).await {
        Ok(issued) => (StatusCode::OK, Json(OtpIssuedResponse::from(issued))).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/otp/verify",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Code accepted, bearer token issued", body = VerifiedResponse),
        (status = 400, description = "Invalid code or no active challenge"),
        (status = 404, description = "Unknown document"),
        (status = 410, description = "Challenge expired"),
        (status = 423, description = "Contact is temporarily locked"),
        (status = 429, description = "Rate limited")
    ),
    tag = "otp"
)]
pub async fn verify_otp(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    payload: Option<Json<VerifyOtpRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return OtpError::Validation("Missing payload".to_string()).into_response();
    };
    if let Err(err) = check_honeypot(request.honeypot.as_deref(), &headers) {
        return err.into_response();
    }
    if let Err(err) = enforce_ip_limit(&state, &headers, RateLimitAction::VerifyOtp).await {
        return err.into_response();
    }

    let document = match validate_document(&request.document) {
        Ok(document) => document,
        Err(err) => return err.into_response(),
    };
    let Some(code) = sanitize_string(&request.code, MAX_CODE_LENGTH) else {
        return OtpError::Validation("Verification code is required".to_string()).into_response();
    };

    match state.engine().verify_otp(&document, &code).await {
        Ok(verified) => (StatusCode::OK, Json(VerifiedResponse::from(verified))).into_response(),
        Err(err) => err.into_response(),
    }
}
