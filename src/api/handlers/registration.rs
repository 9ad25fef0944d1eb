//! Endpoints for the registration-with-staged-data OTP flow.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;

use super::types::{
    CancelRegistrationRequest, CancelResponse, OtpIssuedResponse, RegistrationOtpRequest,
    ResendRegistrationRequest, VerifiedResponse, VerifyRegistrationRequest,
};
use super::{AppState, check_honeypot, enforce_ip_limit};
use crate::otp::validate::sanitize_string;
use crate::otp::{Channel, OtpError, RegistrationForm};
use crate::rate_limit::RateLimitAction;

const MAX_CODE_LENGTH: usize = 32;

#[utoipa::path(
    post,
    path = "/v1/registration/request-otp",
    request_body = RegistrationOtpRequest,
    responses(
        (status = 200, description = "Form staged and code sent", body = OtpIssuedResponse),
        (status = 400, description = "Invalid form data"),
        (status = 409, description = "Document already registered"),
        (status = 423, description = "Phone is temporarily locked"),
        (status = 429, description = "Rate limited"),
        (status = 503, description = "Delivery provider failure")
    ),
    tag = "registration"
)]
pub async fn request_registration_otp(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    payload: Option<Json<RegistrationOtpRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return OtpError::Validation("Missing payload".to_string()).into_response();
    };
    if let Err(err) = check_honeypot(request.honeypot.as_deref(), &headers) {
        return err.into_response();
    }
    if let Err(err) = enforce_ip_limit(&state, &headers, RateLimitAction::RegisterOtp).await {
        return err.into_response();
    }

    let channel = request
        .channel
        .as_deref()
        .map_or_else(|| state.engine().config().default_channel(), Channel::from_param);
    // Field-level validation happens inside the engine so the staged form
    // is always normalized, wherever it came from.
    let form = RegistrationForm {
        full_name: request.full_name,
        document_type: request.document_type,
        document: request.document,
        phone_number: request.phone_number,
        email: request.email,
        gender: request.gender,
    };

    match state.engine().request_registration_otp(form, channel).await {
        Ok(issued) => (StatusCode::OK, Json(OtpIssuedResponse::from(issued))).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/registration/verify-otp",
    request_body = VerifyRegistrationRequest,
    responses(
        (status = 200, description = "Contact created, bearer token issued", body = VerifiedResponse),
        (status = 400, description = "Invalid code or no staged registration"),
        (status = 409, description = "Document registered concurrently"),
        (status = 410, description = "Challenge expired"),
        (status = 423, description = "Phone is temporarily locked"),
        (status = 429, description = "Rate limited")
    ),
    tag = "registration"
)]
pub async fn verify_registration_otp(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    payload: Option<Json<VerifyRegistrationRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return OtpError::Validation("Missing payload".to_string()).into_response();
    };
    if let Err(err) = check_honeypot(request.honeypot.as_deref(), &headers) {
        return err.into_response();
    }
    if let Err(err) = enforce_ip_limit(&state, &headers, RateLimitAction::VerifyRegistration).await
    {
        return err.into_response();
    }

    let Some(code) = sanitize_string(&request.code, MAX_CODE_LENGTH) else {
        return OtpError::Validation("Verification code is required".to_string()).into_response();
    };

    match state
        .engine()
        .verify_registration_otp(&request.phone, &code)
        .await
    {
        Ok(verified) => (StatusCode::OK, Json(VerifiedResponse::from(verified))).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/registration/resend-otp",
    request_body = ResendRegistrationRequest,
    responses(
        (status = 200, description = "Fresh code sent, previous one invalidated", body = OtpIssuedResponse),
        (status = 400, description = "No staged registration for the phone"),
        (status = 423, description = "Phone is temporarily locked"),
        (status = 429, description = "Rate limited"),
        (status = 503, description = "Delivery provider failure")
    ),
    tag = "registration"
)]
pub async fn resend_registration_otp(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    payload: Option<Json<ResendRegistrationRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return OtpError::Validation("Missing payload".to_string()).into_response();
    };
    if let Err(err) = check_honeypot(request.honeypot.as_deref(), &headers) {
        return err.into_response();
    }
    if let Err(err) = enforce_ip_limit(&state, &headers, RateLimitAction::ResendRegistration).await
    {
        return err.into_response();
    }

    let channel = request.channel.as_deref().map(Channel::from_param);
    match state
        .engine()
        .resend_registration_otp(&request.phone, channel)
        .await
    {
        Ok(issued) => (StatusCode::OK, Json(OtpIssuedResponse::from(issued))).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Cancelling is unconditional: no identity exists yet to own the staged
/// entry, so knowing the phone number is the only requirement.
#[utoipa::path(
    post,
    path = "/v1/registration/cancel",
    request_body = CancelRegistrationRequest,
    responses(
        (status = 200, description = "Staged registration dropped (idempotent)", body = CancelResponse),
        (status = 429, description = "Rate limited")
    ),
    tag = "registration"
)]
pub async fn cancel_registration(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    payload: Option<Json<CancelRegistrationRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return OtpError::Validation("Missing payload".to_string()).into_response();
    };
    if let Err(err) = check_honeypot(request.honeypot.as_deref(), &headers) {
        return err.into_response();
    }
    if let Err(err) = enforce_ip_limit(&state, &headers, RateLimitAction::CancelRegistration).await
    {
        return err.into_response();
    }

    match state.engine().cancel_registration(&request.phone).await {
        Ok(()) => (StatusCode::OK, Json(CancelResponse { success: true })).into_response(),
        Err(err) => err.into_response(),
    }
}
