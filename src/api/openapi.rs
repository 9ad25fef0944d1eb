//! `OpenAPI` document assembled from the handler annotations.

use utoipa::OpenApi;

use super::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "entrada",
        description = "Guest contact registration and OTP verification for service portals"
    ),
    paths(
        handlers::health::health,
        handlers::otp::get_otp_settings,
        handlers::otp::request_otp,
        handlers::otp::verify_otp,
        handlers::registration::request_registration_otp,
        handlers::registration::verify_registration_otp,
        handlers::registration::resend_registration_otp,
        handlers::registration::cancel_registration,
        handlers::auth::me,
        handlers::auth::logout,
    ),
    components(schemas(
        handlers::health::Health,
        handlers::types::OtpSettingsResponse,
        handlers::types::RequestOtpRequest,
        handlers::types::VerifyOtpRequest,
        handlers::types::RegistrationOtpRequest,
        handlers::types::VerifyRegistrationRequest,
        handlers::types::ResendRegistrationRequest,
        handlers::types::CancelRegistrationRequest,
        handlers::types::OtpIssuedResponse,
        handlers::types::VerifiedResponse,
        handlers::types::ContactResponse,
        handlers::types::CancelResponse,
    )),
    tags(
        (name = "otp", description = "Existing-contact OTP flow"),
        (name = "registration", description = "Registration OTP flow with staged form data"),
        (name = "auth", description = "Bearer-token session endpoints"),
        (name = "health", description = "Service health")
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_all_guest_paths() {
        let doc = openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();
        for expected in [
            "/health",
            "/v1/otp/settings",
            "/v1/otp/request",
            "/v1/otp/verify",
            "/v1/registration/request-otp",
            "/v1/registration/verify-otp",
            "/v1/registration/resend-otp",
            "/v1/registration/cancel",
            "/v1/auth/me",
            "/v1/auth/logout",
        ] {
            assert!(paths.contains(&expected), "missing path {expected}");
        }
    }
}
