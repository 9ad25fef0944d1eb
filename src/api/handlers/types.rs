//! Request/response types for the guest API.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::otp::{Channel, OtpIssued, Verified};
use crate::store::ContactRecord;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RequestOtpRequest {
    pub document: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub honeypot: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyOtpRequest {
    pub document: String,
    pub code: String,
    #[serde(default)]
    pub honeypot: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegistrationOtpRequest {
    pub full_name: String,
    #[serde(default)]
    pub document_type: Option<String>,
    pub document: String,
    pub phone_number: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub honeypot: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyRegistrationRequest {
    pub phone: String,
    pub code: String,
    #[serde(default)]
    pub honeypot: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResendRegistrationRequest {
    pub phone: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub honeypot: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CancelRegistrationRequest {
    pub phone: String,
    #[serde(default)]
    pub honeypot: Option<String>,
}

/// Public OTP settings for the frontend; tuning fields are omitted
/// entirely when verification is disabled.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct OtpSettingsResponse {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_minutes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_channel: Option<Channel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sms_available: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whatsapp_available: Option<bool>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct OtpIssuedResponse {
    pub success: bool,
    pub message: String,
    pub phone: String,
    pub channel: Channel,
    pub expiry_minutes: i64,
}

impl From<OtpIssued> for OtpIssuedResponse {
    fn from(issued: OtpIssued) -> Self {
        Self {
            success: true,
            message: "Verification code sent".to_string(),
            phone: issued.phone_masked,
            channel: issued.channel,
            expiry_minutes: issued.expiry_minutes,
        }
    }
}

/// Contact fields safe to expose to the authenticated guest. OTP and token
/// state never leave the service.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ContactResponse {
    pub id: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,
    pub document: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
}

impl From<ContactRecord> for ContactResponse {
    fn from(record: ContactRecord) -> Self {
        Self {
            id: record.id.to_string(),
            full_name: record.full_name,
            document_type: record.document_type,
            document: record.document,
            phone_number: record.phone_number,
            email: record.email,
            gender: record.gender,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifiedResponse {
    pub success: bool,
    pub auth_token: String,
    pub contact: ContactResponse,
}

impl From<Verified> for VerifiedResponse {
    fn from(verified: Verified) -> Self {
        Self {
            success: true,
            auth_token: verified.auth_token,
            contact: verified.contact.into(),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CancelResponse {
    pub success: bool,
}
