//! Delivery boundary for verification codes.
//!
//! The engine only knows `send(phone_e164, code, channel)`. The default
//! sender for local development is [`LogOtpSender`], which logs and returns
//! `Ok(())`; production wires a [`TwilioSender`] that posts to the Twilio
//! Messages API over HTTPS.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::ToSchema;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";
const DEFAULT_MESSAGE_TEMPLATE: &str = "Tu código de verificación es: {otp}";

/// Delivery channel. Unrecognized client input falls back to SMS.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Sms,
    Whatsapp,
}

impl Channel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sms => "sms",
            Self::Whatsapp => "whatsapp",
        }
    }

    /// Parse a client-supplied channel name; anything unknown means SMS.
    #[must_use]
    pub fn from_param(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "whatsapp" => Self::Whatsapp,
            _ => Self::Sms,
        }
    }
}

#[derive(Clone, Debug)]
pub struct OtpMessage {
    pub phone_e164: String,
    pub code: String,
    pub channel: Channel,
    pub expiry_minutes: i64,
}

/// Code delivery abstraction used by the OTP engine.
#[async_trait]
pub trait OtpSender: Send + Sync {
    /// Deliver a code or return an error; the engine maps any error to a
    /// generic transport failure and skips persisting the challenge.
    async fn send(&self, message: &OtpMessage) -> Result<()>;
}

/// Local dev sender that logs the payload instead of sending a real message.
#[derive(Clone, Debug)]
pub struct LogOtpSender;

#[async_trait]
impl OtpSender for LogOtpSender {
    async fn send(&self, message: &OtpMessage) -> Result<()> {
        info!(
            phone = %message.phone_e164,
            channel = message.channel.as_str(),
            code = %message.code,
            "otp send stub"
        );
        Ok(())
    }
}

#[derive(Clone)]
pub struct TwilioSenderConfig {
    account_sid: String,
    auth_token: SecretString,
    sms_from: Option<String>,
    whatsapp_from: Option<String>,
    sms_template: String,
    whatsapp_template: String,
}

impl TwilioSenderConfig {
    #[must_use]
    pub fn new(account_sid: String, auth_token: SecretString) -> Self {
        Self {
            account_sid,
            auth_token,
            sms_from: None,
            whatsapp_from: None,
            sms_template: DEFAULT_MESSAGE_TEMPLATE.to_string(),
            whatsapp_template: DEFAULT_MESSAGE_TEMPLATE.to_string(),
        }
    }

    #[must_use]
    pub fn with_sms_from(mut self, number: Option<String>) -> Self {
        self.sms_from = number;
        self
    }

    #[must_use]
    pub fn with_whatsapp_from(mut self, number: Option<String>) -> Self {
        self.whatsapp_from = number;
        self
    }

    #[must_use]
    pub fn with_sms_template(mut self, template: String) -> Self {
        self.sms_template = template;
        self
    }

    #[must_use]
    pub fn with_whatsapp_template(mut self, template: String) -> Self {
        self.whatsapp_template = template;
        self
    }

    #[must_use]
    pub fn sms_configured(&self) -> bool {
        self.sms_from.is_some()
    }

    #[must_use]
    pub fn whatsapp_configured(&self) -> bool {
        self.whatsapp_from.is_some()
    }
}

impl std::fmt::Debug for TwilioSenderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioSenderConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"***")
            .field("sms_from", &self.sms_from)
            .field("whatsapp_from", &self.whatsapp_from)
            .finish()
    }
}

/// Sends codes through the Twilio Messages API. WhatsApp recipients get the
/// `whatsapp:` address prefix the API requires.
pub struct TwilioSender {
    config: TwilioSenderConfig,
    client: Client,
}

impl TwilioSender {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: TwilioSenderConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("failed to build Twilio HTTP client")?;
        Ok(Self { config, client })
    }

    fn render(template: &str, message: &OtpMessage) -> String {
        template
            .replace("{otp}", &message.code)
            .replace("{minutes}", &message.expiry_minutes.to_string())
    }
}

#[async_trait]
impl OtpSender for TwilioSender {
    async fn send(&self, message: &OtpMessage) -> Result<()> {
        let (from, to, body) = match message.channel {
            Channel::Sms => {
                let from = self
                    .config
                    .sms_from
                    .as_deref()
                    .ok_or_else(|| anyhow!("SMS sender number is not configured"))?;
                (
                    from.to_string(),
                    message.phone_e164.clone(),
                    Self::render(&self.config.sms_template, message),
                )
            }
            Channel::Whatsapp => {
                let from = self
                    .config
                    .whatsapp_from
                    .as_deref()
                    .ok_or_else(|| anyhow!("WhatsApp sender number is not configured"))?;
                (
                    format!("whatsapp:{from}"),
                    format!("whatsapp:{}", message.phone_e164),
                    Self::render(&self.config.whatsapp_template, message),
                )
            }
        };

        let url = format!(
            "{TWILIO_API_BASE}/Accounts/{}/Messages.json",
            self.config.account_sid
        );
        let response = self
            .client
            .post(&url)
            .basic_auth(
                &self.config.account_sid,
                Some(self.config.auth_token.expose_secret()),
            )
            .form(&[
                ("To", to.as_str()),
                ("From", from.as_str()),
                ("Body", body.as_str()),
            ])
            .send()
            .await
            .context("Twilio request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            debug!(status = %status, detail = %detail, "Twilio rejected message");
            return Err(anyhow!("Twilio returned {status}"));
        }

        info!(
            channel = message.channel.as_str(),
            "verification code dispatched"
        );
        Ok(())
    }
}
