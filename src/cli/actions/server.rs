use crate::api;
use crate::cli::commands::{otp, twilio};
use crate::otp::{Channel, LogOtpSender, OtpConfig, OtpSender, TwilioSender, TwilioSenderConfig};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub frontend_base_url: String,
    pub otp: otp::Options,
    pub twilio: twilio::Options,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the sender cannot be built or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let (sender, sms_available, whatsapp_available): (Arc<dyn OtpSender>, bool, bool) =
        if args.twilio.configured() {
            let account_sid = args
                .twilio
                .account_sid
                .clone()
                .context("Twilio account SID is required")?;
            let auth_token = args
                .twilio
                .auth_token
                .clone()
                .context("Twilio auth token is required")?;
            let mut config = TwilioSenderConfig::new(account_sid, auth_token)
                .with_sms_from(args.twilio.sms_from.clone())
                .with_whatsapp_from(args.twilio.whatsapp_from.clone());
            if let Some(template) = args.twilio.sms_template.clone() {
                config = config.with_sms_template(template);
            }
            if let Some(template) = args.twilio.whatsapp_template.clone() {
                config = config.with_whatsapp_template(template);
            }
            let sms = config.sms_configured();
            let whatsapp = config.whatsapp_configured();
            (Arc::new(TwilioSender::new(config)?), sms, whatsapp)
        } else {
            // Codes end up in the logs only; never run production like this.
            warn!("Twilio credentials not configured, using logging sender");
            (Arc::new(LogOtpSender), true, true)
        };

    let otp_config = OtpConfig::new()
        .with_enabled(args.otp.enabled)
        .with_otp_length(args.otp.length)
        .with_expiry_minutes(args.otp.expiry_minutes)
        .with_max_attempts(args.otp.max_attempts)
        .with_lockout_minutes(args.otp.lockout_minutes)
        .with_max_requests_per_hour(args.otp.max_requests_per_hour)
        .with_default_channel(Channel::from_param(&args.otp.default_channel))
        .with_default_country_code(args.otp.country_code.clone())
        .with_sms_available(sms_available)
        .with_whatsapp_available(whatsapp_available);

    api::new(
        args.port,
        args.dsn,
        args.frontend_base_url,
        otp_config,
        sender,
    )
    .await
}
