//! Twilio delivery arguments. Without credentials the server falls back to
//! the logging sender, which is only useful for local development.

use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_TWILIO_ACCOUNT_SID: &str = "twilio-account-sid";
pub const ARG_TWILIO_AUTH_TOKEN: &str = "twilio-auth-token";
pub const ARG_TWILIO_SMS_FROM: &str = "twilio-sms-from";
pub const ARG_TWILIO_WHATSAPP_FROM: &str = "twilio-whatsapp-from";
pub const ARG_TWILIO_SMS_TEMPLATE: &str = "twilio-sms-template";
pub const ARG_TWILIO_WHATSAPP_TEMPLATE: &str = "twilio-whatsapp-template";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TWILIO_ACCOUNT_SID)
                .long(ARG_TWILIO_ACCOUNT_SID)
                .help("Twilio account SID")
                .env("ENTRADA_TWILIO_ACCOUNT_SID"),
        )
        .arg(
            Arg::new(ARG_TWILIO_AUTH_TOKEN)
                .long(ARG_TWILIO_AUTH_TOKEN)
                .help("Twilio auth token")
                .env("ENTRADA_TWILIO_AUTH_TOKEN"),
        )
        .arg(
            Arg::new(ARG_TWILIO_SMS_FROM)
                .long(ARG_TWILIO_SMS_FROM)
                .help("Sender number for SMS, E.164 format")
                .env("ENTRADA_TWILIO_SMS_FROM"),
        )
        .arg(
            Arg::new(ARG_TWILIO_WHATSAPP_FROM)
                .long(ARG_TWILIO_WHATSAPP_FROM)
                .help("Sender number for WhatsApp, E.164 format")
                .env("ENTRADA_TWILIO_WHATSAPP_FROM"),
        )
        .arg(
            Arg::new(ARG_TWILIO_SMS_TEMPLATE)
                .long(ARG_TWILIO_SMS_TEMPLATE)
                .help("SMS body template; {otp} and {minutes} are substituted")
                .env("ENTRADA_TWILIO_SMS_TEMPLATE"),
        )
        .arg(
            Arg::new(ARG_TWILIO_WHATSAPP_TEMPLATE)
                .long(ARG_TWILIO_WHATSAPP_TEMPLATE)
                .help("WhatsApp body template; {otp} and {minutes} are substituted")
                .env("ENTRADA_TWILIO_WHATSAPP_TEMPLATE"),
        )
}

#[derive(Debug)]
pub struct Options {
    pub account_sid: Option<String>,
    pub auth_token: Option<SecretString>,
    pub sms_from: Option<String>,
    pub whatsapp_from: Option<String>,
    pub sms_template: Option<String>,
    pub whatsapp_template: Option<String>,
}

impl Options {
    /// # Errors
    /// Infallible today; kept fallible to match the other option parsers.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            account_sid: matches.get_one::<String>(ARG_TWILIO_ACCOUNT_SID).cloned(),
            auth_token: matches
                .get_one::<String>(ARG_TWILIO_AUTH_TOKEN)
                .cloned()
                .map(SecretString::from),
            sms_from: matches.get_one::<String>(ARG_TWILIO_SMS_FROM).cloned(),
            whatsapp_from: matches.get_one::<String>(ARG_TWILIO_WHATSAPP_FROM).cloned(),
            sms_template: matches.get_one::<String>(ARG_TWILIO_SMS_TEMPLATE).cloned(),
            whatsapp_template: matches
                .get_one::<String>(ARG_TWILIO_WHATSAPP_TEMPLATE)
                .cloned(),
        })
    }

    /// Credentials are the gate: both SID and token must be present for the
    /// real sender to be used.
    #[must_use]
    pub fn configured(&self) -> bool {
        self.account_sid.is_some() && self.auth_token.is_some()
    }
}
