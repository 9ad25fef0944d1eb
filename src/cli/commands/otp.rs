//! OTP tuning arguments.

use anyhow::Result;
use clap::{Arg, ArgMatches, Command};

pub const ARG_OTP_ENABLED: &str = "otp-enabled";
pub const ARG_OTP_LENGTH: &str = "otp-length";
pub const ARG_OTP_EXPIRY_MINUTES: &str = "otp-expiry-minutes";
pub const ARG_OTP_MAX_ATTEMPTS: &str = "otp-max-attempts";
pub const ARG_OTP_LOCKOUT_MINUTES: &str = "otp-lockout-minutes";
pub const ARG_OTP_MAX_REQUESTS_PER_HOUR: &str = "otp-max-requests-per-hour";
pub const ARG_OTP_DEFAULT_CHANNEL: &str = "otp-default-channel";
pub const ARG_OTP_COUNTRY_CODE: &str = "otp-country-code";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_OTP_ENABLED)
                .long(ARG_OTP_ENABLED)
                .help("Enable OTP verification")
                .default_value("true")
                .env("ENTRADA_OTP_ENABLED")
                .value_parser(clap::value_parser!(bool)),
        )
        .arg(
            Arg::new(ARG_OTP_LENGTH)
                .long(ARG_OTP_LENGTH)
                .help("Code length in digits (4-8)")
                .default_value("6")
                .env("ENTRADA_OTP_LENGTH")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_OTP_EXPIRY_MINUTES)
                .long(ARG_OTP_EXPIRY_MINUTES)
                .help("Minutes before an issued code expires")
                .default_value("5")
                .env("ENTRADA_OTP_EXPIRY_MINUTES")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_OTP_MAX_ATTEMPTS)
                .long(ARG_OTP_MAX_ATTEMPTS)
                .help("Failed attempts before a lockout")
                .default_value("5")
                .env("ENTRADA_OTP_MAX_ATTEMPTS")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_OTP_LOCKOUT_MINUTES)
                .long(ARG_OTP_LOCKOUT_MINUTES)
                .help("Lockout duration in minutes")
                .default_value("30")
                .env("ENTRADA_OTP_LOCKOUT_MINUTES")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_OTP_MAX_REQUESTS_PER_HOUR)
                .long(ARG_OTP_MAX_REQUESTS_PER_HOUR)
                .help("OTP requests allowed per contact per hour")
                .default_value("3")
                .env("ENTRADA_OTP_MAX_REQUESTS_PER_HOUR")
                .value_parser(clap::value_parser!(i32)),
        )
        .arg(
            Arg::new(ARG_OTP_DEFAULT_CHANNEL)
                .long(ARG_OTP_DEFAULT_CHANNEL)
                .help("Default delivery channel: sms or whatsapp")
                .default_value("sms")
                .env("ENTRADA_OTP_DEFAULT_CHANNEL"),
        )
        .arg(
            Arg::new(ARG_OTP_COUNTRY_CODE)
                .long(ARG_OTP_COUNTRY_CODE)
                .help("Country code prefixed to phone numbers without one")
                .default_value("57")
                .env("ENTRADA_OTP_COUNTRY_CODE"),
        )
}

#[derive(Debug)]
pub struct Options {
    pub enabled: bool,
    pub length: usize,
    pub expiry_minutes: i64,
    pub max_attempts: u32,
    pub lockout_minutes: i64,
    pub max_requests_per_hour: i32,
    pub default_channel: String,
    pub country_code: String,
}

impl Options {
    /// # Errors
    /// Infallible today; kept fallible to match the other option parsers.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            enabled: matches
                .get_one::<bool>(ARG_OTP_ENABLED)
                .copied()
                .unwrap_or(true),
            length: matches
                .get_one::<usize>(ARG_OTP_LENGTH)
                .copied()
                .unwrap_or(6),
            expiry_minutes: matches
                .get_one::<i64>(ARG_OTP_EXPIRY_MINUTES)
                .copied()
                .unwrap_or(5),
            max_attempts: matches
                .get_one::<u32>(ARG_OTP_MAX_ATTEMPTS)
                .copied()
                .unwrap_or(5),
            lockout_minutes: matches
                .get_one::<i64>(ARG_OTP_LOCKOUT_MINUTES)
                .copied()
                .unwrap_or(30),
            max_requests_per_hour: matches
                .get_one::<i32>(ARG_OTP_MAX_REQUESTS_PER_HOUR)
                .copied()
                .unwrap_or(3),
            default_channel: matches
                .get_one::<String>(ARG_OTP_DEFAULT_CHANNEL)
                .cloned()
                .unwrap_or_else(|| "sms".to_string()),
            country_code: matches
                .get_one::<String>(ARG_OTP_COUNTRY_CODE)
                .cloned()
                .unwrap_or_else(|| "57".to_string()),
        })
    }
}
