//! OTP tuning knobs as an immutable value object.
//!
//! The engine receives its configuration at construction instead of reading
//! ambient settings, so tests can tighten windows and flip channels without
//! global state.

use super::sender::Channel;

const DEFAULT_OTP_LENGTH: usize = 6;
const DEFAULT_EXPIRY_MINUTES: i64 = 5;
const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_LOCKOUT_MINUTES: i64 = 30;
const DEFAULT_MAX_REQUESTS_PER_HOUR: i32 = 3;
const DEFAULT_COUNTRY_CODE: &str = "57";

/// Code length is kept within sane bounds regardless of configuration input.
pub const MIN_OTP_LENGTH: usize = 4;
pub const MAX_OTP_LENGTH: usize = 8;

#[derive(Clone, Debug)]
pub struct OtpConfig {
    enabled: bool,
    otp_length: usize,
    expiry_minutes: i64,
    max_attempts: u32,
    lockout_minutes: i64,
    max_requests_per_hour: i32,
    default_channel: Channel,
    default_country_code: String,
    sms_available: bool,
    whatsapp_available: bool,
}

impl OtpConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            enabled: true,
            otp_length: DEFAULT_OTP_LENGTH,
            expiry_minutes: DEFAULT_EXPIRY_MINUTES,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            lockout_minutes: DEFAULT_LOCKOUT_MINUTES,
            max_requests_per_hour: DEFAULT_MAX_REQUESTS_PER_HOUR,
            default_channel: Channel::Sms,
            default_country_code: DEFAULT_COUNTRY_CODE.to_string(),
            sms_available: true,
            whatsapp_available: false,
        }
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_otp_length(mut self, length: usize) -> Self {
        self.otp_length = length.clamp(MIN_OTP_LENGTH, MAX_OTP_LENGTH);
        self
    }

    #[must_use]
    pub fn with_expiry_minutes(mut self, minutes: i64) -> Self {
        self.expiry_minutes = minutes.max(1);
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_lockout_minutes(mut self, minutes: i64) -> Self {
        self.lockout_minutes = minutes.max(1);
        self
    }

    #[must_use]
    pub fn with_max_requests_per_hour(mut self, max: i32) -> Self {
        self.max_requests_per_hour = max.max(1);
        self
    }

    #[must_use]
    pub fn with_default_channel(mut self, channel: Channel) -> Self {
        self.default_channel = channel;
        self
    }

    #[must_use]
    pub fn with_default_country_code(mut self, code: impl Into<String>) -> Self {
        self.default_country_code = code.into();
        self
    }

    #[must_use]
    pub fn with_sms_available(mut self, available: bool) -> Self {
        self.sms_available = available;
        self
    }

    #[must_use]
    pub fn with_whatsapp_available(mut self, available: bool) -> Self {
        self.whatsapp_available = available;
        self
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn otp_length(&self) -> usize {
        self.otp_length
    }

    #[must_use]
    pub fn expiry_minutes(&self) -> i64 {
        self.expiry_minutes
    }

    #[must_use]
    pub fn expiry_seconds(&self) -> i64 {
        self.expiry_minutes * 60
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn lockout_minutes(&self) -> i64 {
        self.lockout_minutes
    }

    #[must_use]
    pub fn lockout_seconds(&self) -> i64 {
        self.lockout_minutes * 60
    }

    #[must_use]
    pub fn max_requests_per_hour(&self) -> i32 {
        self.max_requests_per_hour
    }

    #[must_use]
    pub fn default_channel(&self) -> Channel {
        self.default_channel
    }

    #[must_use]
    pub fn default_country_code(&self) -> &str {
        &self.default_country_code
    }

    #[must_use]
    pub fn sms_available(&self) -> bool {
        self.sms_available
    }

    #[must_use]
    pub fn whatsapp_available(&self) -> bool {
        self.whatsapp_available
    }
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = OtpConfig::new();
        assert!(config.enabled());
        assert_eq!(config.otp_length(), 6);
        assert_eq!(config.expiry_minutes(), 5);
        assert_eq!(config.max_attempts(), 5);
        assert_eq!(config.lockout_minutes(), 30);
        assert_eq!(config.max_requests_per_hour(), 3);
        assert_eq!(config.default_channel(), Channel::Sms);
        assert_eq!(config.default_country_code(), "57");
    }

    #[test]
    fn otp_length_is_clamped() {
        assert_eq!(OtpConfig::new().with_otp_length(2).otp_length(), 4);
        assert_eq!(OtpConfig::new().with_otp_length(12).otp_length(), 8);
        assert_eq!(OtpConfig::new().with_otp_length(7).otp_length(), 7);
    }

    #[test]
    fn builder_overrides_apply() {
        let config = OtpConfig::new()
            .with_enabled(false)
            .with_expiry_minutes(10)
            .with_max_attempts(3)
            .with_lockout_minutes(15)
            .with_max_requests_per_hour(5)
            .with_default_channel(Channel::Whatsapp)
            .with_default_country_code("52")
            .with_whatsapp_available(true);
        assert!(!config.enabled());
        assert_eq!(config.expiry_seconds(), 600);
        assert_eq!(config.max_attempts(), 3);
        assert_eq!(config.lockout_seconds(), 900);
        assert_eq!(config.max_requests_per_hour(), 5);
        assert_eq!(config.default_channel(), Channel::Whatsapp);
        assert_eq!(config.default_country_code(), "52");
        assert!(config.whatsapp_available());
    }
}
