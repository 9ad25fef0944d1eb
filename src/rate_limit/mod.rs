//! Fixed-window rate limiting on top of the expiring cache.
//!
//! Counters are per `(action, subject)` where the subject is a client IP or
//! a normalized phone number. The window is fixed, not sliding, and the TTL
//! is refreshed on every increment; a burst straddling a window boundary can
//! therefore admit up to twice the limit. That is accepted behavior: the
//! limiter is a DoS-mitigation heuristic, not an exact accounting system,
//! and lost increments under concurrency are likewise acceptable.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::cache::Cache;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitAction {
    OtpSettings,
    RequestOtp,
    VerifyOtp,
    RegisterOtp,
    VerifyRegistration,
    ResendRegistration,
    CancelRegistration,
}

impl RateLimitAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OtpSettings => "otp_settings",
            Self::RequestOtp => "request_otp",
            Self::VerifyOtp => "verify_otp",
            Self::RegisterOtp => "register_otp",
            Self::VerifyRegistration => "verify_registration",
            Self::ResendRegistration => "resend_registration",
            Self::CancelRegistration => "cancel_registration",
        }
    }

    /// `(limit, window_seconds)` per action. Sensitive actions get tighter
    /// budgets; `register_otp` is keyed by phone rather than IP and uses an
    /// hourly window.
    #[must_use]
    pub const fn limits(self) -> (u32, u64) {
        match self {
            Self::OtpSettings => (60, 60),
            Self::RequestOtp => (10, 60),
            Self::VerifyOtp => (20, 60),
            Self::RegisterOtp => (5, 3600),
            Self::VerifyRegistration | Self::ResendRegistration | Self::CancelRegistration => {
                (20, 60)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited { retry_after_seconds: u64 },
}

impl RateLimitDecision {
    #[must_use]
    pub const fn is_limited(self) -> bool {
        matches!(self, Self::Limited { .. })
    }
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Read the counter for `action:subject`; fail without incrementing when
    /// the limit is already reached, otherwise increment and refresh the TTL.
    async fn check_and_increment(
        &self,
        action: RateLimitAction,
        subject: &str,
    ) -> RateLimitDecision;
}

/// Cache-backed limiter used in production.
pub struct CacheRateLimiter {
    cache: Arc<dyn Cache>,
}

impl CacheRateLimiter {
    #[must_use]
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl RateLimiter for CacheRateLimiter {
    async fn check_and_increment(
        &self,
        action: RateLimitAction,
        subject: &str,
    ) -> RateLimitDecision {
        let (limit, window_seconds) = action.limits();
        let key = format!("rate_limit:{}:{subject}", action.as_str());

        let current: u32 = match self.cache.get(&key).await {
            Some(value) => value.parse().unwrap_or(0),
            None => 0,
        };

        if current >= limit {
            warn!(
                action = action.as_str(),
                subject, limit, "rate limit exceeded"
            );
            return RateLimitDecision::Limited {
                retry_after_seconds: window_seconds,
            };
        }

        self.cache
            .set(
                &key,
                (current + 1).to_string(),
                Duration::from_secs(window_seconds),
            )
            .await;
        RateLimitDecision::Allowed
    }
}

/// Limiter that always allows; used in tests.
#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

#[async_trait]
impl RateLimiter for NoopRateLimiter {
    async fn check_and_increment(
        &self,
        _action: RateLimitAction,
        _subject: &str,
    ) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    #[tokio::test]
    async fn allows_until_limit_then_blocks() {
        let limiter = CacheRateLimiter::new(Arc::new(MemoryCache::new()));
        let (limit, window) = RateLimitAction::RequestOtp.limits();
        for _ in 0..limit {
            assert_eq!(
                limiter
                    .check_and_increment(RateLimitAction::RequestOtp, "1.2.3.4")
                    .await,
                RateLimitDecision::Allowed
            );
        }
        assert_eq!(
            limiter
                .check_and_increment(RateLimitAction::RequestOtp, "1.2.3.4")
                .await,
            RateLimitDecision::Limited {
                retry_after_seconds: window
            }
        );
    }

    #[tokio::test]
    async fn subjects_are_independent() {
        let limiter = CacheRateLimiter::new(Arc::new(MemoryCache::new()));
        let (limit, _) = RateLimitAction::RegisterOtp.limits();
        for _ in 0..limit {
            limiter
                .check_and_increment(RateLimitAction::RegisterOtp, "3001234567")
                .await;
        }
        assert!(
            limiter
                .check_and_increment(RateLimitAction::RegisterOtp, "3001234567")
                .await
                .is_limited()
        );
        assert_eq!(
            limiter
                .check_and_increment(RateLimitAction::RegisterOtp, "3009999999")
                .await,
            RateLimitDecision::Allowed
        );
    }

    #[tokio::test]
    async fn actions_are_independent() {
        let limiter = CacheRateLimiter::new(Arc::new(MemoryCache::new()));
        let (limit, _) = RateLimitAction::RequestOtp.limits();
        for _ in 0..limit {
            limiter
                .check_and_increment(RateLimitAction::RequestOtp, "1.2.3.4")
                .await;
        }
        assert_eq!(
            limiter
                .check_and_increment(RateLimitAction::VerifyOtp, "1.2.3.4")
                .await,
            RateLimitDecision::Allowed
        );
    }

    #[tokio::test]
    async fn noop_always_allows() {
        let limiter = NoopRateLimiter;
        for _ in 0..100 {
            assert_eq!(
                limiter
                    .check_and_increment(RateLimitAction::VerifyOtp, "1.2.3.4")
                    .await,
                RateLimitDecision::Allowed
            );
        }
    }
}
