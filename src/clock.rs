//! Unix-seconds time source shared by expiry checks.

use std::time::SystemTime;

/// Unix seconds used for challenge, lockout, and token expiry arithmetic.
#[must_use]
pub fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
