//! Expiring key-value cache collaborator.
//!
//! Rate-limit counters, registration lockout markers, and pending
//! registrations all live behind this trait. The in-process [`MemoryCache`]
//! is the default; a shared backend (e.g. Redis) can implement the same
//! trait when the service runs with more than one replica.

mod memory;

pub use memory::MemoryCache;

use async_trait::async_trait;
use std::time::Duration;

/// Standard expiring key-value semantics: a value set with a TTL is gone
/// after the TTL elapses.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;

    async fn set(&self, key: &str, value: String, ttl: Duration);

    /// Remove a key, reporting whether an entry was actually present.
    /// Callers use the return value for take-once semantics.
    async fn delete(&self, key: &str) -> bool;
}
