//! In-process cache with lazy expiry.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::Cache;

struct Entry {
    value: String,
    expires_at: Instant,
}

/// Single-process cache backed by a mutex-guarded map. Expired entries are
/// dropped on the next access that touches the map; there is no background
/// sweeper task.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| entry.expires_at > Instant::now());
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    async fn delete(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.remove(key) {
            Some(entry) => entry.expires_at > Instant::now(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_round_trip() {
        let cache = MemoryCache::new();
        cache
            .set("otp:1", "value".to_string(), Duration::from_secs(60))
            .await;
        assert_eq!(cache.get("otp:1").await.as_deref(), Some("value"));
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss() {
        let cache = MemoryCache::new();
        cache
            .set("otp:1", "value".to_string(), Duration::from_millis(0))
            .await;
        assert_eq!(cache.get("otp:1").await, None);
    }

    #[tokio::test]
    async fn delete_reports_presence_exactly_once() {
        let cache = MemoryCache::new();
        cache
            .set("otp:1", "value".to_string(), Duration::from_secs(60))
            .await;
        assert!(cache.delete("otp:1").await);
        assert!(!cache.delete("otp:1").await);
    }

    #[tokio::test]
    async fn overwrite_replaces_value_and_ttl() {
        let cache = MemoryCache::new();
        cache
            .set("otp:1", "first".to_string(), Duration::from_millis(0))
            .await;
        cache
            .set("otp:1", "second".to_string(), Duration::from_secs(60))
            .await;
        assert_eq!(cache.get("otp:1").await.as_deref(), Some("second"));
    }
}
