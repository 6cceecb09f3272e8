// SPDX-License-Identifier: MIT

//! Best-effort Redis cache.
//!
//! Cached entries are disposable projections of Firestore state: every
//! operation here swallows transport failures (logged, never surfaced), and
//! every store mutation deletes the affected keys instead of rewriting them.
//! A missed delete is bounded by the per-key TTL.

use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// TTL for `user:<id>` entries.
pub const USER_TTL: Duration = Duration::from_secs(60 * 60);
/// TTL for `favourites:<id>` entries.
pub const FAVOURITES_TTL: Duration = Duration::from_secs(10 * 60);
/// TTL for `geocode:<address>` entries.
pub const GEOCODE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub fn user_key(user_id: &str) -> String {
    format!("user:{}", user_id)
}

pub fn favourites_key(user_id: &str) -> String {
    format!("favourites:{}", user_id)
}

pub fn geocode_key(address: &str) -> String {
    format!("geocode:{}", address)
}

#[derive(Clone)]
enum Backend {
    Redis(redis::aio::ConnectionManager),
    /// Process-local map for tests; ignores TTLs (entries live until
    /// deleted).
    Memory(Arc<Mutex<HashMap<String, String>>>),
}

/// Redis-backed cache store. `None` backend means caching is disabled
/// (no REDIS_URL, or tests); every call then reports a miss or a no-op.
#[derive(Clone)]
pub struct CacheStore {
    backend: Option<Backend>,
}

impl CacheStore {
    /// Connect to Redis. A connection failure disables the cache rather
    /// than failing startup; Firestore remains the source of truth.
    pub async fn connect(url: &str) -> Self {
        let backend = match redis::Client::open(url) {
            Ok(client) => match client.get_connection_manager().await {
                Ok(manager) => {
                    tracing::info!("Connected to Redis");
                    Some(Backend::Redis(manager))
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Redis unavailable, cache disabled");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "Invalid Redis URL, cache disabled");
                None
            }
        };
        Self { backend }
    }

    /// Create a disabled cache (for tests, or when REDIS_URL is unset).
    pub fn disabled() -> Self {
        Self { backend: None }
    }

    /// In-memory cache for tests that need to observe reads, writes, and
    /// invalidations without a Redis server.
    pub fn in_memory() -> Self {
        Self {
            backend: Some(Backend::Memory(Arc::new(Mutex::new(HashMap::new())))),
        }
    }

    /// Get and deserialize a cached value. Any failure is a miss.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.clone()? {
            Backend::Redis(mut conn) => match conn.get::<_, Option<String>>(key).await {
                Ok(value) => value?,
                Err(e) => {
                    tracing::warn!(key, error = %e, "Cache read failed");
                    return None;
                }
            },
            Backend::Memory(map) => map.lock().ok()?.get(key).cloned()?,
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache entry failed to deserialize");
                None
            }
        }
    }

    /// Serialize and store a value with a TTL. Failures are logged and
    /// dropped.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let Some(backend) = self.backend.clone() else {
            return;
        };
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache entry failed to serialize");
                return;
            }
        };
        match backend {
            Backend::Redis(mut conn) => {
                if let Err(e) = conn.set_ex::<_, _, ()>(key, raw, ttl.as_secs()).await {
                    tracing::warn!(key, error = %e, "Cache write failed");
                }
            }
            Backend::Memory(map) => {
                if let Ok(mut map) = map.lock() {
                    map.insert(key.to_string(), raw);
                }
            }
        }
    }

    /// Delete a key. Failures are logged and dropped (the TTL bounds the
    /// resulting staleness).
    pub async fn delete(&self, key: &str) {
        let Some(backend) = self.backend.clone() else {
            return;
        };
        match backend {
            Backend::Redis(mut conn) => {
                if let Err(e) = conn.del::<_, ()>(key).await {
                    tracing::warn!(key, error = %e, "Cache delete failed");
                }
            }
            Backend::Memory(map) => {
                if let Ok(mut map) = map.lock() {
                    map.remove(key);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_formats() {
        assert_eq!(user_key("abc"), "user:abc");
        assert_eq!(favourites_key("abc"), "favourites:abc");
        assert_eq!(geocode_key("12 Main St, Pune"), "geocode:12 Main St, Pune");
    }

    #[tokio::test]
    async fn test_disabled_cache_is_a_noop() {
        let cache = CacheStore::disabled();
        cache.set_json("k", &vec!["a".to_string()], USER_TTL).await;
        let got: Option<Vec<String>> = cache.get_json("k").await;
        assert!(got.is_none());
        cache.delete("k").await;
    }

    #[tokio::test]
    async fn test_memory_cache_round_trip_and_delete() {
        let cache = CacheStore::in_memory();
        cache.set_json("k", &vec!["a".to_string()], USER_TTL).await;
        let got: Option<Vec<String>> = cache.get_json("k").await;
        assert_eq!(got, Some(vec!["a".to_string()]));

        cache.delete("k").await;
        let got: Option<Vec<String>> = cache.get_json("k").await;
        assert!(got.is_none());
    }
}
