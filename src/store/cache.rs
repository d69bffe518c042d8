use log::debug;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::error::Result;
use crate::model::{DEFAULT_CACHE_TAG, DEFAULT_EXPIRE_TIME};

#[derive(Clone, Debug)]
struct CacheEntry {
    value: Value,
    stored_at: Instant,
    expire: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) > self.expire
    }
}

/// In-memory data cache with a time-to-live per entry
#[derive(Debug, Clone)]
pub struct DataCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    default_expire: Duration,
    tag: String,
}

impl DataCache {
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_EXPIRE_TIME, DEFAULT_CACHE_TAG)
    }

    pub fn with_settings(default_expire_secs: u64, tag: &str) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            default_expire: Duration::from_secs(default_expire_secs),
            tag: tag.to_string(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Content key of `value`: SHA-256 of its JSON text, hex encoded
    pub fn key_for(value: &Value) -> Result<String> {
        let bytes = serde_json::to_vec(value)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }

    /// Store `value` under its content key and return the key
    pub async fn add(&self, value: Value, expire: Option<u64>) -> Result<String> {
        let key = Self::key_for(&value)?;
        self.put(&key, value, expire).await;
        Ok(key)
    }

    pub async fn put(&self, key: &str, value: Value, expire: Option<u64>) {
        let expire = expire.map(Duration::from_secs).unwrap_or(self.default_expire);
        let mut entries = self.entries.write().await;
        debug!("Caching '{}' ({}) for {:?}", key, self.tag, expire);
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
                expire,
            },
        );
    }

    /// Get a value if present and not expired
    pub async fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.write().await;
        let expired = entries.get(key)?.is_expired(Instant::now());
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    /// Clear all expired entries, returning how many were dropped
    pub async fn clear_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for DataCache {
    fn default() -> Self {
        Self::new()
    }
}
