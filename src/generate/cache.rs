//! Content-keyed cache with per-entry expiry
//!
//! Keys are SHA-256 digests of the content, so long story texts are not
//! held twice. Expired entries are dropped on read and swept on write.

use std::collections::HashMap;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// Concurrent TTL cache mapping content to a string value
#[derive(Debug)]
pub struct TtlCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl TtlCache {
    /// Create a cache whose entries live for `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    fn key(content: &str) -> String {
        hex::encode(Sha256::digest(content.as_bytes()))
    }

    /// Look up the value stored for `content`, if still fresh
    pub async fn get(&self, content: &str) -> Option<String> {
        let key = Self::key(content);
        let now = Instant::now();

        {
            let entries = self.entries.read().await;
            match entries.get(&key) {
                Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: drop it unless a writer refreshed it meanwhile
        let mut entries = self.entries.write().await;
        if entries.get(&key).is_some_and(|e| e.expires_at <= now) {
            entries.remove(&key);
        }
        None
    }

    /// Store `value` for `content`, replacing any previous entry
    pub async fn insert(&self, content: &str, value: String) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, e| e.expires_at > now);
        entries.insert(
            Self::key(content),
            CacheEntry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Number of entries, including expired ones not yet swept
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
