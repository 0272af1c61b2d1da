//! Bounded TTL cache of signed object-store URLs, fronting the storage
//! gateway the way the teacher's `pmoqobuz`-style caches front a remote API.
//!
//! Keyed by `(bucket, object_path, expiry_bucket)` so every caller within
//! one TTL window observes the same signed URL (`spec.md` §8 invariant 3).
//! A single `Mutex` serializes readers and writers; no awaiting call is
//! held under the lock — misses drop the guard before calling the signer.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

const DEFAULT_MAX_ENTRIES: usize = 10_000;
const SAFETY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    bucket: String,
    object_path: String,
    expiry_bucket: u64,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    url: String,
    expires_at: DateTime<Utc>,
}

pub struct SignedUrlCache {
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl SignedUrlCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn expiry_bucket(&self, now: u64) -> u64 {
        now / self.ttl.as_secs().max(1)
    }

    /// Look up a cached URL, returning `None` on a miss or an expired hit
    /// inside the safety margin. The caller signs on a miss and calls
    /// [`SignedUrlCache::insert`].
    pub fn get(&self, bucket: &str, object_path: &str) -> Option<String> {
        let now = now_secs();
        let key = CacheKey {
            bucket: bucket.to_string(),
            object_path: object_path.to_string(),
            expiry_bucket: self.expiry_bucket(now),
        };
        let entries = self.entries.lock().expect("cache mutex poisoned");
        let entry = entries.get(&key)?;
        let now_dt = Utc::now();
        if now_dt + chrono::Duration::from_std(SAFETY_MARGIN).unwrap() < entry.expires_at {
            Some(entry.url.clone())
        } else {
            None
        }
    }

    /// Insert a freshly signed URL, evicting the soonest-to-expire entry
    /// first if the cache is at capacity.
    pub fn insert(&self, bucket: &str, object_path: &str, url: String, expires_at: DateTime<Utc>) {
        let now = now_secs();
        let key = CacheKey {
            bucket: bucket.to_string(),
            object_path: object_path.to_string(),
            expiry_bucket: self.expiry_bucket(now),
        };
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            if let Some(soonest) = entries
                .iter()
                .min_by_key(|(_, v)| v.expires_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&soonest);
            }
        }
        entries.insert(key, CacheEntry { url, expires_at });
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
