//! In-memory progress storage for development and testing.
//!
//! This implementation uses `RwLock::unwrap()` intentionally. Lock poisoning
//! only occurs when another thread panicked while holding the lock, which is
//! an unrecoverable state. For production workloads, back the port with a
//! shared key/value store such as Redis.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cartogen_core::error::Result;
use cartogen_core::models::ProgressRecord;

use crate::ports::ProgressStore;

#[derive(Debug, Clone)]
struct Entry {
    record: ProgressRecord,
    deadline: Option<Instant>,
}

/// In-memory implementation of ProgressStore with lazy TTL expiry
#[derive(Debug, Clone, Default)]
pub struct MemoryProgressStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryProgressStore {
    /// Create a new in-memory progress store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-expired) records, mainly for tests
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .unwrap()
            .values()
            .filter(|entry| entry.deadline.map_or(true, |d| d > now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn get(&self, key: &str) -> Result<Option<ProgressRecord>> {
        let mut entries = self.entries.write().unwrap();
        let expired = entries
            .get(key)
            .is_some_and(|entry| entry.deadline.is_some_and(|d| d <= Instant::now()));
        if expired {
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).map(|entry| entry.record.clone()))
    }

    async fn put(&self, key: &str, record: ProgressRecord) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        // A fresh write clears any pending expiry until expire() is called again
        entries.insert(key.to_string(), Entry { record, deadline: None });
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        if let Some(entry) = entries.get_mut(key) {
            entry.deadline = Some(Instant::now() + ttl);
        }
        Ok(())
    }
}
