use std::time::Duration;

use async_trait::async_trait;
use cartogen_core::error::Result;
use cartogen_core::models::ProgressRecord;

/// Port for progress record persistence
///
/// Implementations map onto any key/value store with GET/SET/EXPIRE
/// semantics. Writers are expected to apply the order gate themselves: a
/// record must never replace one with a greater or equal `order`.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Retrieve the record for a generation session, if any
    async fn get(&self, key: &str) -> Result<Option<ProgressRecord>>;

    /// Store the record for a generation session
    async fn put(&self, key: &str, record: ProgressRecord) -> Result<()>;

    /// Schedule removal of a record after the given duration of inactivity
    async fn expire(&self, key: &str, ttl: Duration) -> Result<()>;
}
