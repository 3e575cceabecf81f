//! Order-gated progress tracking across multiple generation jobs.
//!
//! One tracker exists per generation session and folds the fractional
//! progress of N per-column jobs into a single overall number. Every write
//! carries a session-monotonic `order`; the store is only updated when the
//! incoming order exceeds the stored one, so interleaved or delayed writes
//! can never make the visible progress regress.

use std::time::Duration;

use cartogen_core::error::Result;
use cartogen_core::models::{ProgressRecord, ProgressReport};
use cartogen_store::ProgressStore;

fn session_key(key: &str) -> String {
    format!("cartprogress-{key}")
}

/// Progress state for one generation session of `total` datasets.
pub struct ProgressTracker<'a, S: ProgressStore> {
    store: &'a S,
    key: String,
    total: usize,
    /// 0-based index of the dataset currently generating
    index: usize,
    /// Session-wide monotonic write counter
    order: u64,
    /// Accumulated stderr of the current dataset
    stderr: String,
    name: String,
    ttl: Duration,
}

impl<'a, S: ProgressStore> ProgressTracker<'a, S> {
    pub fn new(store: &'a S, key: impl Into<String>, total: usize, ttl: Duration) -> Self {
        Self {
            store,
            key: key.into(),
            total: total.max(1),
            index: 0,
            order: 0,
            stderr: String::new(),
            name: String::new(),
            ttl,
        }
    }

    /// Begin dataset `index` (0-based) and publish a zero-progress record.
    pub async fn begin_dataset(&mut self, index: usize, name: &str) -> Result<()> {
        self.index = index;
        self.name = name.to_string();
        self.stderr = format!("Dataset {}/{}\n", index + 1, self.total);
        self.publish(0.0).await
    }

    /// Append one raw stderr line to the current dataset's diagnostics.
    pub fn append_stderr(&mut self, line: &str) {
        self.stderr.push_str(line);
        self.stderr.push('\n');
    }

    /// Publish the current dataset's fractional progress.
    ///
    /// Overall progress is `(progress + index) / total`, forced to exactly
    /// 1.0 only when the final dataset reports 1.0. The intermediate
    /// formula alone can stick at 0.99999 on the last dataset.
    pub async fn publish(&mut self, progress: f64) -> Result<()> {
        let overall = if progress == 1.0 && self.index + 1 >= self.total {
            1.0
        } else {
            (progress + self.index as f64) / self.total as f64
        };

        self.order += 1;
        let record = ProgressRecord {
            order: self.order,
            stderr: self.stderr.clone(),
            name: self.name.clone(),
            progress: overall,
        };

        let key = session_key(&self.key);
        let apply = match self.store.get(&key).await? {
            Some(stored) => stored.order < record.order,
            None => true,
        };
        if apply {
            self.store.put(&key, record).await?;
        }
        self.store.expire(&key, self.ttl).await?;
        Ok(())
    }
}

/// Poll the stored progress of a session.
pub async fn poll_progress<S: ProgressStore>(store: &S, key: &str) -> Result<ProgressReport> {
    Ok(store
        .get(&session_key(key))
        .await?
        .map(ProgressReport::from)
        .unwrap_or_else(ProgressReport::empty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartogen_store::MemoryProgressStore;

    const TTL: Duration = Duration::from_secs(300);

    async fn stored(store: &MemoryProgressStore) -> ProgressRecord {
        store.get("cartprogress-s").await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_overall_fold_across_datasets() {
        let store = MemoryProgressStore::new();
        let mut tracker = ProgressTracker::new(&store, "s", 3, TTL);

        // Dataset 2 of 3 (0-based index 1)
        tracker.begin_dataset(1, "Population").await.unwrap();
        tracker.publish(0.5).await.unwrap();
        assert!((stored(&store).await.progress - (0.5 + 1.0) / 3.0).abs() < 1e-12);

        tracker.publish(1.0).await.unwrap();
        assert!((stored(&store).await.progress - 2.0 / 3.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_exactly_one_only_on_final_dataset() {
        let store = MemoryProgressStore::new();
        let mut tracker = ProgressTracker::new(&store, "s", 3, TTL);

        tracker.begin_dataset(2, "Area").await.unwrap();
        tracker.publish(1.0).await.unwrap();
        assert_eq!(stored(&store).await.progress, 1.0);
    }

    #[tokio::test]
    async fn test_stale_order_discarded() {
        let store = MemoryProgressStore::new();
        store
            .put(
                "cartprogress-s",
                ProgressRecord {
                    order: 100,
                    stderr: String::new(),
                    name: "late".to_string(),
                    progress: 0.9,
                },
            )
            .await
            .unwrap();

        let mut tracker = ProgressTracker::new(&store, "s", 3, TTL);
        tracker.begin_dataset(0, "early").await.unwrap();
        tracker.publish(0.1).await.unwrap();

        let record = stored(&store).await;
        assert_eq!(record.order, 100);
        assert_eq!(record.name, "late");
    }

    #[tokio::test]
    async fn test_progress_is_non_decreasing_over_sequential_jobs() {
        let store = MemoryProgressStore::new();
        let mut tracker = ProgressTracker::new(&store, "s", 3, TTL);

        let mut last = 0.0;
        for index in 0..3 {
            tracker.begin_dataset(index, "job").await.unwrap();
            for step in [0.25, 0.5, 0.75, 1.0] {
                tracker.publish(step).await.unwrap();
                let progress = stored(&store).await.progress;
                assert!(progress >= last, "progress regressed: {last} -> {progress}");
                last = progress;
            }
        }
        assert_eq!(last, 1.0);
    }

    #[tokio::test]
    async fn test_stderr_banner_per_dataset() {
        let store = MemoryProgressStore::new();
        let mut tracker = ProgressTracker::new(&store, "s", 2, TTL);

        tracker.begin_dataset(0, "first").await.unwrap();
        tracker.append_stderr("reading polygons");
        tracker.publish(0.5).await.unwrap();

        let record = stored(&store).await;
        assert!(record.stderr.starts_with("Dataset 1/2\n"));
        assert!(record.stderr.contains("reading polygons"));
    }

    #[tokio::test]
    async fn test_poll_missing_session() {
        let store = MemoryProgressStore::new();
        let report = poll_progress(&store, "absent").await.unwrap();
        assert_eq!(report.progress, None);
        assert!(report.stderr.is_empty());
    }
}
