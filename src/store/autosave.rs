//! Best-effort durable autosave of the visible history snapshot.
//!
//! The record lives under a single key as
//! `{ "data": <snapshot>, "timestamp": <RFC 3339> }`. Writes never surface
//! errors to callers: failures are logged and kept in [`AutosaveStatus`] so the
//! UI can show a stale "last saved" indicator.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::RosterResult;
use crate::store::history::HistoryManager;
use crate::store::kv::KeyValueStore;

/// The persisted autosave record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutosaveRecord<T> {
    pub data: T,
    pub timestamp: String,
}

impl<T> AutosaveRecord<T> {
    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }
}

#[derive(Serialize)]
struct AutosaveRecordRef<'a, T> {
    data: &'a T,
    timestamp: String,
}

/// Outcome of the most recent autosave attempts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AutosaveStatus {
    /// Time of the last successful write.
    pub last_saved: Option<DateTime<Utc>>,
    /// Message of the last failed write, cleared by the next success.
    pub last_error: Option<String>,
    pub failed_writes: u64,
}

pub struct Autosaver {
    store: Arc<dyn KeyValueStore>,
    key: String,
    status: RwLock<AutosaveStatus>,
    /// History revision of the last snapshot written. Held across each write.
    written: Mutex<Option<u64>>,
}

impl Autosaver {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            status: RwLock::new(AutosaveStatus::default()),
            written: Mutex::new(None),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Write the snapshot taken at history `revision`.
    ///
    /// Writes are serialized, and a snapshot older than the last one written
    /// is dropped. Returns whether this snapshot was written.
    pub async fn save<T: Serialize>(&self, revision: u64, snapshot: &T) -> bool {
        let mut written = self.written.lock().await;
        if let Some(last) = *written {
            if revision < last {
                tracing::debug!(key = %self.key, revision, last, "skipping stale autosave");
                return false;
            }
        }

        let now = Utc::now();
        let result = self.write(snapshot, now).await;

        let mut status = self.status.write().await;
        match result {
            Ok(()) => {
                *written = Some(revision);
                status.last_saved = Some(now);
                status.last_error = None;
                tracing::trace!(key = %self.key, "autosave written");
                true
            }
            Err(err) => {
                status.last_error = Some(err.to_string());
                status.failed_writes += 1;
                tracing::warn!(key = %self.key, error = %err, "autosave write failed");
                false
            }
        }
    }

    async fn write<T: Serialize>(&self, snapshot: &T, at: DateTime<Utc>) -> RosterResult<()> {
        let record = AutosaveRecordRef {
            data: snapshot,
            timestamp: at.to_rfc3339(),
        };
        let bytes = serde_json::to_vec(&record)?;
        self.store.put(&self.key, bytes).await
    }

    /// Read the last record.
    ///
    /// A missing key yields `None`. An unreadable record is discarded so the
    /// next start does not trip over it again.
    pub async fn load<T: DeserializeOwned>(&self) -> Option<AutosaveRecord<T>> {
        let bytes = match self.store.get(&self.key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(key = %self.key, error = %err, "autosave read failed");
                return None;
            }
        };

        match serde_json::from_slice::<AutosaveRecord<T>>(&bytes) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(key = %self.key, error = %err, "discarding corrupt autosave record");
                if let Err(err) = self.store.delete(&self.key).await {
                    tracing::warn!(key = %self.key, error = %err, "failed to discard autosave record");
                }
                None
            }
        }
    }

    /// Forget the last written revision. Call when a new history log starts
    /// writing through this saver.
    pub async fn restart_sequence(&self) {
        *self.written.lock().await = None;
    }

    /// Remove the stored record.
    pub async fn clear(&self) -> RosterResult<()> {
        self.store.delete(&self.key).await
    }

    pub async fn status(&self) -> AutosaveStatus {
        self.status.read().await.clone()
    }

    /// Save the current snapshot of `history` every `period`.
    ///
    /// The snapshot is taken while holding the history lock and written after
    /// releasing it, so a write never observes a half-applied commit.
    pub fn spawn_periodic<T>(
        self: Arc<Self>,
        history: Arc<Mutex<HistoryManager<T>>>,
        period: Duration,
    ) -> JoinHandle<()>
    where
        T: Serialize + Send + Sync + 'static,
    {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately.
            interval.tick().await;

            loop {
                interval.tick().await;
                let (revision, snapshot) = {
                    let history = history.lock().await;
                    (history.revision(), history.current_snapshot())
                };
                self.save(revision, snapshot.as_ref()).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RosterError;
    use crate::store::history::ActionType;
    use crate::store::kv::InMemoryKeyValueStore;
    use async_trait::async_trait;

    struct FullDisk;

    #[async_trait]
    impl KeyValueStore for FullDisk {
        async fn get(&self, _key: &str) -> RosterResult<Option<Vec<u8>>> {
            Ok(None)
        }

        async fn put(&self, _key: &str, _value: Vec<u8>) -> RosterResult<()> {
            Err(RosterError::Storage("quota exceeded".to_string()))
        }

        async fn delete(&self, _key: &str) -> RosterResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let saver = Autosaver::new(Arc::new(InMemoryKeyValueStore::new()), "slot");
        assert!(saver.load::<Vec<u32>>().await.is_none());

        assert!(saver.save(1, &vec![1u32, 2, 3]).await);
        let record = saver.load::<Vec<u32>>().await.unwrap();
        assert_eq!(record.data, vec![1, 2, 3]);
        assert!(record.saved_at().is_some());

        let status = saver.status().await;
        assert!(status.last_saved.is_some());
        assert!(status.last_error.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_record_is_discarded() {
        let store = Arc::new(InMemoryKeyValueStore::new());
        store.put("slot", b"{not json".to_vec()).await.unwrap();

        let saver = Autosaver::new(store.clone(), "slot");
        assert!(saver.load::<Vec<u32>>().await.is_none());
        assert!(store.get("slot").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_failure_is_recorded_not_raised() {
        let saver = Autosaver::new(Arc::new(FullDisk), "slot");

        assert!(!saver.save(1, &vec![1u32]).await);
        assert!(!saver.save(2, &vec![2u32]).await);

        let status = saver.status().await;
        assert!(status.last_saved.is_none());
        assert_eq!(status.failed_writes, 2);
        assert!(status.last_error.unwrap().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_out_of_order_save_keeps_newer_snapshot() {
        let saver = Autosaver::new(Arc::new(InMemoryKeyValueStore::new()), "slot");

        assert!(saver.save(2, &vec![1u32, 2]).await);
        assert!(!saver.save(1, &vec![1u32]).await);
        assert_eq!(saver.load::<Vec<u32>>().await.unwrap().data, vec![1, 2]);

        // A periodic rewrite of the same revision is fine.
        assert!(saver.save(2, &vec![1u32, 2]).await);
    }

    #[tokio::test]
    async fn test_concurrent_saves_never_regress() {
        let saver = Arc::new(Autosaver::new(Arc::new(InMemoryKeyValueStore::new()), "slot"));

        let handles: Vec<_> = (1..=20u64)
            .rev()
            .map(|revision| {
                let saver = saver.clone();
                tokio::spawn(async move { saver.save(revision, &vec![revision]).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let record = saver.load::<Vec<u64>>().await.unwrap();
        assert_eq!(record.data, vec![20]);
    }

    #[tokio::test]
    async fn test_restart_sequence_accepts_lower_revisions() {
        let saver = Autosaver::new(Arc::new(InMemoryKeyValueStore::new()), "slot");
        assert!(saver.save(9, &vec![9u32]).await);

        saver.restart_sequence().await;
        assert!(saver.save(1, &vec![1u32]).await);
        assert_eq!(saver.load::<Vec<u32>>().await.unwrap().data, vec![1]);
    }

    #[tokio::test]
    async fn test_periodic_task_writes_current_snapshot() {
        let store = Arc::new(InMemoryKeyValueStore::new());
        let saver = Arc::new(Autosaver::new(store.clone(), "slot"));
        let history = Arc::new(Mutex::new(HistoryManager::new(vec![0u32], 10)));

        let handle = saver.clone().spawn_periodic(history.clone(), Duration::from_millis(10));
        history.lock().await.commit(vec![7], "set", ActionType::Update);
        tokio::time::sleep(Duration::from_millis(80)).await;
        handle.abort();

        let record = saver.load::<Vec<u32>>().await.unwrap();
        assert_eq!(record.data, vec![7]);
    }
}
