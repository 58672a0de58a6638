//! Autosave durability tests against the file-backed key-value store.
//!
//! These exercise a full edit / restart / restore cycle on disk, including
//! recovery from a corrupt record and from a store that rejects writes.

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveTime};
    use roster_core::config::AppConfig;
    use roster_core::error::{RosterError, RosterResult};
    use roster_core::model::shift::Shift;
    use roster_core::session::RosterSession;
    use roster_core::store::autosave::Autosaver;
    use roster_core::store::kv::{FileKeyValueStore, KeyValueStore};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    const KEY: &str = "roster-autosave";

    fn shift(day: u32, start: u32) -> Shift {
        Shift::new(
            NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(start + 8, 0, 0).unwrap(),
            "C1",
        )
    }

    async fn file_autosaver(dir: &TempDir) -> (Arc<Autosaver>, Arc<FileKeyValueStore>) {
        let store = Arc::new(FileKeyValueStore::open(dir.path().join("autosave")).await.unwrap());
        let saver = Arc::new(Autosaver::new(store.clone(), KEY));
        (saver, store)
    }

    #[tokio::test]
    async fn test_roster_survives_restart() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::default();

        let kept = shift(4, 7);
        {
            let (saver, _) = file_autosaver(&dir).await;
            let session = RosterSession::open(&config, Some(saver)).await;
            session.add_shift(kept.clone()).await.unwrap();
            session.add_shift(shift(5, 9)).await.unwrap();
            // The visible state is what gets saved, not the log tail.
            assert!(session.undo().await);
        }

        let (saver, _) = file_autosaver(&dir).await;
        let restored = RosterSession::open(&config, Some(saver)).await;
        assert_eq!(restored.shifts().await.as_ref(), &vec![kept]);

        let history = restored.history().await;
        assert_eq!(history.entries.len(), 1);
        assert!(!history.can_undo);
    }

    #[tokio::test]
    async fn test_corrupt_record_starts_empty_and_is_replaced() {
        let dir = TempDir::new().unwrap();
        let (saver, store) = file_autosaver(&dir).await;
        store.put(KEY, b"{\"data\": [trunc".to_vec()).await.unwrap();

        let session = RosterSession::open(&AppConfig::default(), Some(saver.clone())).await;
        assert!(session.shifts().await.is_empty());
        assert!(store.get(KEY).await.unwrap().is_none());

        session.add_shift(shift(6, 7)).await.unwrap();
        let record = saver.load::<Vec<Shift>>().await.unwrap();
        assert_eq!(record.data.len(), 1);
    }

    #[tokio::test]
    async fn test_periodic_autosave_writes_to_disk() {
        let dir = TempDir::new().unwrap();
        let (saver, store) = file_autosaver(&dir).await;
        let session = RosterSession::open(&AppConfig::default(), Some(saver)).await;

        let handle = session.spawn_autosave(Duration::from_millis(10)).unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        handle.abort();

        let bytes = store.get(KEY).await.unwrap().unwrap();
        let record: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(record["data"].as_array().unwrap().is_empty());
        assert!(record["timestamp"].is_string());
    }

    struct ReadOnlyStore;

    #[async_trait]
    impl KeyValueStore for ReadOnlyStore {
        async fn get(&self, _key: &str) -> RosterResult<Option<Vec<u8>>> {
            Ok(None)
        }

        async fn put(&self, _key: &str, _value: Vec<u8>) -> RosterResult<()> {
            Err(RosterError::Storage("read-only filesystem".to_string()))
        }

        async fn delete(&self, _key: &str) -> RosterResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_write_failures_do_not_block_edits() {
        let saver = Arc::new(Autosaver::new(Arc::new(ReadOnlyStore), KEY));
        let session = RosterSession::open(&AppConfig::default(), Some(saver)).await;

        assert!(session.add_shift(shift(4, 7)).await.unwrap());
        assert!(session.undo().await);
        assert!(session.redo().await);
        assert_eq!(session.shifts().await.len(), 1);

        let status = session.autosave_status().await.unwrap();
        assert!(status.last_saved.is_none());
        assert_eq!(status.failed_writes, 3);
        assert!(status.last_error.unwrap().contains("read-only"));
    }
}
