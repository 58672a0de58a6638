//! RocksDB-backed key-value store for autosave records.

use async_trait::async_trait;
use rocksdb::DB;
use std::sync::Arc;

use crate::error::{RosterError, RosterResult};
use crate::store::kv::KeyValueStore;

use super::CF_AUTOSAVE;

#[derive(Clone)]
pub struct RocksKeyValueStore {
    db: Arc<DB>,
}

impl RocksKeyValueStore {
    pub fn new(db: Arc<DB>) -> Self {
        Self { db }
    }

    fn cf_autosave(&self) -> RosterResult<Arc<rocksdb::BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(CF_AUTOSAVE)
            .ok_or_else(|| RosterError::Storage("Missing autosave column family".to_string()))
    }
}

#[async_trait]
impl KeyValueStore for RocksKeyValueStore {
    async fn get(&self, key: &str) -> RosterResult<Option<Vec<u8>>> {
        let cf = self.cf_autosave()?;
        self.db
            .get_cf(&cf, key.as_bytes())
            .map_err(|e| RosterError::Storage(format!("Failed to read '{}': {}", key, e)))
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> RosterResult<()> {
        let cf = self.cf_autosave()?;
        self.db
            .put_cf(&cf, key.as_bytes(), value)
            .map_err(|e| RosterError::Storage(format!("Failed to write '{}': {}", key, e)))
    }

    async fn delete(&self, key: &str) -> RosterResult<()> {
        let cf = self.cf_autosave()?;
        self.db
            .delete_cf(&cf, key.as_bytes())
            .map_err(|e| RosterError::Storage(format!("Failed to delete '{}': {}", key, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::persistent::open_db;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = TempDir::new().unwrap();

        {
            let store = RocksKeyValueStore::new(open_db(dir.path()).unwrap());
            store.put("roster-autosave", b"{\"data\":[]}".to_vec()).await.unwrap();
        }

        let store = RocksKeyValueStore::new(open_db(dir.path()).unwrap());
        assert_eq!(
            store.get("roster-autosave").await.unwrap(),
            Some(b"{\"data\":[]}".to_vec())
        );
        store.delete("roster-autosave").await.unwrap();
        assert!(store.get("roster-autosave").await.unwrap().is_none());
    }
}
