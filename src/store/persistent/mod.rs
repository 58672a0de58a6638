//! Persistent key-value storage using RocksDB.
//!
//! Only available when the `rocksdb-storage` feature is enabled.

#[cfg(feature = "rocksdb-storage")]
pub mod rocks_kv;

#[cfg(feature = "rocksdb-storage")]
pub use rocks_kv::RocksKeyValueStore;

#[cfg(feature = "rocksdb-storage")]
use rocksdb::{Options, DB};
#[cfg(feature = "rocksdb-storage")]
use std::path::Path;
#[cfg(feature = "rocksdb-storage")]
use std::sync::Arc;

#[cfg(feature = "rocksdb-storage")]
use crate::error::{RosterError, RosterResult};

/// Column family holding autosave records.
#[cfg(feature = "rocksdb-storage")]
pub const CF_AUTOSAVE: &str = "autosave";

/// Opens a RocksDB instance with all required column families.
#[cfg(feature = "rocksdb-storage")]
pub fn open_db<P: AsRef<Path>>(path: P) -> RosterResult<Arc<DB>> {
    let mut opts = Options::default();
    opts.create_if_missing(true);
    opts.create_missing_column_families(true);

    let db = DB::open_cf(&opts, path, [CF_AUTOSAVE])
        .map_err(|e| RosterError::Storage(format!("Failed to open RocksDB: {}", e)))?;

    Ok(Arc::new(db))
}
