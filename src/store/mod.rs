pub mod autosave;
pub mod history;
pub mod kv;
pub mod pattern;
pub mod persistent;

pub use autosave::{AutosaveRecord, AutosaveStatus, Autosaver};
pub use history::{ActionType, HistoryEntry, HistoryEntrySummary, HistoryManager};
pub use kv::{FileKeyValueStore, InMemoryKeyValueStore, KeyValueStore};
pub use pattern::{PatternEvent, PatternStore};

#[cfg(feature = "rocksdb-storage")]
pub use persistent::{open_db, RocksKeyValueStore};
