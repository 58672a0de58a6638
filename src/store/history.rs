use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// History entries
// ---------------------------------------------------------------------------

/// What kind of edit produced an entry. Used for history iconography and filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Add,
    Delete,
    Update,
    Move,
    Resize,
    Bulk,
    Copy,
    Undo,
    Redo,
    Initial,
}

/// SHA-256 of a snapshot's JSON serialization.
pub type Fingerprint = [u8; 32];

/// One immutable point in the history log.
#[derive(Debug, Clone)]
pub struct HistoryEntry<T> {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action_type: ActionType,
    pub description: String,
    pub snapshot: Arc<T>,
    fingerprint: Option<Fingerprint>,
}

impl<T: Serialize> HistoryEntry<T> {
    fn new(state: T, description: impl Into<String>, action_type: ActionType) -> Self {
        let fingerprint = fingerprint(&state);
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action_type,
            description: description.into(),
            snapshot: Arc::new(state),
            fingerprint,
        }
    }
}

/// Listing row for the history panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntrySummary {
    pub index: usize,
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action_type: ActionType,
    pub description: String,
    pub is_current: bool,
}

fn fingerprint<T: Serialize>(state: &T) -> Option<Fingerprint> {
    let bytes = serde_json::to_vec(state).ok()?;
    Some(Sha256::digest(&bytes).into())
}

// ---------------------------------------------------------------------------
// HistoryManager: bounded linear undo/redo over full snapshots
// ---------------------------------------------------------------------------

/// Undo/redo log over snapshots of `T`.
///
/// The log is never empty and `current_index` always points at the visible
/// state. A commit made anywhere but the tail discards the entries after the
/// cursor; undo, redo and revert only move the cursor.
#[derive(Debug, Clone)]
pub struct HistoryManager<T> {
    entries: Vec<HistoryEntry<T>>,
    current_index: usize,
    max_history: usize,
    revision: u64,
}

impl<T> HistoryManager<T>
where
    T: Clone + PartialEq + Serialize,
{
    /// Start a log holding `initial` as its only entry. `max_history` is at least 1.
    pub fn new(initial: T, max_history: usize) -> Self {
        Self {
            entries: vec![HistoryEntry::new(initial, "Initial state", ActionType::Initial)],
            current_index: 0,
            max_history: max_history.max(1),
            revision: 0,
        }
    }

    /// Record `state` as a new entry unless it equals the current snapshot.
    ///
    /// Returns `true` when an entry was appended.
    pub fn commit(&mut self, state: T, description: impl Into<String>, action_type: ActionType) -> bool {
        let candidate = fingerprint(&state);
        if self.is_unchanged(&state, candidate.as_ref()) {
            tracing::trace!("commit skipped, state unchanged");
            return false;
        }

        let description = description.into();
        self.entries.truncate(self.current_index + 1);
        self.entries.push(HistoryEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action_type,
            description: description.clone(),
            snapshot: Arc::new(state),
            fingerprint: candidate,
        });

        if self.entries.len() > self.max_history {
            let overflow = self.entries.len() - self.max_history;
            self.entries.drain(..overflow);
        }

        self.current_index = self.entries.len() - 1;
        self.revision += 1;
        tracing::info!(
            action = ?action_type,
            %description,
            index = self.current_index,
            "history entry committed"
        );
        true
    }

    /// Derive the next state from the current one and commit it.
    pub fn commit_with<F>(&mut self, update: F, description: impl Into<String>, action_type: ActionType) -> bool
    where
        F: FnOnce(&T) -> T,
    {
        let next = update(self.current());
        self.commit(next, description, action_type)
    }

    /// Step back one entry. Returns `false` at the initial entry.
    pub fn undo(&mut self) -> bool {
        if self.current_index == 0 {
            return false;
        }
        self.current_index -= 1;
        self.revision += 1;
        tracing::debug!(index = self.current_index, "undo");
        true
    }

    /// Step forward one entry. Returns `false` at the tail.
    pub fn redo(&mut self) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.current_index += 1;
        self.revision += 1;
        tracing::debug!(index = self.current_index, "redo");
        true
    }

    /// Move the cursor to `index` without discarding anything.
    /// Out-of-range indices are ignored.
    pub fn revert_to_index(&mut self, index: usize) -> bool {
        if index >= self.entries.len() {
            tracing::debug!(index, len = self.entries.len(), "ignoring out-of-range revert");
            return false;
        }
        if index != self.current_index {
            self.current_index = index;
            self.revision += 1;
        }
        true
    }

    /// Move the cursor to the entry with `entry_id`, if it is still in the log.
    ///
    /// Ids survive resets and front trimming, so a stale UI row cannot land
    /// on the wrong entry.
    pub fn revert_to_entry(&mut self, entry_id: Uuid) -> bool {
        match self.entries.iter().position(|entry| entry.id == entry_id) {
            Some(index) => self.revert_to_index(index),
            None => {
                tracing::debug!(%entry_id, "ignoring revert to unknown entry");
                false
            }
        }
    }

    /// Replace the whole log with a fresh initial entry.
    pub fn reset(&mut self, initial: T) {
        self.entries = vec![HistoryEntry::new(initial, "Initial state", ActionType::Initial)];
        self.current_index = 0;
        self.revision += 1;
        tracing::debug!("history reset");
    }

    fn is_unchanged(&self, state: &T, candidate: Option<&Fingerprint>) -> bool {
        let current = &self.entries[self.current_index];
        match (current.fingerprint.as_ref(), candidate) {
            (Some(a), Some(b)) if a != b => false,
            _ => current.snapshot.as_ref() == state,
        }
    }
}

impl<T> HistoryManager<T> {
    /// The state the user currently sees.
    pub fn current(&self) -> &T {
        &self.entries[self.current_index].snapshot
    }

    /// Shared handle to the current snapshot, cheap to hand to a writer.
    pub fn current_snapshot(&self) -> Arc<T> {
        Arc::clone(&self.entries[self.current_index].snapshot)
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn entries(&self) -> &[HistoryEntry<T>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Increments on every change to the log or the cursor.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn can_undo(&self) -> bool {
        self.current_index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.current_index + 1 < self.entries.len()
    }

    pub fn summaries(&self) -> Vec<HistoryEntrySummary> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| HistoryEntrySummary {
                index,
                id: entry.id,
                timestamp: entry.timestamp,
                action_type: entry.action_type,
                description: entry.description.clone(),
                is_current: index == self.current_index,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> HistoryManager<Vec<u32>> {
        HistoryManager::new(Vec::new(), 50)
    }

    #[test]
    fn test_commit_undo_then_commit_prunes_redo_branch() {
        let mut history = manager();
        assert_eq!(history.len(), 1);
        assert_eq!(history.current_index(), 0);

        history.commit(vec![1], "add 1", ActionType::Add);
        history.commit(vec![1, 2], "add 2", ActionType::Add);
        history.commit(vec![1, 2, 3], "add 3", ActionType::Add);
        assert_eq!(history.current_index(), 3);

        history.undo();
        history.undo();
        assert_eq!(history.current_index(), 1);
        assert_eq!(history.current(), &vec![1]);
        assert!(history.can_redo());

        history.commit(vec![1, 9], "add 9", ActionType::Add);
        assert_eq!(history.len(), 3);
        assert_eq!(history.current_index(), 2);
        assert!(!history.can_redo());
        assert!(history
            .entries()
            .iter()
            .all(|entry| entry.snapshot.as_ref() != &vec![1, 2, 3]));
    }

    #[test]
    fn test_no_op_commit_creates_no_entry() {
        let mut history = manager();
        history.commit(vec![1], "add 1", ActionType::Add);
        let revision = history.revision();

        assert!(!history.commit(vec![1], "add 1 again", ActionType::Add));
        assert!(!history.commit_with(|prev| prev.clone(), "identity", ActionType::Update));
        assert_eq!(history.len(), 2);
        assert_eq!(history.current_index(), 1);
        assert_eq!(history.revision(), revision);
    }

    #[test]
    fn test_bounded_history_evicts_oldest() {
        let max = 10;
        let mut history = HistoryManager::new(vec![0u32], max);

        for i in 1..=(max as u32 + 5) {
            assert!(history.commit(vec![i], format!("set {i}"), ActionType::Update));
        }

        assert_eq!(history.len(), max);
        assert_eq!(history.current_index(), max - 1);
        assert_eq!(history.entries()[0].snapshot.as_ref(), &vec![6]);
        assert_eq!(history.current(), &vec![15]);
    }

    #[test]
    fn test_undo_redo_are_noops_at_the_ends() {
        let mut history = manager();
        assert!(!history.undo());
        assert!(!history.can_undo());

        history.commit(vec![1], "add", ActionType::Add);
        assert!(!history.redo());
        assert!(history.undo());
        assert!(history.redo());
        assert_eq!(history.current(), &vec![1]);
    }

    #[test]
    fn test_revert_keeps_entries_until_next_commit() {
        let mut history = manager();
        for i in 1..=4 {
            history.commit_with(
                |prev| {
                    let mut next = prev.clone();
                    next.push(i);
                    next
                },
                format!("add {i}"),
                ActionType::Add,
            );
        }

        assert!(history.revert_to_index(1));
        assert_eq!(history.len(), 5);
        assert_eq!(history.current(), &vec![1]);

        assert!(!history.revert_to_index(99));
        assert_eq!(history.current_index(), 1);

        history.commit(vec![1, 7], "branch", ActionType::Update);
        assert_eq!(history.len(), 3);
        assert_eq!(history.current_index(), 2);
    }

    #[test]
    fn test_revert_to_entry_ignores_stale_ids() {
        let mut history = manager();
        history.commit(vec![1], "add", ActionType::Add);
        let stale = history.entries()[1].id;
        let initial = history.entries()[0].id;

        assert!(history.revert_to_entry(initial));
        assert_eq!(history.current_index(), 0);

        history.reset(vec![5]);
        assert!(!history.revert_to_entry(stale));
        assert_eq!(history.len(), 1);
        assert_eq!(history.current(), &vec![5]);
        assert_eq!(history.entries()[0].action_type, ActionType::Initial);
    }

    #[test]
    fn test_summaries_mark_current_entry() {
        let mut history = manager();
        history.commit(vec![1], "add 1", ActionType::Add);
        history.commit(vec![2], "move", ActionType::Move);
        history.undo();

        let summaries = history.summaries();
        assert_eq!(summaries.len(), 3);
        assert!(summaries[1].is_current);
        assert_eq!(summaries[2].action_type, ActionType::Move);
        assert_eq!(summaries[2].description, "move");
    }
}
