use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::{RosterError, RosterResult};
use crate::model::pattern::RecurringShiftPattern;

const EVENT_CAPACITY: usize = 64;

/// Change notification sent to pattern store subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "pattern_id", rename_all = "snake_case")]
pub enum PatternEvent {
    Created(Uuid),
    Updated(Uuid),
    Deactivated(Uuid),
}

// ---------------------------------------------------------------------------
// PatternStore: owned set of recurring shift patterns
// ---------------------------------------------------------------------------

/// Holds every recurring pattern in creation order.
///
/// Patterns are never removed; retiring one flips `is_active`. Every change is
/// broadcast to subscribers. Nobody listening is not an error.
pub struct PatternStore {
    patterns: Vec<RecurringShiftPattern>,
    events: broadcast::Sender<PatternEvent>,
}

impl Default for PatternStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            patterns: Vec::new(),
            events,
        }
    }

    /// Build a store seeded with `patterns`. Invalid ones are skipped with a warning.
    pub fn with_patterns(patterns: impl IntoIterator<Item = RecurringShiftPattern>) -> Self {
        let mut store = Self::new();
        for pattern in patterns {
            if let Err(err) = store.create(pattern) {
                tracing::warn!(error = %err, "skipping pattern");
            }
        }
        store
    }

    /// Listen for changes made after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<PatternEvent> {
        self.events.subscribe()
    }

    fn notify(&self, event: PatternEvent) {
        // Err only means there are no receivers right now.
        let _ = self.events.send(event);
    }

    /// Add a new pattern and return its id.
    pub fn create(&mut self, mut pattern: RecurringShiftPattern) -> RosterResult<Uuid> {
        validate(&pattern)?;
        if self.get(pattern.id).is_some() {
            return Err(RosterError::InvalidPattern(format!(
                "pattern {} already exists",
                pattern.id
            )));
        }

        pattern.updated_at = Utc::now();
        let id = pattern.id;
        tracing::info!(pattern_id = %id, name = %pattern.name, "pattern created");
        self.patterns.push(pattern);
        self.notify(PatternEvent::Created(id));
        Ok(id)
    }

    pub fn get(&self, id: Uuid) -> Option<&RecurringShiftPattern> {
        self.patterns.iter().find(|p| p.id == id)
    }

    /// Replace the stored pattern with the same id.
    pub fn update(&mut self, mut pattern: RecurringShiftPattern) -> RosterResult<()> {
        validate(&pattern)?;
        let id = pattern.id;
        let slot = self
            .patterns
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RosterError::PatternNotFound(id))?;

        pattern.updated_at = Utc::now();
        *slot = pattern;
        tracing::info!(pattern_id = %id, "pattern updated");
        self.notify(PatternEvent::Updated(id));
        Ok(())
    }

    /// Retire a pattern. Returns `false` if it was already inactive.
    pub fn deactivate(&mut self, id: Uuid) -> RosterResult<bool> {
        let pattern = self
            .patterns
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RosterError::PatternNotFound(id))?;

        if !pattern.is_active {
            return Ok(false);
        }
        pattern.is_active = false;
        pattern.updated_at = Utc::now();
        tracing::info!(pattern_id = %id, "pattern deactivated");
        self.notify(PatternEvent::Deactivated(id));
        Ok(true)
    }

    pub fn list(&self) -> &[RecurringShiftPattern] {
        &self.patterns
    }

    pub fn active(&self) -> impl Iterator<Item = &RecurringShiftPattern> {
        self.patterns.iter().filter(|p| p.is_active)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn validate(pattern: &RecurringShiftPattern) -> RosterResult<()> {
    if pattern.name.trim().is_empty() {
        return Err(RosterError::InvalidPattern("name must not be empty".to_string()));
    }
    if let Some(end) = pattern.end_date {
        if end < pattern.start_date {
            return Err(RosterError::InvalidPattern(format!(
                "end date {end} is before start date {}",
                pattern.start_date
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::pattern::ShiftTemplate;
    use chrono::{NaiveDate, NaiveTime};

    fn pattern(name: &str) -> RecurringShiftPattern {
        let template = ShiftTemplate {
            start_time: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
            role: None,
            centre_id: "C1".to_string(),
            room_id: None,
            required_qualifications: Vec::new(),
            break_minutes: 30,
        };
        RecurringShiftPattern::new(name, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(), template)
            .on_days([1, 3, 5])
    }

    #[test]
    fn test_create_get_update() {
        let mut store = PatternStore::new();
        let id = store.create(pattern("Early")).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(id).unwrap().name, "Early");

        let mut edited = store.get(id).unwrap().clone();
        edited.name = "Early opener".to_string();
        store.update(edited).unwrap();
        assert_eq!(store.get(id).unwrap().name, "Early opener");

        let duplicate = store.get(id).unwrap().clone();
        assert!(matches!(store.create(duplicate), Err(RosterError::InvalidPattern(_))));
    }

    #[test]
    fn test_update_unknown_pattern_fails() {
        let mut store = PatternStore::new();
        let missing = pattern("Ghost");
        let id = missing.id;
        assert!(matches!(store.update(missing), Err(RosterError::PatternNotFound(got)) if got == id));
        assert!(store.deactivate(id).is_err());
    }

    #[test]
    fn test_rejects_invalid_patterns() {
        let mut store = PatternStore::new();
        assert!(store.create(pattern("  ")).is_err());

        let backwards = pattern("Backwards").with_end_date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert!(store.create(backwards).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_deactivate_keeps_pattern_out_of_active_set() {
        let mut store = PatternStore::new();
        let early = store.create(pattern("Early")).unwrap();
        let late = store.create(pattern("Late")).unwrap();

        assert!(store.deactivate(early).unwrap());
        assert!(!store.deactivate(early).unwrap());

        let active: Vec<Uuid> = store.active().map(|p| p.id).collect();
        assert_eq!(active, vec![late]);
        assert_eq!(store.list().len(), 2);
    }

    #[test]
    fn test_subscribers_receive_changes() {
        let mut store = PatternStore::new();
        let mut events = store.subscribe();

        let id = store.create(pattern("Early")).unwrap();
        let current = store.get(id).unwrap().clone();
        store.update(current).unwrap();
        store.deactivate(id).unwrap();

        assert_eq!(events.try_recv().unwrap(), PatternEvent::Created(id));
        assert_eq!(events.try_recv().unwrap(), PatternEvent::Updated(id));
        assert_eq!(events.try_recv().unwrap(), PatternEvent::Deactivated(id));
        assert!(events.try_recv().is_err());
    }
}
