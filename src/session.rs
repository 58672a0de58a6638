//! The roster edit surface.
//!
//! Every mutation resolves the next shift list from the visible one, commits it
//! as exactly one history entry and then autosaves the new snapshot outside the
//! history lock.

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{RosterError, RosterResult};
use crate::matching::{unassigned_shifts, SkillMatchEngine};
use crate::model::pattern::RecurringShiftPattern;
use crate::model::requirement::{AutoAssignment, ShiftSkillRequirement, SkillMatchResult, SkillWeights};
use crate::model::shift::{requirement_for_shift, Shift};
use crate::model::staff::{StaffId, StaffMember};
use crate::schedule::{generate_bulk_shifts_from_patterns, PatternGenerationCount};
use crate::store::autosave::{AutosaveStatus, Autosaver};
use crate::store::history::{ActionType, HistoryEntrySummary, HistoryManager};

pub type RosterHistory = HistoryManager<Vec<Shift>>;

/// Staff pool and weight overrides used to auto-staff generated shifts.
#[derive(Debug, Clone, Copy)]
pub struct AutoStaffing<'a> {
    pub staff: &'a [StaffMember],
    pub skill_weights: &'a SkillWeights,
}

/// Outcome of a bulk generation, shown in the confirmation toast.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationReport {
    pub summary: Vec<PatternGenerationCount>,
    pub created: usize,
    pub assignments: Vec<AutoAssignment>,
    /// Generated open shifts that auto-staffing could not fill.
    pub unassigned: Vec<Uuid>,
    pub committed: bool,
}

/// History panel state.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryView {
    pub entries: Vec<HistoryEntrySummary>,
    pub current_index: usize,
    pub can_undo: bool,
    pub can_redo: bool,
    pub revision: u64,
}

// ---------------------------------------------------------------------------
// RosterSession
// ---------------------------------------------------------------------------

pub struct RosterSession {
    history: Arc<Mutex<RosterHistory>>,
    autosaver: Option<Arc<Autosaver>>,
    engine: SkillMatchEngine,
}

impl RosterSession {
    pub fn new(initial: Vec<Shift>, max_history: usize, engine: SkillMatchEngine) -> Self {
        Self {
            history: Arc::new(Mutex::new(HistoryManager::new(initial, max_history))),
            autosaver: None,
            engine,
        }
    }

    pub fn with_autosaver(mut self, autosaver: Arc<Autosaver>) -> Self {
        self.autosaver = Some(autosaver);
        self
    }

    /// Start a session, restoring the last autosaved roster when there is one.
    pub async fn open(config: &AppConfig, autosaver: Option<Arc<Autosaver>>) -> Self {
        let mut initial = Vec::new();
        if let Some(saver) = &autosaver {
            if let Some(record) = saver.load::<Vec<Shift>>().await {
                tracing::info!(
                    shifts = record.data.len(),
                    saved_at = %record.timestamp,
                    "restored roster from autosave"
                );
                initial = record.data;
            }
        }

        if let Some(saver) = &autosaver {
            saver.restart_sequence().await;
        }

        let session = Self::new(
            initial,
            config.history.max_history,
            SkillMatchEngine::new(config.matching.clone()),
        );
        match autosaver {
            Some(saver) => session.with_autosaver(saver),
            None => session,
        }
    }

    pub fn engine(&self) -> &SkillMatchEngine {
        &self.engine
    }

    /// Shared handle to the history log.
    pub fn history_handle(&self) -> Arc<Mutex<RosterHistory>> {
        Arc::clone(&self.history)
    }

    /// Start the periodic autosave task, if autosave is configured.
    pub fn spawn_autosave(&self, period: std::time::Duration) -> Option<JoinHandle<()>> {
        self.autosaver
            .as_ref()
            .map(|saver| Arc::clone(saver).spawn_periodic(self.history_handle(), period))
    }

    // -----------------------------------------------------------------------
    // Internal commit / navigation plumbing
    // -----------------------------------------------------------------------

    async fn apply<F>(&self, description: String, action: ActionType, update: F) -> RosterResult<bool>
    where
        F: FnOnce(&[Shift]) -> RosterResult<Vec<Shift>>,
    {
        let (revision, snapshot) = {
            let mut history = self.history.lock().await;
            let next = update(history.current())?;
            if !history.commit(next, description, action) {
                return Ok(false);
            }
            (history.revision(), history.current_snapshot())
        };
        self.persist(revision, snapshot).await;
        Ok(true)
    }

    async fn navigate<F>(&self, step: F) -> bool
    where
        F: FnOnce(&mut RosterHistory) -> bool,
    {
        let (revision, snapshot) = {
            let mut history = self.history.lock().await;
            let before = history.revision();
            if !step(&mut history) || history.revision() == before {
                return false;
            }
            (history.revision(), history.current_snapshot())
        };
        self.persist(revision, snapshot).await;
        true
    }

    /// Autosave the snapshot visible at `revision`. A save that lands after a
    /// newer one is dropped by the saver.
    async fn persist(&self, revision: u64, snapshot: Arc<Vec<Shift>>) {
        if let Some(saver) = &self.autosaver {
            saver.save(revision, snapshot.as_ref()).await;
        }
    }

    // -----------------------------------------------------------------------
    // Manual edits
    // -----------------------------------------------------------------------

    /// Commit a caller-built roster as one entry.
    pub async fn commit(&self, shifts: Vec<Shift>, description: impl Into<String>, action: ActionType) -> bool {
        self.apply(description.into(), action, |_| Ok(shifts))
            .await
            .unwrap_or(false)
    }

    pub async fn add_shift(&self, shift: Shift) -> RosterResult<bool> {
        check_times(shift.start_time, shift.end_time)?;
        let description = format!("Added shift on {}", shift.date);
        self.apply(description, ActionType::Add, |current| {
            let mut next = current.to_vec();
            next.push(shift);
            Ok(next)
        })
        .await
    }

    /// Replace the shift with the same id.
    pub async fn update_shift(&self, shift: Shift) -> RosterResult<bool> {
        check_times(shift.start_time, shift.end_time)?;
        let description = format!("Updated shift on {}", shift.date);
        self.apply(description, ActionType::Update, |current| {
            let mut next = current.to_vec();
            let slot = find_mut(&mut next, shift.id)?;
            *slot = shift;
            Ok(next)
        })
        .await
    }

    pub async fn delete_shift(&self, shift_id: Uuid) -> RosterResult<bool> {
        self.apply("Deleted shift".to_string(), ActionType::Delete, |current| {
            if !current.iter().any(|s| s.id == shift_id) {
                return Err(RosterError::ShiftNotFound(shift_id));
            }
            Ok(current.iter().filter(|s| s.id != shift_id).cloned().collect())
        })
        .await
    }

    /// Drag a shift to another day and staff row. `None` drops it on the open-shift row.
    pub async fn move_shift(
        &self,
        shift_id: Uuid,
        date: NaiveDate,
        staff_id: Option<StaffId>,
    ) -> RosterResult<bool> {
        let description = format!("Moved shift to {date}");
        self.apply(description, ActionType::Move, |current| {
            let mut next = current.to_vec();
            let slot = find_mut(&mut next, shift_id)?;
            slot.date = date;
            slot.staff_id = staff_id;
            Ok(next)
        })
        .await
    }

    pub async fn resize_shift(
        &self,
        shift_id: Uuid,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> RosterResult<bool> {
        check_times(start_time, end_time)?;
        let description = format!(
            "Resized shift to {}-{}",
            start_time.format("%H:%M"),
            end_time.format("%H:%M")
        );
        self.apply(description, ActionType::Resize, |current| {
            let mut next = current.to_vec();
            let slot = find_mut(&mut next, shift_id)?;
            slot.start_time = start_time;
            slot.end_time = end_time;
            Ok(next)
        })
        .await
    }

    /// Copy the seven days starting at `from_week` onto the week starting at `to_week`.
    ///
    /// Copies get fresh ids. A copy is skipped when the target day already has
    /// a shift for the same staff, centre and start time.
    pub async fn copy_week(&self, from_week: NaiveDate, to_week: NaiveDate) -> RosterResult<bool> {
        let offset = to_week - from_week;
        let week_end = from_week + Duration::days(7);
        let description = format!("Copied week of {from_week} to {to_week}");

        self.apply(description, ActionType::Copy, |current| {
            let taken: HashSet<_> = current
                .iter()
                .map(|s| (s.date, s.start_time, s.staff_id.clone(), s.centre_id.clone()))
                .collect();

            let copies: Vec<Shift> = current
                .iter()
                .filter(|s| s.date >= from_week && s.date < week_end)
                .map(|s| Shift {
                    id: Uuid::new_v4(),
                    date: s.date + offset,
                    ..s.clone()
                })
                .filter(|s| !taken.contains(&(s.date, s.start_time, s.staff_id.clone(), s.centre_id.clone())))
                .collect();

            let mut next = current.to_vec();
            next.extend(copies);
            Ok(next)
        })
        .await
    }

    // -----------------------------------------------------------------------
    // Bulk generation and auto-staffing
    // -----------------------------------------------------------------------

    /// Expand the active patterns over the window and commit the result as one entry.
    ///
    /// With `auto_staff`, open occurrences are offered to the matching engine
    /// before the commit, so generation and staffing undo together.
    pub async fn generate_from_patterns(
        &self,
        patterns: &[RecurringShiftPattern],
        window_start: NaiveDate,
        weeks: u32,
        auto_staff: Option<AutoStaffing<'_>>,
    ) -> GenerationReport {
        let mut report = GenerationReport::default();

        let (revision, snapshot) = {
            let mut history = self.history.lock().await;
            let existing = history.current();
            let generation = generate_bulk_shifts_from_patterns(patterns, window_start, weeks, existing);
            report.summary = generation.summary;

            let mut requirements: Vec<ShiftSkillRequirement> = Vec::new();
            let mut created: Vec<Shift> = Vec::with_capacity(generation.shifts.len());
            for generated in generation.shifts {
                let required = generated.required_qualifications.clone();
                let shift = generated.into_shift();
                if shift.is_open() {
                    requirements.push(requirement_for_shift(&shift, required));
                }
                created.push(shift);
            }
            report.created = created.len();

            if let Some(auto) = auto_staff {
                // Occurrences staffed by their pattern count as bookings too.
                let mut booked = existing.to_vec();
                booked.extend(created.iter().filter(|s| !s.is_open()).cloned());
                let assignments = self.engine.auto_match_all_shifts(
                    auto.staff,
                    &requirements,
                    auto.skill_weights,
                    &booked,
                );
                assign(&mut created, &assignments);
                report.unassigned = unassigned_shifts(&requirements, &assignments);
                report.assignments = assignments;
            }

            if created.is_empty() {
                return report;
            }

            let pattern_count = report.summary.iter().filter(|c| c.count > 0).count();
            let mut next = existing.to_vec();
            next.extend(created);
            let description = format!(
                "Generated {} shifts from {} patterns",
                report.created, pattern_count
            );
            report.committed = history.commit(next, description, ActionType::Bulk);
            (history.revision(), history.current_snapshot())
        };

        tracing::info!(
            created = report.created,
            assigned = report.assignments.len(),
            unassigned = report.unassigned.len(),
            "bulk generation committed"
        );
        self.persist(revision, snapshot).await;
        report
    }

    /// Rank staff for a requirement against the visible roster.
    pub async fn rank_for_shift(
        &self,
        staff: &[StaffMember],
        requirement: &ShiftSkillRequirement,
        skill_weights: &SkillWeights,
    ) -> Vec<SkillMatchResult> {
        let shifts = self.shifts().await;
        self.engine
            .rank_staff_for_shift(staff, requirement, skill_weights, &shifts)
    }

    /// Auto-match the given requirements against the visible roster and apply
    /// the result as one entry.
    ///
    /// Matching and the commit happen under one history lock, so the overlap
    /// check sees exactly the roster the assignments are written into.
    pub async fn auto_staff(
        &self,
        staff: &[StaffMember],
        requirements: &[ShiftSkillRequirement],
        skill_weights: &SkillWeights,
    ) -> (Vec<AutoAssignment>, Vec<Uuid>) {
        let (assignments, saved) = {
            let mut history = self.history.lock().await;
            let current = history.current();
            let assignments = self
                .engine
                .auto_match_all_shifts(staff, requirements, skill_weights, current);

            if assignments.is_empty() {
                return (assignments, unassigned_shifts(requirements, &[]));
            }

            let mut next = current.to_vec();
            assign(&mut next, &assignments);
            let description = format!("Auto-assigned {} shifts", assignments.len());
            let saved = history
                .commit(next, description, ActionType::Bulk)
                .then(|| (history.revision(), history.current_snapshot()));
            (assignments, saved)
        };

        if let Some((revision, snapshot)) = saved {
            self.persist(revision, snapshot).await;
        }
        let unassigned = unassigned_shifts(requirements, &assignments);
        (assignments, unassigned)
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    pub async fn undo(&self) -> bool {
        self.navigate(|history| history.undo()).await
    }

    pub async fn redo(&self) -> bool {
        self.navigate(|history| history.redo()).await
    }

    pub async fn revert_to_index(&self, index: usize) -> bool {
        self.navigate(|history| history.revert_to_index(index)).await
    }

    pub async fn revert_to_entry(&self, entry_id: Uuid) -> bool {
        self.navigate(|history| history.revert_to_entry(entry_id)).await
    }

    /// Drop all history and start over from `initial`.
    pub async fn reset(&self, initial: Vec<Shift>) {
        self.navigate(|history| {
            history.reset(initial);
            true
        })
        .await;
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn shifts(&self) -> Arc<Vec<Shift>> {
        self.history.lock().await.current_snapshot()
    }

    pub async fn history(&self) -> HistoryView {
        let history = self.history.lock().await;
        HistoryView {
            entries: history.summaries(),
            current_index: history.current_index(),
            can_undo: history.can_undo(),
            can_redo: history.can_redo(),
            revision: history.revision(),
        }
    }

    pub async fn autosave_status(&self) -> Option<AutosaveStatus> {
        match &self.autosaver {
            Some(saver) => Some(saver.status().await),
            None => None,
        }
    }
}

fn find_mut(shifts: &mut [Shift], shift_id: Uuid) -> RosterResult<&mut Shift> {
    shifts
        .iter_mut()
        .find(|s| s.id == shift_id)
        .ok_or(RosterError::ShiftNotFound(shift_id))
}

fn check_times(start: NaiveTime, end: NaiveTime) -> RosterResult<()> {
    if end <= start {
        return Err(RosterError::InvalidShift(format!(
            "end {} is not after start {}",
            end.format("%H:%M"),
            start.format("%H:%M")
        )));
    }
    Ok(())
}

fn assign(shifts: &mut [Shift], assignments: &[AutoAssignment]) {
    for assignment in assignments {
        if let Some(shift) = shifts
            .iter_mut()
            .find(|s| s.id == assignment.shift_id && s.is_open())
        {
            shift.staff_id = Some(assignment.staff_id.clone());
        }
    }
}
