use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::model::staff::{QualificationType, StaffId};
use crate::model::time::hhmm;

// ---------------------------------------------------------------------------
// RecurringShiftPattern: definition data for generated shifts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceKind {
    Daily,
    Weekly,
    Fortnightly,
    Monthly,
}

/// What every occurrence of a pattern looks like.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftTemplate {
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    #[serde(default)]
    pub role: Option<String>,
    pub centre_id: String,
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub required_qualifications: Vec<QualificationType>,
    #[serde(default)]
    pub break_minutes: u32,
}

/// A recurring shift definition. Retired patterns are deactivated, not deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringShiftPattern {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub recurrence: RecurrenceKind,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// Weekdays with Sunday = 0.
    #[serde(default)]
    pub days_of_week: BTreeSet<u8>,
    /// Week cadence for fortnightly patterns, anchored to `start_date`.
    #[serde(default = "default_week_interval")]
    pub week_interval: u32,
    pub shift_template: ShiftTemplate,
    #[serde(default)]
    pub staff_id: Option<StaffId>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_week_interval() -> u32 {
    2
}

fn default_active() -> bool {
    true
}

impl RecurringShiftPattern {
    /// Create an active weekly pattern with no days selected yet.
    pub fn new(name: impl Into<String>, start_date: NaiveDate, shift_template: ShiftTemplate) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            recurrence: RecurrenceKind::Weekly,
            start_date,
            end_date: None,
            days_of_week: BTreeSet::new(),
            week_interval: default_week_interval(),
            shift_template,
            staff_id: None,
            is_active: true,
            updated_at: Utc::now(),
        }
    }

    pub fn with_recurrence(mut self, recurrence: RecurrenceKind) -> Self {
        self.recurrence = recurrence;
        self
    }

    /// Select weekdays (Sunday = 0). Values above 6 are ignored.
    pub fn on_days(mut self, days: impl IntoIterator<Item = u8>) -> Self {
        self.days_of_week = days.into_iter().filter(|d| *d <= 6).collect();
        self
    }

    pub fn with_week_interval(mut self, week_interval: u32) -> Self {
        self.week_interval = week_interval;
        self
    }

    pub fn with_staff(mut self, staff_id: impl Into<StaffId>) -> Self {
        self.staff_id = Some(staff_id.into());
        self
    }

    pub fn with_end_date(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    /// Whether `date` falls within the pattern's validity range.
    pub fn covers(&self, date: NaiveDate) -> bool {
        date >= self.start_date && self.end_date.map_or(true, |end| date <= end)
    }
}
