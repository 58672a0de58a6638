use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::requirement::ShiftSkillRequirement;
use crate::model::staff::{QualificationType, StaffId};
use crate::model::time::hhmm;

// ---------------------------------------------------------------------------
// Shift: the roster record captured in history snapshots
// ---------------------------------------------------------------------------

/// A concrete rostered shift. An empty `staff_id` marks an open shift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    pub id: Uuid,
    #[serde(default)]
    pub staff_id: Option<StaffId>,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub centre_id: String,
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub break_minutes: u32,
    /// Pattern this shift was generated from, if any.
    #[serde(default)]
    pub pattern_id: Option<Uuid>,
}

impl Shift {
    pub fn new(
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        centre_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            staff_id: None,
            date,
            start_time,
            end_time,
            centre_id: centre_id.into(),
            room_id: None,
            role: None,
            break_minutes: 0,
            pattern_id: None,
        }
    }

    pub fn with_staff(mut self, staff_id: impl Into<StaffId>) -> Self {
        self.staff_id = Some(staff_id.into());
        self
    }

    pub fn with_room(mut self, room_id: impl Into<String>) -> Self {
        self.room_id = Some(room_id.into());
        self
    }

    pub fn with_break(mut self, minutes: u32) -> Self {
        self.break_minutes = minutes;
        self
    }

    pub fn is_open(&self) -> bool {
        self.staff_id.is_none()
    }
}

// ---------------------------------------------------------------------------
// GeneratedShift: ephemeral output of pattern expansion
// ---------------------------------------------------------------------------

/// A shift occurrence implied by a recurring pattern, not yet on the roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedShift {
    pub pattern_id: Uuid,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub centre_id: String,
    pub room_id: Option<String>,
    pub role: Option<String>,
    pub staff_id: Option<StaffId>,
    pub break_minutes: u32,
    pub required_qualifications: Vec<QualificationType>,
}

impl GeneratedShift {
    /// Materialize as a roster shift with a fresh id.
    pub fn into_shift(self) -> Shift {
        Shift {
            id: Uuid::new_v4(),
            staff_id: self.staff_id,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            centre_id: self.centre_id,
            room_id: self.room_id,
            role: self.role,
            break_minutes: self.break_minutes,
            pattern_id: Some(self.pattern_id),
        }
    }
}

/// Build the staffing requirement for an open roster shift.
///
/// Preferred skills are left empty; callers attach them from their ratio rules.
pub fn requirement_for_shift(
    shift: &Shift,
    required_qualifications: Vec<QualificationType>,
) -> ShiftSkillRequirement {
    ShiftSkillRequirement {
        shift_id: shift.id,
        date: shift.date,
        start_time: shift.start_time,
        end_time: shift.end_time,
        room_id: shift.room_id.clone(),
        required_qualifications,
        preferred_skills: Vec::new(),
    }
}
