use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::model::staff::{QualificationType, StaffId};
use crate::model::time::hhmm;

/// Caller-supplied weight overrides, keyed by skill name.
pub type SkillWeights = HashMap<String, u32>;

// ---------------------------------------------------------------------------
// Requirements: what a shift needs
// ---------------------------------------------------------------------------

/// A weighted preferred skill on a shift requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillRequirement {
    pub skill_name: String,
    /// Level 1-5 the staff member should reach.
    pub minimum_level: u8,
    /// Relative importance, 0-100.
    pub weight: u32,
    #[serde(default)]
    pub is_mandatory: bool,
}

impl SkillRequirement {
    pub fn preferred(skill_name: impl Into<String>, minimum_level: u8, weight: u32) -> Self {
        Self {
            skill_name: skill_name.into(),
            minimum_level,
            weight,
            is_mandatory: false,
        }
    }

    pub fn mandatory(skill_name: impl Into<String>, minimum_level: u8, weight: u32) -> Self {
        Self {
            is_mandatory: true,
            ..Self::preferred(skill_name, minimum_level, weight)
        }
    }
}

/// Staffing requirement for one shift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftSkillRequirement {
    pub shift_id: Uuid,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub required_qualifications: Vec<QualificationType>,
    #[serde(default)]
    pub preferred_skills: Vec<SkillRequirement>,
}

// ---------------------------------------------------------------------------
// Results: how a candidate measures up
// ---------------------------------------------------------------------------

/// Per-skill explanation of a match score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillBreakdown {
    pub skill_name: String,
    pub staff_level: u8,
    pub required_level: u8,
    pub weight: u32,
    pub contribution: f64,
}

/// Score of one candidate against one requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillMatchResult {
    pub staff_id: StaffId,
    pub staff_name: String,
    /// 0-100.
    pub match_score: u8,
    pub meets_mandatory: bool,
    pub breakdown: Vec<SkillBreakdown>,
}

/// An automatic assignment produced by bulk matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoAssignment {
    pub shift_id: Uuid,
    pub staff_id: StaffId,
    pub staff_name: String,
    pub match_score: u8,
}
