pub mod skills;

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::config::MatchConfig;
use crate::model::requirement::{
    AutoAssignment, ShiftSkillRequirement, SkillBreakdown, SkillMatchResult, SkillWeights,
};
use crate::model::shift::Shift;
use crate::model::staff::{QualificationType, StaffId, StaffMember};
use crate::model::time::windows_overlap;

use skills::derive_skill_levels;

/// Score used when a requirement carries no weighted skills.
const NEUTRAL_SCORE: f64 = 50.0;

/// Largest weight a preferred skill can carry; heavier weights are clamped.
pub const MAX_SKILL_WEIGHT: u32 = 100;

// ---------------------------------------------------------------------------
// SkillMatchEngine: score, rank and auto-assign staff
// ---------------------------------------------------------------------------

/// Ranks staff against shift requirements.
///
/// Scoring is deterministic: identical inputs always produce identical
/// rankings, and ties keep the order of the candidate pool.
#[derive(Debug, Clone, Default)]
pub struct SkillMatchEngine {
    config: MatchConfig,
}

impl SkillMatchEngine {
    pub fn new(config: MatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Score one staff member against one requirement.
    pub fn score(
        &self,
        staff: &StaffMember,
        requirement: &ShiftSkillRequirement,
        skill_weights: &SkillWeights,
    ) -> SkillMatchResult {
        let levels = derive_skill_levels(staff, requirement.date);
        let held: HashSet<QualificationType> = staff.qualifications_on(requirement.date).collect();

        let mut meets_mandatory = requirement
            .required_qualifications
            .iter()
            .all(|q| held.contains(q));

        let mut breakdown = Vec::with_capacity(requirement.preferred_skills.len());
        let mut total_weight: u64 = 0;
        let mut weighted_sum = 0.0;

        for skill in &requirement.preferred_skills {
            let weight = skill_weights
                .get(&skill.skill_name)
                .copied()
                .unwrap_or(skill.weight)
                .min(MAX_SKILL_WEIGHT);
            let required_level = skill.minimum_level.clamp(1, 5);
            let staff_level = levels.get(&skill.skill_name).copied().unwrap_or(0);
            let contribution = skill_contribution(staff_level, required_level);

            if skill.is_mandatory && staff_level < required_level {
                meets_mandatory = false;
            }

            total_weight += u64::from(weight);
            weighted_sum += contribution * f64::from(weight);
            breakdown.push(SkillBreakdown {
                skill_name: skill.skill_name.clone(),
                staff_level,
                required_level,
                weight,
                contribution,
            });
        }

        let normalized = if total_weight == 0 {
            NEUTRAL_SCORE
        } else {
            weighted_sum / total_weight as f64
        };

        let mut match_score = normalized.round().clamp(0.0, 100.0) as u8;
        if !meets_mandatory {
            match_score = match_score.min(self.config.mandatory_failure_cap);
        }

        SkillMatchResult {
            staff_id: staff.id.clone(),
            staff_name: staff.name.clone(),
            match_score,
            meets_mandatory,
            breakdown,
        }
    }

    /// Rank every staff member free for the requirement's time window.
    pub fn rank_staff_for_shift(
        &self,
        staff: &[StaffMember],
        requirement: &ShiftSkillRequirement,
        skill_weights: &SkillWeights,
        existing_shifts: &[Shift],
    ) -> Vec<SkillMatchResult> {
        self.rank_candidates(staff.iter(), requirement, skill_weights, existing_shifts)
    }

    fn rank_candidates<'a>(
        &self,
        candidates: impl Iterator<Item = &'a StaffMember>,
        requirement: &ShiftSkillRequirement,
        skill_weights: &SkillWeights,
        existing_shifts: &[Shift],
    ) -> Vec<SkillMatchResult> {
        let busy = booked_staff(requirement, existing_shifts);

        let mut results: Vec<SkillMatchResult> = candidates
            .filter(|member| !busy.contains(member.id.as_str()))
            .map(|member| self.score(member, requirement, skill_weights))
            .collect();

        sort_ranked(&mut results);
        results
    }

    /// Greedy bulk assignment in requirement order.
    ///
    /// A staff member assigned by this run is not offered again on the same
    /// day. A shift whose best candidate misses a mandatory requirement or the
    /// score threshold is left out of the result and stays open.
    pub fn auto_match_all_shifts(
        &self,
        staff: &[StaffMember],
        requirements: &[ShiftSkillRequirement],
        skill_weights: &SkillWeights,
        existing_shifts: &[Shift],
    ) -> Vec<AutoAssignment> {
        let mut assigned_by_day: HashMap<NaiveDate, HashSet<StaffId>> = HashMap::new();
        let mut assignments = Vec::new();

        for requirement in requirements {
            let taken = assigned_by_day.get(&requirement.date);
            let pool = staff
                .iter()
                .filter(|member| taken.map_or(true, |ids| !ids.contains(&member.id)));

            let ranked = self.rank_candidates(pool, requirement, skill_weights, existing_shifts);

            match ranked.into_iter().next() {
                Some(top)
                    if top.meets_mandatory
                        && top.match_score >= self.config.auto_assign_threshold =>
                {
                    assigned_by_day
                        .entry(requirement.date)
                        .or_default()
                        .insert(top.staff_id.clone());
                    assignments.push(AutoAssignment {
                        shift_id: requirement.shift_id,
                        staff_id: top.staff_id,
                        staff_name: top.staff_name,
                        match_score: top.match_score,
                    });
                }
                Some(top) => {
                    tracing::debug!(
                        shift = %requirement.shift_id,
                        best = %top.staff_id,
                        score = top.match_score,
                        meets_mandatory = top.meets_mandatory,
                        "no candidate cleared the auto-assign bar"
                    );
                }
                None => {
                    tracing::debug!(shift = %requirement.shift_id, "no free candidates");
                }
            }
        }

        tracing::info!(
            requested = requirements.len(),
            assigned = assignments.len(),
            "auto-match finished"
        );
        assignments
    }
}

/// Contribution (0-100) of one skill given staff and required levels.
pub fn skill_contribution(staff_level: u8, required_level: u8) -> f64 {
    if staff_level == 0 {
        0.0
    } else if staff_level >= required_level {
        (70.0 + f64::from(staff_level - required_level) * 10.0).min(100.0)
    } else {
        f64::from(staff_level) / f64::from(required_level) * 50.0
    }
}

/// Qualified candidates first, then by descending score. Stable for ties.
pub fn sort_ranked(results: &mut [SkillMatchResult]) {
    results.sort_by(|a, b| {
        b.meets_mandatory
            .cmp(&a.meets_mandatory)
            .then(b.match_score.cmp(&a.match_score))
    });
}

/// Shift ids from `requirements` that received no assignment.
pub fn unassigned_shifts(
    requirements: &[ShiftSkillRequirement],
    assignments: &[AutoAssignment],
) -> Vec<Uuid> {
    let assigned: HashSet<Uuid> = assignments.iter().map(|a| a.shift_id).collect();
    requirements
        .iter()
        .map(|r| r.shift_id)
        .filter(|id| !assigned.contains(id))
        .collect()
}

/// Staff already working a shift that overlaps the requirement on its date.
fn booked_staff<'a>(requirement: &ShiftSkillRequirement, existing_shifts: &'a [Shift]) -> HashSet<&'a str> {
    existing_shifts
        .iter()
        .filter(|shift| shift.id != requirement.shift_id && shift.date == requirement.date)
        .filter(|shift| {
            windows_overlap(
                shift.start_time,
                shift.end_time,
                requirement.start_time,
                requirement.end_time,
            )
        })
        .filter_map(|shift| shift.staff_id.as_deref())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
