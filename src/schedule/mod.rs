use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

use crate::model::pattern::{RecurrenceKind, RecurringShiftPattern};
use crate::model::shift::{GeneratedShift, Shift};
use crate::model::time::weekday_index;

// ---------------------------------------------------------------------------
// Recurrence expansion: patterns -> dated shift occurrences
// ---------------------------------------------------------------------------

/// Longest window, in weeks, a single expansion covers.
pub const MAX_WEEKS_TO_GENERATE: u32 = 104;

/// Expand one pattern over `weeks_to_generate` weeks starting at `window_start`.
///
/// The window is half-open: `[window_start, window_start + weeks * 7 days)`,
/// with `weeks` capped at [`MAX_WEEKS_TO_GENERATE`].
/// Days that already carry a shift with the same start time are skipped, so
/// feeding the output back in as `existing_shifts` makes a re-run produce
/// nothing. A malformed pattern yields no occurrences.
pub fn expand(
    pattern: &RecurringShiftPattern,
    window_start: NaiveDate,
    weeks_to_generate: u32,
    existing_shifts: &[Shift],
) -> Vec<GeneratedShift> {
    if pattern.days_of_week.is_empty() || weeks_to_generate == 0 {
        return Vec::new();
    }
    if pattern.recurrence == RecurrenceKind::Fortnightly && pattern.week_interval == 0 {
        return Vec::new();
    }

    let occupied: HashSet<(NaiveDate, NaiveTime)> = existing_shifts
        .iter()
        .map(|shift| (shift.date, shift.start_time))
        .collect();

    let template = &pattern.shift_template;
    let total_days = i64::from(weeks_to_generate.min(MAX_WEEKS_TO_GENERATE)) * 7;

    (0..total_days)
        .map_while(|offset| window_start.checked_add_signed(Duration::days(offset)))
        .filter(|day| pattern.covers(*day))
        .filter(|day| pattern.days_of_week.contains(&weekday_index(*day)))
        .filter(|day| recurrence_matches(pattern, *day))
        .filter(|day| !occupied.contains(&(*day, template.start_time)))
        .map(|day| GeneratedShift {
            pattern_id: pattern.id,
            date: day,
            start_time: template.start_time,
            end_time: template.end_time,
            centre_id: template.centre_id.clone(),
            room_id: template.room_id.clone(),
            role: template.role.clone(),
            staff_id: pattern.staff_id.clone(),
            break_minutes: template.break_minutes,
            required_qualifications: template.required_qualifications.clone(),
        })
        .collect()
}

/// Cadence check beyond the weekday filter.
fn recurrence_matches(pattern: &RecurringShiftPattern, day: NaiveDate) -> bool {
    match pattern.recurrence {
        RecurrenceKind::Daily | RecurrenceKind::Weekly => true,
        RecurrenceKind::Fortnightly => {
            // Euclidean division keeps the cadence stable on both sides of the anchor.
            let weeks_since_start = (day - pattern.start_date).num_days().div_euclid(7);
            weeks_since_start.rem_euclid(i64::from(pattern.week_interval)) == 0
        }
        RecurrenceKind::Monthly => week_of_month(day) == week_of_month(pattern.start_date),
    }
}

/// Zero-based ordinal of the weekday within its month (first Monday = 0, ...).
fn week_of_month(date: NaiveDate) -> u32 {
    (date.day() - 1) / 7
}

// ---------------------------------------------------------------------------
// Bulk generation across the pattern set
// ---------------------------------------------------------------------------

/// Number of occurrences one pattern contributed to a bulk run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternGenerationCount {
    pub pattern_id: Uuid,
    pub pattern_name: String,
    pub count: usize,
}

/// Output of a bulk run, shown to the user before it is committed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkGeneration {
    pub shifts: Vec<GeneratedShift>,
    pub summary: Vec<PatternGenerationCount>,
}

impl BulkGeneration {
    pub fn total(&self) -> usize {
        self.shifts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shifts.is_empty()
    }
}

/// Expand every active pattern and concatenate the results in pattern order.
pub fn generate_bulk_shifts_from_patterns<'a>(
    patterns: impl IntoIterator<Item = &'a RecurringShiftPattern>,
    window_start: NaiveDate,
    weeks_to_generate: u32,
    existing_shifts: &[Shift],
) -> BulkGeneration {
    let mut generation = BulkGeneration::default();

    for pattern in patterns.into_iter().filter(|p| p.is_active) {
        let occurrences = expand(pattern, window_start, weeks_to_generate, existing_shifts);
        tracing::debug!(
            pattern = %pattern.id,
            name = %pattern.name,
            count = occurrences.len(),
            "expanded recurring pattern"
        );
        generation.summary.push(PatternGenerationCount {
            pattern_id: pattern.id,
            pattern_name: pattern.name.clone(),
            count: occurrences.len(),
        });
        generation.shifts.extend(occurrences);
    }

    generation
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::pattern::ShiftTemplate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn template() -> ShiftTemplate {
        ShiftTemplate {
            start_time: time(7, 0),
            end_time: time(15, 0),
            role: Some("Educator".to_string()),
            centre_id: "centre-1".to_string(),
            room_id: Some("toddlers".to_string()),
            required_qualifications: Vec::new(),
            break_minutes: 30,
        }
    }

    fn existing_from(generated: &[GeneratedShift]) -> Vec<Shift> {
        generated.iter().cloned().map(GeneratedShift::into_shift).collect()
    }

    #[test]
    fn test_mon_wed_fri_over_two_weeks() {
        // 2024-01-01 is a Monday.
        let pattern = RecurringShiftPattern::new("Early", date(2024, 1, 1), template())
            .on_days([1, 3, 5])
            .with_staff("S1");

        let shifts = expand(&pattern, date(2024, 1, 1), 2, &[]);

        assert_eq!(shifts.len(), 6);
        assert!(shifts.iter().all(|s| s.staff_id.as_deref() == Some("S1")));
        assert!(shifts.iter().all(|s| s.break_minutes == 30));
        assert_eq!(shifts[0].date, date(2024, 1, 1));
        assert_eq!(shifts[5].date, date(2024, 1, 12));
    }

    #[test]
    fn test_expansion_is_idempotent() {
        let pattern = RecurringShiftPattern::new("Early", date(2024, 1, 1), template())
            .on_days([1, 2, 3, 4, 5]);

        let first = expand(&pattern, date(2024, 1, 1), 3, &[]);
        assert_eq!(first.len(), 15);

        let second = expand(&pattern, date(2024, 1, 1), 3, &existing_from(&first));
        assert!(second.is_empty());
    }

    #[test]
    fn test_existing_shift_at_other_time_does_not_block() {
        let pattern = RecurringShiftPattern::new("Early", date(2024, 1, 1), template()).on_days([1]);
        let late = Shift::new(date(2024, 1, 1), time(12, 0), time(18, 0), "centre-1");

        let shifts = expand(&pattern, date(2024, 1, 1), 1, &[late]);
        assert_eq!(shifts.len(), 1);
    }

    #[test]
    fn test_fortnightly_anchored_to_pattern_start() {
        // 2024-01-05 is a Friday.
        let pattern = RecurringShiftPattern::new("Payroll Friday", date(2024, 1, 5), template())
            .with_recurrence(RecurrenceKind::Fortnightly)
            .with_week_interval(2)
            .on_days([5]);

        let from_anchor: Vec<NaiveDate> = expand(&pattern, date(2024, 1, 1), 6, &[])
            .into_iter()
            .map(|s| s.date)
            .collect();
        assert_eq!(from_anchor, vec![date(2024, 1, 5), date(2024, 1, 19), date(2024, 2, 2)]);

        // Shifting the window by one week must not flip which Fridays are on.
        let shifted: Vec<NaiveDate> = expand(&pattern, date(2024, 1, 8), 6, &[])
            .into_iter()
            .map(|s| s.date)
            .collect();
        assert_eq!(shifted, vec![date(2024, 1, 19), date(2024, 2, 2), date(2024, 2, 16)]);
    }

    #[test]
    fn test_monthly_uses_week_of_month_of_start() {
        // 2024-01-09 is the second Tuesday of January.
        let pattern = RecurringShiftPattern::new("Staff meeting", date(2024, 1, 9), template())
            .with_recurrence(RecurrenceKind::Monthly)
            .on_days([2]);

        let dates: Vec<NaiveDate> = expand(&pattern, date(2024, 1, 1), 9, &[])
            .into_iter()
            .map(|s| s.date)
            .collect();
        assert_eq!(dates, vec![date(2024, 1, 9), date(2024, 2, 13)]);
    }

    #[test]
    fn test_pattern_range_clips_window() {
        let pattern = RecurringShiftPattern::new("Short run", date(2024, 1, 3), template())
            .on_days([1, 3, 5])
            .with_end_date(date(2024, 1, 10));

        let dates: Vec<NaiveDate> = expand(&pattern, date(2024, 1, 1), 2, &[])
            .into_iter()
            .map(|s| s.date)
            .collect();
        assert_eq!(dates, vec![date(2024, 1, 3), date(2024, 1, 5), date(2024, 1, 8), date(2024, 1, 10)]);
    }

    #[test]
    fn test_malformed_patterns_yield_nothing() {
        let no_days = RecurringShiftPattern::new("Nothing", date(2024, 1, 1), template());
        assert!(expand(&no_days, date(2024, 1, 1), 4, &[]).is_empty());

        let zero_interval = RecurringShiftPattern::new("Zero", date(2024, 1, 1), template())
            .with_recurrence(RecurrenceKind::Fortnightly)
            .with_week_interval(0)
            .on_days([1]);
        assert!(expand(&zero_interval, date(2024, 1, 1), 4, &[]).is_empty());
    }

    #[test]
    fn test_window_is_capped() {
        let pattern = RecurringShiftPattern::new("Weekly", date(2024, 1, 1), template()).on_days([1]);

        let capped = expand(&pattern, date(2024, 1, 1), u32::MAX, &[]);
        assert_eq!(capped.len(), MAX_WEEKS_TO_GENERATE as usize);
        assert_eq!(capped, expand(&pattern, date(2024, 1, 1), MAX_WEEKS_TO_GENERATE, &[]));
    }

    #[test]
    fn test_window_stops_at_calendar_end() {
        let pattern = RecurringShiftPattern::new("Late", date(2024, 1, 1), template()).on_days([0, 1, 2, 3, 4, 5, 6]);
        let start = NaiveDate::MAX - Duration::days(3);

        let shifts = expand(&pattern, start, 2, &[]);
        assert_eq!(shifts.len(), 4);
        assert_eq!(shifts.last().map(|s| s.date), Some(NaiveDate::MAX));
    }

    #[test]
    fn test_unassigned_pattern_produces_open_shifts() {
        let pattern = RecurringShiftPattern::new("Open", date(2024, 1, 1), template()).on_days([2]);
        let shifts = expand(&pattern, date(2024, 1, 1), 1, &[]);
        assert_eq!(shifts.len(), 1);
        assert!(shifts[0].staff_id.is_none());
        assert!(shifts[0].clone().into_shift().is_open());
    }

    #[test]
    fn test_bulk_skips_inactive_and_counts_per_pattern() {
        let active = RecurringShiftPattern::new("Active", date(2024, 1, 1), template()).on_days([1, 2]);
        let mut retired = RecurringShiftPattern::new("Retired", date(2024, 1, 1), template()).on_days([3]);
        retired.is_active = false;
        let other = RecurringShiftPattern::new("Other", date(2024, 1, 1), template()).on_days([6]);

        let generation =
            generate_bulk_shifts_from_patterns([&active, &retired, &other], date(2024, 1, 1), 1, &[]);

        assert_eq!(generation.total(), 3);
        assert_eq!(generation.summary.len(), 2);
        assert_eq!(generation.summary[0].pattern_name, "Active");
        assert_eq!(generation.summary[0].count, 2);
        assert_eq!(generation.summary[1].count, 1);
    }
}
