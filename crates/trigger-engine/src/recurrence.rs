//! Recurrence-date computation
//!
//! Computes the next valid occurrence of an hourly/daily/weekly rule given
//! an anchor, a lower bound to resume from, and an optional end. All math is
//! pure chrono arithmetic over UTC instants; weeks start on Monday.

use campaign_core::models::{Recurrence, RecurrenceFrequency, TimeOfDay, Weekday};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};

/// Compute the next occurrence at or after `lower_bound` and at or after the
/// anchor, or `None` if no such occurrence exists before `end_at`
pub fn next_occurrence(
    rule: &Recurrence,
    anchor: DateTime<Utc>,
    lower_bound: DateTime<Utc>,
    end_at: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    let anchor = truncate_to_minute(anchor);
    let candidate = match rule.frequency {
        RecurrenceFrequency::Hourly => next_hourly(rule, anchor, lower_bound),
        RecurrenceFrequency::Daily => next_daily(rule, anchor, lower_bound),
        RecurrenceFrequency::Weekly => next_weekly(rule, anchor, lower_bound),
    }?;

    match end_at {
        Some(end) if candidate >= end => None,
        _ => Some(candidate),
    }
}

/// Anchor to seed occurrence math when neither `start_at` nor a persisted
/// anchor exists: "now", with the rule's time-of-day applied when configured
pub fn default_anchor(rule: &Recurrence, now: DateTime<Utc>) -> DateTime<Utc> {
    let base = truncate_to_minute(now);
    match rule.time_of_day {
        Some(tod) => at_time_of_day(base.date_naive(), Some(tod), base),
        None => base,
    }
}

/// Lower bound to resume from: one minute past the last scheduled
/// occurrence, or `now` if the campaign never scheduled
pub fn resume_bound(last_scheduled_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match last_scheduled_at {
        Some(last) => last + Duration::minutes(1),
        None => now,
    }
}

/// Step from the anchor in `interval`-hour increments, ceiling-dividing to
/// the first step at or after the lower bound
fn next_hourly(rule: &Recurrence, anchor: DateTime<Utc>, lower_bound: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let step_seconds = i64::from(rule.interval).checked_mul(3600)?;
    if lower_bound <= anchor {
        return Some(anchor);
    }
    let elapsed = (lower_bound - anchor).num_seconds();
    let steps = ceil_div(elapsed, step_seconds);
    Some(anchor + Duration::seconds(steps * step_seconds))
}

/// Same pattern in day increments, anchored to the rule's time-of-day (or
/// the anchor's own time-of-day when unset)
fn next_daily(rule: &Recurrence, anchor: DateTime<Utc>, lower_bound: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let base = at_time_of_day(anchor.date_naive(), rule.time_of_day, anchor);
    let target = lower_bound.max(anchor);
    let interval = i64::from(rule.interval);

    let day_gap = (target.date_naive() - base.date_naive()).num_days().max(0);
    let steps = ceil_div(day_gap, interval);
    let mut candidate = base + Duration::days(steps * interval);
    // The aligned day can still carry a time-of-day earlier than the target
    if candidate < target {
        candidate += Duration::days(interval);
    }
    Some(candidate)
}

/// Restrict candidates to the configured weekday set inside the
/// `interval`-aligned week, advancing one interval (at most once) when the
/// aligned week has no qualifying candidate
fn next_weekly(rule: &Recurrence, anchor: DateTime<Utc>, lower_bound: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let target = lower_bound.max(anchor);
    let interval = i64::from(rule.interval);

    let weekdays: Vec<u32> = match &rule.weekdays {
        Some(days) if !days.is_empty() => days.iter().map(Weekday::days_from_monday).collect(),
        _ => vec![anchor.weekday().num_days_from_monday()],
    };

    let anchor_week = week_start(anchor.date_naive());
    let target_week = week_start(target.date_naive());
    let weeks_elapsed = (target_week - anchor_week).num_days() / 7;
    let aligned_week = anchor_week + Duration::days((weeks_elapsed - weeks_elapsed.rem_euclid(interval)) * 7);

    for attempt in 0..2 {
        let week = aligned_week + Duration::days(attempt * interval * 7);
        let best = weekdays
            .iter()
            .map(|&offset| {
                at_time_of_day(week + Duration::days(i64::from(offset)), rule.time_of_day, anchor)
            })
            .filter(|&candidate| candidate >= target)
            .min();
        if let Some(candidate) = best {
            return Some(candidate);
        }
    }
    None
}

/// Monday of the week containing `date`
fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Build an instant on `date` at the rule's time-of-day, falling back to the
/// anchor's wall-clock time
fn at_time_of_day(date: NaiveDate, tod: Option<TimeOfDay>, anchor: DateTime<Utc>) -> DateTime<Utc> {
    let (hour, minute) = match tod {
        Some(t) => (t.hour, t.minute),
        None => (anchor.hour(), anchor.minute()),
    };
    // Hour/minute are range-checked by the validator
    let naive = date.and_hms_opt(hour, minute, 0).unwrap_or_else(|| {
        date.and_hms_opt(0, 0, 0).expect("midnight is always valid")
    });
    Utc.from_utc_datetime(&naive)
}

fn truncate_to_minute(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant - Duration::seconds(i64::from(instant.second()))
        - Duration::nanoseconds(i64::from(instant.nanosecond()))
}

fn ceil_div(numerator: i64, denominator: i64) -> i64 {
    (numerator + denominator - 1) / denominator
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn rule(frequency: RecurrenceFrequency, interval: u32) -> Recurrence {
        Recurrence { frequency, interval, time_of_day: None, weekdays: None }
    }

    fn tod(hour: u32, minute: u32) -> Option<TimeOfDay> {
        Some(TimeOfDay { hour, minute })
    }

    // ========================================================================
    // hourly
    // ========================================================================

    #[test]
    fn test_hourly_before_anchor_yields_anchor() {
        let r = rule(RecurrenceFrequency::Hourly, 2);
        let next = next_occurrence(&r, utc(2026, 3, 10, 12, 0), utc(2026, 3, 10, 9, 0), None);
        assert_eq!(next, Some(utc(2026, 3, 10, 12, 0)));
    }

    #[test]
    fn test_hourly_ceils_to_next_step() {
        let r = rule(RecurrenceFrequency::Hourly, 3);
        // Steps from 08:00: 08, 11, 14 — bound 09:30 lands on 11:00
        let next = next_occurrence(&r, utc(2026, 3, 10, 8, 0), utc(2026, 3, 10, 9, 30), None);
        assert_eq!(next, Some(utc(2026, 3, 10, 11, 0)));
    }

    #[test]
    fn test_hourly_exact_step_is_kept() {
        let r = rule(RecurrenceFrequency::Hourly, 3);
        let next = next_occurrence(&r, utc(2026, 3, 10, 8, 0), utc(2026, 3, 10, 11, 0), None);
        assert_eq!(next, Some(utc(2026, 3, 10, 11, 0)));
    }

    #[test]
    fn test_hourly_respects_end_at() {
        let r = rule(RecurrenceFrequency::Hourly, 3);
        let next = next_occurrence(
            &r,
            utc(2026, 3, 10, 8, 0),
            utc(2026, 3, 10, 9, 30),
            Some(utc(2026, 3, 10, 11, 0)),
        );
        assert_eq!(next, None);
    }

    // ========================================================================
    // daily
    // ========================================================================

    #[test]
    fn test_daily_uses_time_of_day() {
        let mut r = rule(RecurrenceFrequency::Daily, 1);
        r.time_of_day = tod(9, 30);
        // Bound is past today's 09:30, so tomorrow qualifies
        let next = next_occurrence(&r, utc(2026, 3, 10, 9, 30), utc(2026, 3, 10, 10, 0), None);
        assert_eq!(next, Some(utc(2026, 3, 11, 9, 30)));
    }

    #[test]
    fn test_daily_same_day_when_time_still_ahead() {
        let mut r = rule(RecurrenceFrequency::Daily, 1);
        r.time_of_day = tod(18, 0);
        let next = next_occurrence(&r, utc(2026, 3, 10, 18, 0), utc(2026, 3, 10, 10, 0), None);
        assert_eq!(next, Some(utc(2026, 3, 10, 18, 0)));
    }

    #[test]
    fn test_daily_interval_steps_from_anchor() {
        let r = rule(RecurrenceFrequency::Daily, 3);
        // Anchor Mar 1 08:00; steps: Mar 1, 4, 7, 10... bound Mar 8 lands Mar 10
        let next = next_occurrence(&r, utc(2026, 3, 1, 8, 0), utc(2026, 3, 8, 0, 0), None);
        assert_eq!(next, Some(utc(2026, 3, 10, 8, 0)));
    }

    #[test]
    fn test_daily_inherits_anchor_time_without_time_of_day() {
        let r = rule(RecurrenceFrequency::Daily, 1);
        let next = next_occurrence(&r, utc(2026, 3, 10, 14, 45), utc(2026, 3, 11, 0, 0), None);
        assert_eq!(next, Some(utc(2026, 3, 11, 14, 45)));
    }

    // ========================================================================
    // weekly
    // ========================================================================

    #[test]
    fn test_weekly_picks_earliest_configured_weekday() {
        let mut r = rule(RecurrenceFrequency::Weekly, 1);
        r.weekdays = Some(vec![Weekday::Wednesday, Weekday::Friday]);
        r.time_of_day = tod(9, 0);
        // 2026-03-10 is a Tuesday; Wednesday the 11th qualifies first
        let next = next_occurrence(&r, utc(2026, 3, 10, 9, 0), utc(2026, 3, 10, 12, 0), None);
        assert_eq!(next, Some(utc(2026, 3, 11, 9, 0)));
    }

    #[test]
    fn test_weekly_rolls_to_next_week_when_days_passed() {
        let mut r = rule(RecurrenceFrequency::Weekly, 1);
        r.weekdays = Some(vec![Weekday::Monday]);
        r.time_of_day = tod(9, 0);
        // Tuesday bound: this week's Monday already passed
        let next = next_occurrence(&r, utc(2026, 3, 2, 9, 0), utc(2026, 3, 10, 12, 0), None);
        assert_eq!(next, Some(utc(2026, 3, 16, 9, 0)));
    }

    #[test]
    fn test_weekly_biweekly_alignment() {
        let mut r = rule(RecurrenceFrequency::Weekly, 2);
        r.weekdays = Some(vec![Weekday::Monday]);
        r.time_of_day = tod(9, 0);
        // Anchor week of Mar 2 (Mon). Aligned weeks: Mar 2, Mar 16, Mar 30.
        // A bound in the week of Mar 9 aligns back to Mar 2's week, whose
        // Monday has passed, so the next interval week gives Mar 16.
        let next = next_occurrence(&r, utc(2026, 3, 2, 9, 0), utc(2026, 3, 11, 0, 0), None);
        assert_eq!(next, Some(utc(2026, 3, 16, 9, 0)));

        // A bound inside an aligned week with the weekday still ahead
        let next = next_occurrence(&r, utc(2026, 3, 2, 9, 0), utc(2026, 3, 15, 0, 0), None);
        assert_eq!(next, Some(utc(2026, 3, 16, 9, 0)));
    }

    #[test]
    fn test_weekly_defaults_to_anchor_weekday() {
        let r = rule(RecurrenceFrequency::Weekly, 1);
        // Anchor Tuesday 2026-03-10 14:00, bound right after: next Tuesday
        let next = next_occurrence(&r, utc(2026, 3, 10, 14, 0), utc(2026, 3, 10, 15, 0), None);
        assert_eq!(next, Some(utc(2026, 3, 17, 14, 0)));
    }

    #[test]
    fn test_weekly_candidate_never_before_anchor() {
        let mut r = rule(RecurrenceFrequency::Weekly, 1);
        r.weekdays = Some(vec![Weekday::Monday]);
        r.time_of_day = tod(9, 0);
        // Bound before the anchor: the anchor week's Monday (Mar 9) is
        // before the Tuesday anchor, so Mar 16 is the first occurrence
        let next = next_occurrence(&r, utc(2026, 3, 10, 9, 0), utc(2026, 3, 1, 0, 0), None);
        assert_eq!(next, Some(utc(2026, 3, 16, 9, 0)));
    }

    #[test]
    fn test_weekly_end_at_exhausts() {
        let mut r = rule(RecurrenceFrequency::Weekly, 1);
        r.weekdays = Some(vec![Weekday::Friday]);
        r.time_of_day = tod(9, 0);
        let next = next_occurrence(
            &r,
            utc(2026, 3, 10, 9, 0),
            utc(2026, 3, 12, 0, 0),
            Some(utc(2026, 3, 13, 0, 0)),
        );
        assert_eq!(next, None);
    }

    // ========================================================================
    // anchors and bounds
    // ========================================================================

    #[test]
    fn test_default_anchor_applies_time_of_day() {
        let mut r = rule(RecurrenceFrequency::Daily, 1);
        r.time_of_day = tod(7, 15);
        let anchor = default_anchor(&r, utc(2026, 3, 10, 13, 42));
        assert_eq!(anchor, utc(2026, 3, 10, 7, 15));
    }

    #[test]
    fn test_default_anchor_without_time_of_day_is_now() {
        let r = rule(RecurrenceFrequency::Hourly, 1);
        let anchor = default_anchor(&r, utc(2026, 3, 10, 13, 42));
        assert_eq!(anchor, utc(2026, 3, 10, 13, 42));
    }

    #[test]
    fn test_resume_bound_is_one_minute_past_last() {
        let bound = resume_bound(Some(utc(2026, 3, 10, 9, 0)), utc(2026, 3, 10, 12, 0));
        assert_eq!(bound, utc(2026, 3, 10, 9, 1));

        let bound = resume_bound(None, utc(2026, 3, 10, 12, 0));
        assert_eq!(bound, utc(2026, 3, 10, 12, 0));
    }

    #[test]
    fn test_next_after_last_scheduled_is_strictly_later() {
        let mut r = rule(RecurrenceFrequency::Daily, 1);
        r.time_of_day = tod(9, 0);
        let last = utc(2026, 3, 10, 9, 0);
        let bound = resume_bound(Some(last), utc(2026, 3, 10, 9, 0));
        let next = next_occurrence(&r, utc(2026, 3, 1, 9, 0), bound, None).unwrap();
        assert!(next > last);
        assert_eq!(next, utc(2026, 3, 11, 9, 0));
    }
}
