//! Schedule calculation and quiet-hours suppression
//!
//! Resolves an absolute fire time from a base time plus either an absolute
//! execute time or a relative delay, then applies the quiet-hours check.
//! A fire time landing inside the window is suppressed outright for this
//! evaluation, not deferred to the window's end.

use campaign_core::models::QuietHours;
use chrono::{DateTime, Duration, Local, Timelike, Utc};

/// How the fire time is specified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleTime {
    /// Absolute execute time
    At(DateTime<Utc>),
    /// Delay relative to the base time, in seconds
    DelaySeconds(u32),
}

/// Result of resolving a fire time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Resolved(DateTime<Utc>),
    /// The resolved local hour fell inside the quiet-hours window
    SuppressedQuietHours(DateTime<Utc>),
}

/// Resolve a fire time and apply the quiet-hours window
pub fn resolve_execute_time(
    base: DateTime<Utc>,
    time: ScheduleTime,
    quiet_hours: Option<QuietHours>,
) -> ScheduleOutcome {
    let execute_at = match time {
        ScheduleTime::At(at) => at,
        ScheduleTime::DelaySeconds(delay) => base + Duration::seconds(i64::from(delay)),
    };

    let local_hour = execute_at.with_timezone(&Local).hour();
    match quiet_hours {
        Some(window) if hour_in_quiet_window(local_hour, window) => {
            tracing::debug!(
                execute_at = %execute_at,
                local_hour = local_hour,
                start_hour = window.start_hour,
                end_hour = window.end_hour,
                "Execute time falls in quiet hours, suppressing"
            );
            ScheduleOutcome::SuppressedQuietHours(execute_at)
        }
        _ => ScheduleOutcome::Resolved(execute_at),
    }
}

/// Whether a local wall-clock hour falls inside the window
///
/// The window is half-open on the end hour: `{start: 22, end: 7}` covers
/// hours 22, 23, 0..=6 and wraps around midnight because start > end.
pub fn hour_in_quiet_window(hour: u32, window: QuietHours) -> bool {
    if window.start_hour == window.end_hour {
        // Degenerate window: suppress nothing
        return false;
    }
    if window.start_hour < window.end_hour {
        hour >= window.start_hour && hour < window.end_hour
    } else {
        hour >= window.start_hour || hour < window.end_hour
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window(start_hour: u32, end_hour: u32) -> QuietHours {
        QuietHours { start_hour, end_hour }
    }

    #[test]
    fn test_delay_resolves_relative_to_base() {
        let base = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let outcome = resolve_execute_time(base, ScheduleTime::DelaySeconds(3600), None);
        assert_eq!(
            outcome,
            ScheduleOutcome::Resolved(Utc.with_ymd_and_hms(2026, 3, 10, 13, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_absolute_time_passes_through() {
        let base = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let at = Utc.with_ymd_and_hms(2026, 4, 1, 9, 30, 0).unwrap();
        assert_eq!(
            resolve_execute_time(base, ScheduleTime::At(at), None),
            ScheduleOutcome::Resolved(at)
        );
    }

    #[test]
    fn test_wrapping_window_covers_late_night_and_early_morning() {
        let w = window(22, 7);
        assert!(hour_in_quiet_window(23, w));
        assert!(hour_in_quiet_window(3, w));
        assert!(hour_in_quiet_window(22, w));
        assert!(!hour_in_quiet_window(7, w));
        assert!(!hour_in_quiet_window(10, w));
    }

    #[test]
    fn test_non_wrapping_window() {
        let w = window(9, 17);
        assert!(hour_in_quiet_window(9, w));
        assert!(hour_in_quiet_window(16, w));
        assert!(!hour_in_quiet_window(17, w));
        assert!(!hour_in_quiet_window(8, w));
    }

    #[test]
    fn test_equal_start_and_end_suppresses_nothing() {
        let w = window(8, 8);
        for hour in 0..24 {
            assert!(!hour_in_quiet_window(hour, w));
        }
    }
}
