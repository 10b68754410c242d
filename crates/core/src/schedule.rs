//! Visibility schedule evaluation.
//!
//! [evaluate] is a pure function from a [ScheduleState] and an instant to
//! the [Visibility] whoever publishes presence should aim for.
//! [ScheduleCache] keeps the configured schedules per group.

use chrono::{Datelike, NaiveTime};
use rendezvous_api::*;

mod cache;
pub use cache::*;

/// Evaluate a schedule at `now`.
///
/// Recurring schedules are [Visibility::Visible] or [Visibility::Hidden].
/// Incomplete recurring schedules are hidden. One-shot schedules that
/// lack a duration or an activation time are [Visibility::Unknown].
pub fn evaluate(
    state: &ScheduleState,
    now: chrono::DateTime<chrono::Utc>,
) -> Visibility {
    if state.is_recurring() {
        in_recurring_window(state, now).into()
    } else {
        match (state.display_duration_hours, state.last_activated_utc) {
            (Some(hours), Some(activated)) => {
                let ends_at =
                    activated + chrono::TimeDelta::hours(hours as i64);
                (now <= ends_at).into()
            }
            _ => Visibility::Unknown,
        }
    }
}

fn in_recurring_window(
    state: &ScheduleState,
    now: chrono::DateTime<chrono::Utc>,
) -> bool {
    let weekdays = match &state.active_weekdays {
        Some(w) if !w.is_empty() => w,
        _ => return false,
    };

    let (start, end) = match (
        parse_local_time(state.time_start_local.as_deref()),
        parse_local_time(state.time_end_local.as_deref()),
    ) {
        (Some(start), Some(end)) => (start, end),
        _ => return false,
    };

    if start == end {
        return false;
    }

    let zone = resolve_time_zone(state.time_zone.as_deref());
    let local = now.with_timezone(&zone);
    let weekday = local.weekday();
    let active = |d: chrono::Weekday| {
        weekdays.contains(&(d.num_days_from_monday() as u8))
    };
    let time = local.time();

    if start < end {
        active(weekday) && start <= time && time < end
    } else {
        // a window spanning midnight belongs to the day it starts on
        (time >= start && active(weekday))
            || (time < end && active(weekday.pred()))
    }
}

/// Parse `HH:MM` or `HH:MM:SS`.
fn parse_local_time(s: Option<&str>) -> Option<NaiveTime> {
    let s = s?.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

/// Unrecognized or missing zones fall back to utc.
fn resolve_time_zone(tz: Option<&str>) -> chrono_tz::Tz {
    match tz.map(str::trim).filter(|tz| !tz.is_empty()) {
        None => chrono_tz::UTC,
        Some(tz) => tz.parse().unwrap_or_else(|_| {
            tracing::debug!(tz, "unrecognized time zone, using utc");
            chrono_tz::UTC
        }),
    }
}
