//! Challenge progress aggregator.
//!
//! Progress is derived from the activity log, never incremented, so computing it
//! twice over the same log yields the same value. Everything here is pure: callers
//! load the enrollment and the activity rows and pass the current time.
//!
//! Calendar semantics ("today", per-day buckets) follow the timezone of `now`.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Serialize, Serializer};

use crate::models::activity::{ActivityRow, HYDRATION};
use crate::models::challenge::{ChallengeDuration, TrackingKind};

// ────────────────────────────────────────────────────────────────────────────
// Output
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProgressDetails {
    #[serde(rename_all = "camelCase")]
    Hydration {
        total_glasses: i64,
        #[serde(serialize_with = "serialize_target")]
        target_glasses: f64,
        days_tracked: i64,
        total_days: i64,
    },
    #[serde(rename_all = "camelCase")]
    Steps {
        completed_days: i64,
        #[serde(serialize_with = "serialize_target")]
        target_days: f64,
    },
    #[serde(rename_all = "camelCase")]
    ActivityCount {
        completed_activities: i64,
        #[serde(serialize_with = "serialize_target")]
        target_activities: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChallengeProgress {
    /// Always within 0..=100.
    pub progress: i32,
    pub details: ProgressDetails,
}

/// Whole-number targets render as JSON integers (`8`, not `8.0`).
fn serialize_target<S: Serializer>(target: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if target.fract() == 0.0 && target.abs() < i64::MAX as f64 {
        serializer.serialize_i64(*target as i64)
    } else {
        serializer.serialize_f64(*target)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Core
// ────────────────────────────────────────────────────────────────────────────

/// `min(100, round(count / target * 100))`, never negative.
/// A non-positive (or non-finite) target counts as already met.
pub fn percent(count: f64, target: f64) -> i32 {
    if !target.is_finite() || target <= 0.0 {
        return 100;
    }
    (count / target * 100.0).clamp(0.0, 100.0).round() as i32
}

/// Earliest `completed_at` the aggregator may need for this enrollment.
/// Hydration looks at whole calendar days, so it starts at local midnight of the
/// enrollment's first day; other kinds start at the enrollment instant.
pub fn window_start<Tz: TimeZone>(
    kind: TrackingKind,
    started_at: DateTime<Utc>,
    now: &DateTime<Tz>,
) -> DateTime<Utc> {
    match kind {
        TrackingKind::Hydration => {
            let tz = now.timezone();
            let first_day = started_at.with_timezone(&tz).date_naive();
            let today = now.date_naive();
            let day = first_day.min(today);
            local_midnight(&tz, day).unwrap_or(started_at)
        }
        TrackingKind::Steps | TrackingKind::ActivityCount => started_at,
    }
}

/// First instant of `day` in `tz`; `None` only if the zone skips midnight entirely.
pub fn local_midnight<Tz: TimeZone>(tz: &Tz, day: NaiveDate) -> Option<DateTime<Utc>> {
    let midnight = day.and_hms_opt(0, 0, 0)?;
    tz.from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Computes progress for one enrollment.
///
/// `activities` may contain any of the user's rows; each mode selects the ones it
/// counts. Rows dated after the end of today are ignored.
pub fn compute_progress<Tz: TimeZone>(
    kind: TrackingKind,
    target: f64,
    started_at: DateTime<Utc>,
    activities: &[ActivityRow],
    now: &DateTime<Tz>,
) -> ChallengeProgress {
    let tz = now.timezone();
    let today = now.date_naive();
    let local_date = |a: &ActivityRow| a.completed_at.with_timezone(&tz).date_naive();

    match kind {
        TrackingKind::Hydration => {
            let first_day = started_at.with_timezone(&tz).date_naive();

            let mut per_day: BTreeMap<NaiveDate, i64> = BTreeMap::new();
            let mut today_glasses = 0_i64;
            for activity in activities.iter().filter(|a| a.activity_type == HYDRATION) {
                let date = local_date(activity);
                let glasses = activity.glasses();
                if date == today {
                    today_glasses = today_glasses.saturating_add(glasses);
                }
                if date >= first_day && date <= today {
                    let day = per_day.entry(date).or_default();
                    *day = day.saturating_add(glasses);
                }
            }

            let days_tracked = per_day
                .values()
                .filter(|glasses| **glasses as f64 >= target)
                .count() as i64;

            ChallengeProgress {
                progress: percent(today_glasses as f64, target),
                details: ProgressDetails::Hydration {
                    total_glasses: today_glasses,
                    target_glasses: target,
                    days_tracked,
                    total_days: total_days(first_day, today),
                },
            }
        }
        TrackingKind::Steps => {
            let count = activities
                .iter()
                .filter(|&a| a.completed_at >= started_at && local_date(a) <= today)
                .filter(|a| a.is_walk_or_step())
                .count() as i64;

            ChallengeProgress {
                progress: percent(count as f64, target),
                details: ProgressDetails::Steps {
                    completed_days: count,
                    target_days: target,
                },
            }
        }
        TrackingKind::ActivityCount => {
            let count = activities
                .iter()
                .filter(|&a| a.completed_at >= started_at && local_date(a) <= today)
                .count() as i64;

            ChallengeProgress {
                progress: percent(count as f64, target),
                details: ProgressDetails::ActivityCount {
                    completed_activities: count,
                    target_activities: target,
                },
            }
        }
    }
}

/// Inclusive calendar-day span; an enrollment started today spans 1 day.
pub fn total_days(first_day: NaiveDate, today: NaiveDate) -> i64 {
    ((today - first_day).num_days() + 1).max(1)
}

/// Whether a freshly computed progress finishes the enrollment.
///
/// Hydration progress resets every day, so a hydration challenge completes once
/// the goal has been met on as many days as its duration class spans.
pub fn is_complete(duration: ChallengeDuration, result: &ChallengeProgress) -> bool {
    match result.details {
        ProgressDetails::Hydration { days_tracked, .. } => days_tracked >= duration.days(),
        ProgressDetails::Steps { .. } | ProgressDetails::ActivityCount { .. } => {
            result.progress >= 100
        }
    }
}
