use chrono::{DateTime, TimeZone, Utc};

/// Streak after logging an activity at `now`, given the previous activity day.
///
/// Calendar days in `now`'s timezone: same day keeps the streak (at least 1),
/// the following day extends it, any longer gap starts over at 1.
pub fn next_streak<Tz: TimeZone>(
    current: i32,
    last_active: Option<DateTime<Utc>>,
    now: &DateTime<Tz>,
) -> i32 {
    let Some(last) = last_active else {
        return 1;
    };

    let today = now.date_naive();
    let last_day = last.with_timezone(&now.timezone()).date_naive();

    match (today - last_day).num_days() {
        d if d <= 0 => current.max(1),
        1 => current.max(0) + 1,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset};

    fn now() -> DateTime<FixedOffset> {
        FixedOffset::west_opt(5 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 6, 2, 0, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_first_activity_starts_streak() {
        assert_eq!(next_streak(0, None, &now()), 1);
    }

    #[test]
    fn test_same_day_keeps_streak() {
        let earlier_today = now().with_timezone(&Utc) - Duration::minutes(20);
        assert_eq!(next_streak(4, Some(earlier_today), &now()), 4);
        assert_eq!(next_streak(0, Some(earlier_today), &now()), 1);
    }

    #[test]
    fn test_previous_calendar_day_extends_streak() {
        // 40 minutes earlier is yesterday in local time, though under 24h ago.
        let late_yesterday = now().with_timezone(&Utc) - Duration::minutes(40);
        assert_eq!(next_streak(4, Some(late_yesterday), &now()), 5);
    }

    #[test]
    fn test_gap_resets_streak() {
        let two_days_ago = now().with_timezone(&Utc) - Duration::days(2);
        assert_eq!(next_streak(9, Some(two_days_ago), &now()), 1);
    }
}
