use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::user::UserRow;

/// Feature vector sent to the prediction endpoints. Field names are the ML
/// service's wire format.
#[derive(Debug, Clone, Serialize)]
pub struct UserFeatures {
    pub user_id: String,
    pub total_activities: i64,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub avg_session_duration: f64,
    pub challenges_enrolled: i64,
    pub challenges_completed: i64,
    pub last_activity_days_ago: i64,
    pub completion_rate: f64,
    pub avg_difficulty: f64,
    pub weekly_frequency: f64,
    pub total_points: i32,
    pub badges_earned: usize,
    pub social_interactions: i64,
    pub preferred_time: String,
    pub goal_progress: f64,
}

/// Raw aggregates pulled from the database for one user.
#[derive(Debug, Clone, Default, FromRow)]
pub struct ActivityAggregates {
    pub total_activities: i64,
    pub avg_duration: Option<f64>,
    pub last_activity: Option<DateTime<Utc>>,
    pub activities_last_28_days: i64,
    pub morning_activities: i64,
    pub evening_activities: i64,
}

#[derive(Debug, Clone, Default, FromRow)]
pub struct ChallengeAggregates {
    pub enrolled: i64,
    pub completed: i64,
    pub avg_difficulty: Option<f64>,
    pub avg_active_progress: Option<f64>,
}

pub async fn load_activity_aggregates(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<ActivityAggregates, sqlx::Error> {
    sqlx::query_as::<_, ActivityAggregates>(
        "SELECT COUNT(*) AS total_activities,
                AVG(duration)::float8 AS avg_duration,
                MAX(completed_at) AS last_activity,
                COUNT(*) FILTER (WHERE completed_at >= NOW() - INTERVAL '28 days') AS activities_last_28_days,
                COUNT(*) FILTER (WHERE EXTRACT(HOUR FROM completed_at) < 12) AS morning_activities,
                COUNT(*) FILTER (WHERE EXTRACT(HOUR FROM completed_at) >= 17) AS evening_activities
         FROM activities WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
}

pub async fn load_challenge_aggregates(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<ChallengeAggregates, sqlx::Error> {
    sqlx::query_as::<_, ChallengeAggregates>(
        "SELECT COUNT(*) AS enrolled,
                COUNT(*) FILTER (WHERE uc.status = 'completed') AS completed,
                AVG(c.difficulty)::float8 AS avg_difficulty,
                (AVG(uc.progress) FILTER (WHERE uc.status = 'active'))::float8 AS avg_active_progress
         FROM user_challenges uc JOIN challenges c ON c.id = uc.challenge_id
         WHERE uc.user_id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
}

pub async fn count_social_interactions(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT (SELECT COUNT(*) FROM social_posts WHERE user_id = $1)
              + (SELECT COUNT(*) FROM post_likes WHERE user_id = $1)
              + (SELECT COUNT(*) FROM post_comments WHERE user_id = $1)",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
}

pub fn build_features(
    user: &UserRow,
    activity: &ActivityAggregates,
    challenges: &ChallengeAggregates,
    social_interactions: i64,
    now: DateTime<Utc>,
) -> UserFeatures {
    let completion_rate = if challenges.enrolled > 0 {
        challenges.completed as f64 / challenges.enrolled as f64
    } else {
        0.0
    };

    let preferred_time = if activity.evening_activities > activity.morning_activities {
        "evening"
    } else {
        "morning"
    };

    UserFeatures {
        user_id: user.id.to_string(),
        total_activities: activity.total_activities,
        current_streak: user.current_streak,
        longest_streak: user.longest_streak,
        avg_session_duration: activity.avg_duration.unwrap_or(0.0),
        challenges_enrolled: challenges.enrolled,
        challenges_completed: challenges.completed,
        last_activity_days_ago: activity
            .last_activity
            .map(|t| (now - t).num_days().max(0))
            .unwrap_or(0),
        completion_rate,
        avg_difficulty: challenges.avg_difficulty.unwrap_or(0.0),
        weekly_frequency: activity.activities_last_28_days as f64 / 4.0,
        total_points: user.total_points,
        badges_earned: user.badges.len(),
        social_interactions,
        preferred_time: preferred_time.to_string(),
        goal_progress: challenges.avg_active_progress.unwrap_or(0.0) / 100.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_build_features_from_aggregates() {
        let now = Utc::now();
        let mut user = UserRow::fixture();
        user.current_streak = 4;
        user.badges = vec!["streak_1".to_string()];

        let activity = ActivityAggregates {
            total_activities: 12,
            avg_duration: Some(32.5),
            last_activity: Some(now - Duration::days(3)),
            activities_last_28_days: 10,
            morning_activities: 2,
            evening_activities: 7,
        };
        let challenges = ChallengeAggregates {
            enrolled: 4,
            completed: 1,
            avg_difficulty: Some(2.5),
            avg_active_progress: Some(60.0),
        };

        let f = build_features(&user, &activity, &challenges, 9, now);
        assert_eq!(f.total_activities, 12);
        assert_eq!(f.current_streak, 4);
        assert_eq!(f.last_activity_days_ago, 3);
        assert!((f.completion_rate - 0.25).abs() < 1e-9);
        assert!((f.weekly_frequency - 2.5).abs() < 1e-9);
        assert!((f.goal_progress - 0.6).abs() < 1e-9);
        assert_eq!(f.badges_earned, 1);
        assert_eq!(f.preferred_time, "evening");
    }

    #[test]
    fn test_build_features_for_new_user() {
        let f = build_features(
            &UserRow::fixture(),
            &ActivityAggregates::default(),
            &ChallengeAggregates::default(),
            0,
            Utc::now(),
        );
        assert_eq!(f.completion_rate, 0.0);
        assert_eq!(f.last_activity_days_ago, 0);
        assert_eq!(f.preferred_time, "morning");
    }
}
