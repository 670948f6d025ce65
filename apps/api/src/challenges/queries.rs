use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::activity::ActivityRow;
use crate::models::challenge::{ChallengeRow, UserChallengeRow};

pub async fn find_challenge(pool: &PgPool, id: Uuid) -> Result<Option<ChallengeRow>, sqlx::Error> {
    sqlx::query_as::<_, ChallengeRow>("SELECT * FROM challenges WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// The caller's active enrollment in `challenge_id` together with the challenge.
pub async fn find_active_enrollment(
    pool: &PgPool,
    user_id: Uuid,
    challenge_id: Uuid,
) -> Result<Option<(UserChallengeRow, ChallengeRow)>, sqlx::Error> {
    let enrollment = sqlx::query_as::<_, UserChallengeRow>(
        "SELECT * FROM user_challenges
         WHERE user_id = $1 AND challenge_id = $2 AND status = 'active'
         ORDER BY started_at DESC LIMIT 1",
    )
    .bind(user_id)
    .bind(challenge_id)
    .fetch_optional(pool)
    .await?;

    let Some(enrollment) = enrollment else {
        return Ok(None);
    };

    Ok(find_challenge(pool, challenge_id)
        .await?
        .map(|challenge| (enrollment, challenge)))
}

/// Activities completed at or after `since`, optionally restricted to one type.
pub async fn activities_since(
    pool: &PgPool,
    user_id: Uuid,
    since: DateTime<Utc>,
    activity_type: Option<&str>,
) -> Result<Vec<ActivityRow>, sqlx::Error> {
    sqlx::query_as::<_, ActivityRow>(
        "SELECT * FROM activities
         WHERE user_id = $1 AND completed_at >= $2 AND ($3::text IS NULL OR activity_type = $3)
         ORDER BY completed_at ASC",
    )
    .bind(user_id)
    .bind(since)
    .bind(activity_type)
    .fetch_all(pool)
    .await
}

/// Ids of challenges the user is enrolled in or has completed.
pub async fn enrolled_challenge_ids(pool: &PgPool, user_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
    sqlx::query_scalar::<_, Uuid>(
        "SELECT challenge_id FROM user_challenges
         WHERE user_id = $1 AND status IN ('active', 'completed')",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}
