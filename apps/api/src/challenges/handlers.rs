//! Axum route handlers for challenges, enrollments and progress.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::challenges::progress::{
    compute_progress, is_complete, window_start, ChallengeProgress, ProgressDetails,
};
use crate::challenges::queries::{
    activities_since, enrolled_challenge_ids, find_active_enrollment, find_challenge,
};
use crate::challenges::recommendations::{from_ml_response, recommend, Recommendation, UserSignals};
use crate::errors::AppError;
use crate::gamification::service::award_in;
use crate::ml::MlEndpoint;
use crate::models::activity::HYDRATION;
use crate::models::challenge::{
    ChallengeCategory, ChallengeDuration, ChallengeRow, TrackingKind, UserChallengeRow,
};
use crate::state::AppState;
use crate::users::queries::require_user;

const MAX_LISTED_CHALLENGES: i64 = 50;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListChallengesQuery {
    pub category: Option<String>,
    pub difficulty: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct ChallengesResponse {
    pub success: bool,
    pub challenges: Vec<ChallengeRow>,
}

#[derive(Debug, Deserialize)]
pub struct CriteriaInput {
    #[serde(rename = "type")]
    pub criteria_type: Option<String>,
    pub target: Option<f64>,
    pub metric: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChallengeRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub difficulty: Option<i32>,
    pub duration: Option<ChallengeDuration>,
    pub points: Option<i32>,
    pub tracking: Option<TrackingKind>,
    pub criteria: Option<CriteriaInput>,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChallengeResponse {
    pub success: bool,
    pub challenge: ChallengeRow,
}

/// Body or query carrying a challenge id. Kept as a string so a missing or
/// malformed id is a 400 with a readable message rather than an extractor rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeIdInput {
    pub challenge_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollResponse {
    pub success: bool,
    pub user_challenge: UserChallengeRow,
}

#[derive(Debug, Deserialize)]
pub struct EnrollmentsQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentView {
    #[serde(flatten)]
    pub enrollment: UserChallengeRow,
    pub challenge: ChallengeRow,
}

#[derive(Debug, Serialize)]
pub struct EnrollmentsResponse {
    pub success: bool,
    pub challenges: Vec<EnrollmentView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    pub success: bool,
    pub progress: i32,
    pub details: ProgressDetails,
    pub challenge: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points_earned: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub streak: i32,
    pub top_activity_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationsResponse {
    pub success: bool,
    pub recommendations: Vec<Recommendation>,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_preferences: Option<UserPreferences>,
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

pub fn parse_challenge_id(raw: Option<&str>) -> Result<Uuid, AppError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::validation("Challenge ID is required"))?;
    Uuid::parse_str(raw).map_err(|_| AppError::validation("Invalid challenge ID"))
}

struct NewChallenge {
    title: String,
    description: String,
    category: ChallengeCategory,
    difficulty: i32,
    duration: ChallengeDuration,
    points: i32,
    tracking: TrackingKind,
    criteria_type: String,
    criteria_target: f64,
    criteria_metric: String,
}

fn validate_new_challenge(req: CreateChallengeRequest) -> Result<NewChallenge, AppError> {
    let required = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let (Some(title), Some(description), Some(category)) = (
        required(req.title),
        required(req.description),
        required(req.category),
    ) else {
        return Err(AppError::validation(
            "Title, description, and category are required",
        ));
    };

    let category = ChallengeCategory::parse(&category)
        .ok_or_else(|| AppError::validation(format!("Unknown category '{category}'")))?;

    let difficulty = req.difficulty.unwrap_or(2);
    if !(1..=5).contains(&difficulty) {
        return Err(AppError::validation("Difficulty must be between 1 and 5"));
    }

    let points = req.points.unwrap_or(100);
    if points < 0 {
        return Err(AppError::validation("Points cannot be negative"));
    }

    let criteria = req.criteria.unwrap_or(CriteriaInput {
        criteria_type: None,
        target: None,
        metric: None,
    });
    let criteria_target = criteria.target.unwrap_or(7.0);
    if !criteria_target.is_finite() {
        return Err(AppError::validation("Criteria target must be a number"));
    }

    let tracking = req
        .tracking
        .unwrap_or_else(|| TrackingKind::infer_from_title(&title));

    Ok(NewChallenge {
        title,
        description,
        category,
        difficulty,
        duration: req.duration.unwrap_or_default(),
        points,
        tracking,
        criteria_type: criteria.criteria_type.unwrap_or_else(|| "count".to_string()),
        criteria_target,
        criteria_metric: criteria.metric.unwrap_or_else(|| "activities".to_string()),
    })
}

/// A missing active enrollment, whether never enrolled, completed or for an
/// unknown challenge, is a 404.
pub fn require_active<T>(found: Option<T>) -> Result<T, AppError> {
    found.ok_or_else(|| AppError::not_found("Challenge not found or not active"))
}

/// Loads the enrollment and the activity rows and runs the aggregator.
async fn evaluate(
    state: &AppState,
    user_id: Uuid,
    challenge_id: Uuid,
) -> Result<(UserChallengeRow, ChallengeRow, ChallengeProgress), AppError> {
    let (enrollment, challenge) =
        require_active(find_active_enrollment(&state.db, user_id, challenge_id).await?)?;

    let now = Local::now();
    let kind = challenge.tracking_kind();
    let since = window_start(kind, enrollment.started_at, &now);
    let type_filter = (kind == TrackingKind::Hydration).then_some(HYDRATION);
    let activities = activities_since(&state.db, user_id, since, type_filter).await?;

    let result = compute_progress(
        kind,
        challenge.criteria_target,
        enrollment.started_at,
        &activities,
        &now,
    );

    Ok((enrollment, challenge, result))
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/challenges?category=&difficulty=
pub async fn handle_list_challenges(
    State(state): State<AppState>,
    Query(query): Query<ListChallengesQuery>,
) -> Result<Json<ChallengesResponse>, AppError> {
    let challenges = sqlx::query_as::<_, ChallengeRow>(
        "SELECT * FROM challenges
         WHERE ($1::text IS NULL OR category = $1) AND ($2::int IS NULL OR difficulty = $2)
         ORDER BY created_at DESC LIMIT $3",
    )
    .bind(query.category.as_deref().filter(|c| !c.is_empty()))
    .bind(query.difficulty)
    .bind(MAX_LISTED_CHALLENGES)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(ChallengesResponse {
        success: true,
        challenges,
    }))
}

/// POST /api/challenges
///
/// The tracking kind is fixed here: taken from the request, or inferred once
/// from the title when omitted.
pub async fn handle_create_challenge(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateChallengeRequest>,
) -> Result<(StatusCode, Json<ChallengeResponse>), AppError> {
    let image_url = req.image_url.clone();
    let new = validate_new_challenge(req)?;

    let challenge = sqlx::query_as::<_, ChallengeRow>(
        "INSERT INTO challenges
            (id, title, description, category, tracking, difficulty, points, duration,
             criteria_type, criteria_target, criteria_metric, created_by, image_url)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(&new.title)
    .bind(&new.description)
    .bind(new.category.as_str())
    .bind(new.tracking.as_str())
    .bind(new.difficulty)
    .bind(new.points)
    .bind(new.duration.as_str())
    .bind(&new.criteria_type)
    .bind(new.criteria_target)
    .bind(&new.criteria_metric)
    .bind(user.id.to_string())
    .bind(image_url)
    .fetch_one(&state.db)
    .await?;

    info!(
        "Created challenge {} ({}) tracked as {}",
        challenge.id,
        challenge.title,
        new.tracking.as_str()
    );

    Ok((
        StatusCode::CREATED,
        Json(ChallengeResponse {
            success: true,
            challenge,
        }),
    ))
}

/// POST /api/challenges/enroll
pub async fn handle_enroll(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ChallengeIdInput>,
) -> Result<(StatusCode, Json<EnrollResponse>), AppError> {
    let challenge_id = parse_challenge_id(req.challenge_id.as_deref())?;

    if find_challenge(&state.db, challenge_id).await?.is_none() {
        return Err(AppError::not_found("Challenge not found"));
    }

    let existing: Option<Uuid> = sqlx::query_scalar(
        "SELECT id FROM user_challenges
         WHERE user_id = $1 AND challenge_id = $2 AND status IN ('active', 'completed')
         LIMIT 1",
    )
    .bind(user.id)
    .bind(challenge_id)
    .fetch_optional(&state.db)
    .await?;

    if existing.is_some() {
        return Err(AppError::validation("Already enrolled in this challenge"));
    }

    let user_challenge = sqlx::query_as::<_, UserChallengeRow>(
        "INSERT INTO user_challenges (id, user_id, challenge_id, status, progress, started_at, points_earned)
         VALUES ($1, $2, $3, 'active', 0, NOW(), 0)
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(user.id)
    .bind(challenge_id)
    .fetch_one(&state.db)
    .await?;

    info!("User {} enrolled in challenge {challenge_id}", user.id);

    Ok((
        StatusCode::CREATED,
        Json(EnrollResponse {
            success: true,
            user_challenge,
        }),
    ))
}

/// GET /api/challenges/enroll?status=
pub async fn handle_list_enrollments(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<EnrollmentsQuery>,
) -> Result<Json<EnrollmentsResponse>, AppError> {
    let enrollments = sqlx::query_as::<_, UserChallengeRow>(
        "SELECT * FROM user_challenges
         WHERE user_id = $1 AND ($2::text IS NULL OR status = $2)
         ORDER BY started_at DESC",
    )
    .bind(user.id)
    .bind(query.status.as_deref().filter(|s| !s.is_empty()))
    .fetch_all(&state.db)
    .await?;

    let ids: Vec<Uuid> = enrollments.iter().map(|e| e.challenge_id).collect();
    let challenges: HashMap<Uuid, ChallengeRow> =
        sqlx::query_as::<_, ChallengeRow>("SELECT * FROM challenges WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&state.db)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

    let challenges = enrollments
        .into_iter()
        .filter_map(|enrollment| {
            let challenge = challenges.get(&enrollment.challenge_id)?.clone();
            Some(EnrollmentView {
                enrollment,
                challenge,
            })
        })
        .collect();

    Ok(Json(EnrollmentsResponse {
        success: true,
        challenges,
    }))
}

/// GET /api/challenges/progress?challengeId=<uuid>
///
/// Pure query: computes progress from the activity log and writes nothing.
pub async fn handle_get_progress(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ChallengeIdInput>,
) -> Result<Json<ProgressResponse>, AppError> {
    let challenge_id = parse_challenge_id(query.challenge_id.as_deref())?;
    let (_, challenge, result) = evaluate(&state, user.id, challenge_id).await?;

    Ok(Json(ProgressResponse {
        success: true,
        progress: result.progress,
        details: result.details,
        challenge: challenge.title,
        completed: None,
        points_earned: None,
    }))
}

/// POST /api/challenges/progress
///
/// Recomputes progress, stores it and completes the enrollment when the
/// challenge's goal is met. The `status = 'active'` guard makes completion
/// happen at most once under concurrent calls.
pub async fn handle_update_progress(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ChallengeIdInput>,
) -> Result<Json<ProgressResponse>, AppError> {
    let challenge_id = parse_challenge_id(req.challenge_id.as_deref())?;
    let (enrollment, challenge, result) = evaluate(&state, user.id, challenge_id).await?;
    let completes = is_complete(challenge.duration_class(), &result);

    let mut tx = state.db.begin().await?;

    let updated = if completes {
        sqlx::query(
            "UPDATE user_challenges
             SET progress = $2, status = 'completed', completed_at = NOW(), points_earned = $3,
                 updated_at = NOW()
             WHERE id = $1 AND status = 'active'",
        )
        .bind(enrollment.id)
        .bind(result.progress)
        .bind(challenge.points)
        .execute(&mut *tx)
        .await?
    } else {
        sqlx::query(
            "UPDATE user_challenges SET progress = $2, updated_at = NOW()
             WHERE id = $1 AND status = 'active'",
        )
        .bind(enrollment.id)
        .bind(result.progress)
        .execute(&mut *tx)
        .await?
    };

    let completed = completes && updated.rows_affected() == 1;
    if completed {
        sqlx::query(
            "UPDATE users SET completed_challenges = completed_challenges + 1 WHERE id = $1",
        )
        .bind(user.id)
        .execute(&mut *tx)
        .await?;
        award_in(&mut tx, user.id, challenge.points, HashMap::new()).await?;
    }

    tx.commit().await?;

    if completed {
        info!(
            "User {} completed challenge {} (+{} points)",
            user.id, challenge.id, challenge.points
        );
    }

    Ok(Json(ProgressResponse {
        success: true,
        progress: result.progress,
        details: result.details,
        challenge: challenge.title,
        completed: Some(completed),
        points_earned: Some(if completed { challenge.points } else { 0 }),
    }))
}

/// GET /api/challenges/recommendations
///
/// Top unenrolled active challenges. The ML service is asked first; its answer
/// is used when it names challenges we can offer, otherwise rule-based scoring.
pub async fn handle_recommendations(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<RecommendationsResponse>, AppError> {
    let row = require_user(&state.db, user.id).await?;
    let enrolled = enrolled_challenge_ids(&state.db, user.id).await?;

    let available = sqlx::query_as::<_, ChallengeRow>(
        "SELECT * FROM challenges WHERE active = TRUE AND NOT (id = ANY($1))
         ORDER BY created_at DESC",
    )
    .bind(&enrolled)
    .fetch_all(&state.db)
    .await?;

    if available.is_empty() {
        return Ok(Json(RecommendationsResponse {
            success: true,
            recommendations: vec![],
            method: "none",
            user_preferences: None,
        }));
    }

    let activity_types: HashMap<String, i64> = sqlx::query_as::<_, (String, i64)>(
        "SELECT activity_type, COUNT(*) FROM activities
         WHERE user_id = $1 AND completed_at >= NOW() - INTERVAL '30 days'
         GROUP BY activity_type",
    )
    .bind(user.id)
    .fetch_all(&state.db)
    .await?
    .into_iter()
    .collect();

    let signals = UserSignals {
        current_streak: row.current_streak,
        completed_challenges: row.completed_challenges,
        activity_types,
    };

    let completed = f64::from(row.completed_challenges);
    let profile = json!({
        "user_id": row.id.to_string(),
        "days_active": row.current_streak,
        "meditation_streak": row.current_streak,
        "challenge_completion_rate": if completed > 0.0 { completed / (completed + 5.0) } else { 0.5 },
        "preferred_activity_times": ["morning"],
        "available_challenge_ids": available.iter().map(|c| c.id.to_string()).collect::<Vec<_>>(),
    });

    let ml_picks = match state.ml.call(MlEndpoint::RecommendChallenge, &profile).await {
        Ok(body) => from_ml_response(&available, &body),
        Err(e) => {
            warn!("ML recommendations unavailable, using rule-based fallback: {e}");
            None
        }
    };

    let user_preferences = Some(UserPreferences {
        streak: signals.current_streak,
        top_activity_type: signals.top_activity_type().to_string(),
    });

    let (recommendations, method) = match ml_picks {
        Some(picks) => (picks, "ml"),
        None => (recommend(available, &signals), "rule-based"),
    };

    Ok(Json(RecommendationsResponse {
        success: true,
        recommendations,
        method,
        user_preferences,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn test_missing_enrollment_is_not_found() {
        let err = require_active::<(UserChallengeRow, ChallengeRow)>(None).unwrap_err();
        assert!(matches!(&err, AppError::NotFound(msg) if msg == "Challenge not found or not active"));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);

        assert_eq!(require_active(Some(7)).unwrap(), 7);
    }

    fn request(title: &str) -> CreateChallengeRequest {
        CreateChallengeRequest {
            title: Some(title.to_string()),
            description: Some("Drink up".to_string()),
            category: Some("nutrition".to_string()),
            difficulty: None,
            duration: None,
            points: None,
            tracking: None,
            criteria: None,
            image_url: None,
        }
    }

    #[test]
    fn test_parse_challenge_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_challenge_id(Some(&id.to_string())).unwrap(), id);
        assert!(matches!(
            parse_challenge_id(None),
            Err(AppError::Validation(msg)) if msg == "Challenge ID is required"
        ));
        assert!(matches!(parse_challenge_id(Some("  ")), Err(AppError::Validation(_))));
        assert!(matches!(
            parse_challenge_id(Some("not-a-uuid")),
            Err(AppError::Validation(msg)) if msg == "Invalid challenge ID"
        ));
    }

    #[test]
    fn test_new_challenge_infers_tracking_once() {
        let new = validate_new_challenge(request("Daily Water Goal")).unwrap();
        assert_eq!(new.tracking, TrackingKind::Hydration);
        assert_eq!(new.difficulty, 2);
        assert_eq!(new.points, 100);
        assert_eq!(new.duration, ChallengeDuration::Weekly);
        assert_eq!(new.criteria_target, 7.0);
    }

    #[test]
    fn test_explicit_tracking_wins_over_title() {
        let mut req = request("Daily Water Goal");
        req.tracking = Some(TrackingKind::ActivityCount);
        let new = validate_new_challenge(req).unwrap();
        assert_eq!(new.tracking, TrackingKind::ActivityCount);
    }

    #[test]
    fn test_new_challenge_validation() {
        let mut missing = request("Steps");
        missing.description = Some("   ".to_string());
        assert!(validate_new_challenge(missing).is_err());

        let mut bad_category = request("Steps");
        bad_category.category = Some("cooking".to_string());
        assert!(validate_new_challenge(bad_category).is_err());

        let mut bad_difficulty = request("Steps");
        bad_difficulty.difficulty = Some(9);
        assert!(validate_new_challenge(bad_difficulty).is_err());
    }
}
