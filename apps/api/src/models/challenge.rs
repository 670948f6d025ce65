use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub tracking: String,
    pub difficulty: i32,
    pub points: i32,
    pub duration: String,
    pub criteria_type: String,
    pub criteria_target: f64,
    pub criteria_metric: String,
    pub active: bool,
    pub created_by: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChallengeRow {
    pub fn tracking_kind(&self) -> TrackingKind {
        TrackingKind::parse(&self.tracking)
    }

    pub fn duration_class(&self) -> ChallengeDuration {
        ChallengeDuration::parse(&self.duration)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserChallengeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub challenge_id: Uuid,
    pub status: String,
    pub progress: i32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub points_earned: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Failed,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Completed => "completed",
            EnrollmentStatus::Failed => "failed",
        }
    }
}

/// How a challenge's progress is measured from the activity log.
/// Set once when the challenge is created.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrackingKind {
    /// Glasses of water logged today against a daily target.
    Hydration,
    /// Walk/step activities since enrollment against a count target.
    Steps,
    /// Any activity since enrollment against a count target.
    ActivityCount,
}

impl TrackingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingKind::Hydration => "hydration",
            TrackingKind::Steps => "steps",
            TrackingKind::ActivityCount => "activity_count",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "hydration" => TrackingKind::Hydration,
            "steps" => TrackingKind::Steps,
            _ => TrackingKind::ActivityCount,
        }
    }

    /// Classifies a challenge that was created without an explicit tracking kind.
    /// Used only at creation time; the result is stored on the row.
    pub fn infer_from_title(title: &str) -> Self {
        let title = title.to_lowercase();
        if title.contains("hydration") || title.contains("water") {
            TrackingKind::Hydration
        } else if title.contains("step") {
            TrackingKind::Steps
        } else {
            TrackingKind::ActivityCount
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeCategory {
    Fitness,
    Meditation,
    Nutrition,
    Social,
}

impl ChallengeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeCategory::Fitness => "fitness",
            ChallengeCategory::Meditation => "meditation",
            ChallengeCategory::Nutrition => "nutrition",
            ChallengeCategory::Social => "social",
        }
    }

    /// Activity type that counts as engagement with this category.
    pub fn activity_type(&self) -> &'static str {
        match self {
            ChallengeCategory::Fitness => "exercise",
            ChallengeCategory::Meditation => "meditation",
            ChallengeCategory::Nutrition => "nutrition",
            ChallengeCategory::Social => "social",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "fitness" => Some(ChallengeCategory::Fitness),
            "meditation" => Some(ChallengeCategory::Meditation),
            "nutrition" => Some(ChallengeCategory::Nutrition),
            "social" => Some(ChallengeCategory::Social),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeDuration {
    Daily,
    #[default]
    Weekly,
    Monthly,
}

impl ChallengeDuration {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeDuration::Daily => "daily",
            ChallengeDuration::Weekly => "weekly",
            ChallengeDuration::Monthly => "monthly",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "daily" => ChallengeDuration::Daily,
            "monthly" => ChallengeDuration::Monthly,
            _ => ChallengeDuration::Weekly,
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            ChallengeDuration::Daily => 1,
            ChallengeDuration::Weekly => 7,
            ChallengeDuration::Monthly => 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_tracking_from_title() {
        assert_eq!(
            TrackingKind::infer_from_title("Daily Hydration Goal"),
            TrackingKind::Hydration
        );
        assert_eq!(
            TrackingKind::infer_from_title("Drink More WATER"),
            TrackingKind::Hydration
        );
        assert_eq!(
            TrackingKind::infer_from_title("10K Steps Challenge"),
            TrackingKind::Steps
        );
        assert_eq!(
            TrackingKind::infer_from_title("Morning Yoga Week"),
            TrackingKind::ActivityCount
        );
    }

    #[test]
    fn test_tracking_round_trips_through_storage_string() {
        for kind in [
            TrackingKind::Hydration,
            TrackingKind::Steps,
            TrackingKind::ActivityCount,
        ] {
            assert_eq!(TrackingKind::parse(kind.as_str()), kind);
        }
        assert_eq!(TrackingKind::parse("unknown"), TrackingKind::ActivityCount);
    }

    #[test]
    fn test_duration_days() {
        assert_eq!(ChallengeDuration::parse("daily").days(), 1);
        assert_eq!(ChallengeDuration::parse("weekly").days(), 7);
        assert_eq!(ChallengeDuration::parse("monthly").days(), 30);
    }
}
