use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>,
    pub avatar: Option<String>,
    pub status: String,
    pub onboarding_completed: bool,

    pub age: Option<i32>,
    pub gender: Option<String>,
    pub height: Option<f64>,
    pub height_unit: String,
    pub weight: Option<f64>,
    pub weight_unit: String,
    pub activity_level: String,
    pub primary_goal: Option<String>,
    pub secondary_goals: Vec<String>,
    pub fitness_level: Option<String>,
    pub goals: Vec<String>,
    pub preferences: Value,

    pub total_points: i32,
    pub level: i32,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_active_date: Option<DateTime<Utc>>,
    pub badges: Vec<String>,
    pub completed_challenges: i32,

    pub dropout_risk: Option<f64>,
    pub streak_risk: Option<f64>,
    pub engagement_level: Option<String>,
    pub preferred_tone: Option<String>,
    pub last_prediction: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub height: Option<f64>,
    pub height_unit: String,
    pub weight: Option<f64>,
    pub weight_unit: String,
    pub activity_level: String,
    pub primary_goal: Option<String>,
    pub secondary_goals: Vec<String>,
    pub fitness_level: Option<String>,
    pub goals: Vec<String>,
    pub preferences: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_points: i32,
    pub level: i32,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_active_date: Option<DateTime<Utc>>,
    pub badges: Vec<String>,
    pub completed_challenges: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MlData {
    pub dropout_risk: Option<f64>,
    pub streak_risk: Option<f64>,
    pub engagement_level: Option<String>,
    pub preferred_tone: Option<String>,
    pub last_prediction: Option<DateTime<Utc>>,
}

/// Public card for a user, embedded in feeds, friend lists and search results.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub status: String,
    pub stats: UserStats,
}

impl UserRow {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            age: self.age,
            gender: self.gender.clone(),
            height: self.height,
            height_unit: self.height_unit.clone(),
            weight: self.weight,
            weight_unit: self.weight_unit.clone(),
            activity_level: self.activity_level.clone(),
            primary_goal: self.primary_goal.clone(),
            secondary_goals: self.secondary_goals.clone(),
            fitness_level: self.fitness_level.clone(),
            goals: self.goals.clone(),
            preferences: self.preferences.clone(),
        }
    }

    pub fn stats(&self) -> UserStats {
        UserStats {
            total_points: self.total_points,
            level: self.level,
            current_streak: self.current_streak,
            longest_streak: self.longest_streak,
            last_active_date: self.last_active_date,
            badges: self.badges.clone(),
            completed_challenges: self.completed_challenges,
        }
    }

    pub fn ml_data(&self) -> MlData {
        MlData {
            dropout_risk: self.dropout_risk,
            streak_risk: self.streak_risk,
            engagement_level: self.engagement_level.clone(),
            preferred_tone: self.preferred_tone.clone(),
            last_prediction: self.last_prediction,
        }
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            avatar: self.avatar.clone(),
            status: self.status.clone(),
            stats: self.stats(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UserStatus {
    #[serde(rename = "active")]
    Active,
    #[serde(rename = "non-active")]
    NonActive,
    #[serde(rename = "rest-day")]
    RestDay,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::NonActive => "non-active",
            UserStatus::RestDay => "rest-day",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    LightlyActive,
    ModeratelyActive,
    VeryActive,
    ExtraActive,
}

impl ActivityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityLevel::Sedentary => "sedentary",
            ActivityLevel::LightlyActive => "lightly_active",
            ActivityLevel::ModeratelyActive => "moderately_active",
            ActivityLevel::VeryActive => "very_active",
            ActivityLevel::ExtraActive => "extra_active",
        }
    }

    /// Unknown stored values count as sedentary.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "lightly_active" => ActivityLevel::LightlyActive,
            "moderately_active" => ActivityLevel::ModeratelyActive,
            "very_active" => ActivityLevel::VeryActive,
            "extra_active" => ActivityLevel::ExtraActive,
            _ => ActivityLevel::Sedentary,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HeightUnit {
    Cm,
    Ft,
}

impl HeightUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            HeightUnit::Cm => "cm",
            HeightUnit::Ft => "ft",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    Kg,
    Lbs,
}

impl WeightUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeightUnit::Kg => "kg",
            WeightUnit::Lbs => "lbs",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FitnessLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl FitnessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FitnessLevel::Beginner => "beginner",
            FitnessLevel::Intermediate => "intermediate",
            FitnessLevel::Advanced => "advanced",
        }
    }
}

#[cfg(test)]
impl UserRow {
    /// A freshly onboarded user with default stats.
    pub fn fixture() -> Self {
        UserRow {
            id: Uuid::new_v4(),
            email: "runner@example.com".to_string(),
            name: "Runner".to_string(),
            password_hash: None,
            avatar: None,
            status: "active".to_string(),
            onboarding_completed: true,
            age: None,
            gender: None,
            height: None,
            height_unit: "cm".to_string(),
            weight: None,
            weight_unit: "kg".to_string(),
            activity_level: "sedentary".to_string(),
            primary_goal: None,
            secondary_goals: vec![],
            fitness_level: None,
            goals: vec![],
            preferences: serde_json::json!({}),
            total_points: 0,
            level: 1,
            current_streak: 0,
            longest_streak: 0,
            last_active_date: None,
            badges: vec![],
            completed_challenges: 0,
            dropout_risk: None,
            streak_risk: None,
            engagement_level: None,
            preferred_tone: None,
            last_prediction: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
