use std::collections::HashMap;

use serde_json::Value;

use crate::models::activity::MAX_DURATION_MINUTES;

/// Actions that earn points through `POST /api/gamification`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardAction {
    CompleteActivity,
    CompleteExercise,
    CompleteMeditation,
    LogNutrition,
    AchieveStepGoal,
    CompleteChallenge,
    PerfectChallenge,
    MaintainStreak,
    StreakMilestone7,
    StreakMilestone30,
    StreakMilestone100,
    SocialInteraction,
    EncourageUser,
    ProfileCompletion,
    FirstLogin,
    DailyCheckIn,
}

impl RewardAction {
    pub fn parse(raw: &str) -> Option<Self> {
        let action = match raw {
            "complete_activity" => RewardAction::CompleteActivity,
            "complete_exercise" => RewardAction::CompleteExercise,
            "complete_meditation" => RewardAction::CompleteMeditation,
            "log_nutrition" => RewardAction::LogNutrition,
            "achieve_step_goal" => RewardAction::AchieveStepGoal,
            "complete_challenge" => RewardAction::CompleteChallenge,
            "perfect_challenge" => RewardAction::PerfectChallenge,
            "maintain_streak" => RewardAction::MaintainStreak,
            "streak_milestone_7" => RewardAction::StreakMilestone7,
            "streak_milestone_30" => RewardAction::StreakMilestone30,
            "streak_milestone_100" => RewardAction::StreakMilestone100,
            "social_interaction" => RewardAction::SocialInteraction,
            "encourage_user" => RewardAction::EncourageUser,
            "profile_completion" => RewardAction::ProfileCompletion,
            "first_login" => RewardAction::FirstLogin,
            "daily_check_in" => RewardAction::DailyCheckIn,
            _ => return None,
        };
        Some(action)
    }

    pub fn base_points(&self) -> i32 {
        match self {
            RewardAction::CompleteActivity => 10,
            RewardAction::CompleteExercise => 20,
            RewardAction::CompleteMeditation => 15,
            RewardAction::LogNutrition => 5,
            RewardAction::AchieveStepGoal => 25,
            RewardAction::CompleteChallenge => 50,
            RewardAction::PerfectChallenge => 100,
            RewardAction::MaintainStreak => 5,
            RewardAction::StreakMilestone7 => 50,
            RewardAction::StreakMilestone30 => 200,
            RewardAction::StreakMilestone100 => 1000,
            RewardAction::SocialInteraction => 3,
            RewardAction::EncourageUser => 5,
            RewardAction::ProfileCompletion => 50,
            RewardAction::FirstLogin => 10,
            RewardAction::DailyCheckIn => 5,
        }
    }

    /// Points for this action. A completed activity is worth its duration in minutes
    /// when the caller reports one, up to one day.
    pub fn points(&self, metadata: Option<&Value>) -> i32 {
        if *self == RewardAction::CompleteActivity {
            let duration = metadata
                .and_then(|m| m.get("duration"))
                .and_then(Value::as_f64)
                .filter(|d| *d > 0.0);
            if let Some(minutes) = duration {
                return minutes.min(f64::from(MAX_DURATION_MINUTES)).round() as i32;
            }
        }
        self.base_points()
    }
}

/// Numeric metadata fields, usable as named badge metrics.
pub fn numeric_metrics(metadata: Option<&Value>) -> HashMap<String, f64> {
    metadata
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_f64().map(|n| (k.clone(), n)))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_action() {
        assert_eq!(RewardAction::parse("fly_to_moon"), None);
    }

    #[test]
    fn test_fixed_rewards() {
        assert_eq!(RewardAction::parse("complete_challenge").unwrap().points(None), 50);
        assert_eq!(RewardAction::parse("daily_check_in").unwrap().points(None), 5);
    }

    #[test]
    fn test_complete_activity_uses_duration() {
        let action = RewardAction::CompleteActivity;
        assert_eq!(action.points(None), 10);
        assert_eq!(action.points(Some(&json!({ "duration": 45 }))), 45);
        assert_eq!(action.points(Some(&json!({ "duration": 0 }))), 10);
        assert_eq!(action.points(Some(&json!({ "duration": "long" }))), 10);
        assert_eq!(action.points(Some(&json!({ "duration": 1e12 }))), 1440);
    }

    #[test]
    fn test_numeric_metrics_skip_non_numbers() {
        let metrics = numeric_metrics(Some(&json!({
            "activityType": "Running",
            "duration": 30,
            "caloriesBurned": 250.5
        })));
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics["caloriesBurned"], 250.5);
    }
}
