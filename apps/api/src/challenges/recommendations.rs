//! Rule-based challenge recommendations, used whenever the ML service has nothing
//! to offer.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::models::challenge::{ChallengeCategory, ChallengeDuration, ChallengeRow};

pub const MAX_RECOMMENDATIONS: usize = 3;
const BASE_SCORE: f64 = 50.0;
const MIN_MATCH: f64 = 65.0;
const MAX_MATCH: f64 = 95.0;

/// What the scorer knows about the caller.
#[derive(Debug, Clone, Default)]
pub struct UserSignals {
    pub current_streak: i32,
    pub completed_challenges: i32,
    /// Activity counts by type over the last 30 days.
    pub activity_types: HashMap<String, i64>,
}

impl UserSignals {
    pub fn top_activity_type(&self) -> &str {
        self.activity_types
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(t, _)| t.as_str())
            .unwrap_or("fitness")
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    #[serde(flatten)]
    pub challenge: ChallengeRow,
    pub match_score: i32,
}

pub fn score_challenge(challenge: &ChallengeRow, signals: &UserSignals) -> f64 {
    let mut score = BASE_SCORE;
    let streak = signals.current_streak;

    let engaged_category = ChallengeCategory::parse(&challenge.category)
        .map(|c| signals.activity_types.get(c.activity_type()).copied().unwrap_or(0) > 0)
        .unwrap_or(false);
    if engaged_category {
        score += 30.0;
    }

    let difficulty_fits = (streak > 20 && challenge.difficulty >= 4)
        || (streak > 10 && challenge.difficulty == 3)
        || (streak <= 10 && challenge.difficulty <= 2);
    if difficulty_fits {
        score += 20.0;
    }

    let duration = ChallengeDuration::parse(&challenge.duration);
    if (duration == ChallengeDuration::Daily && streak < 7)
        || (duration == ChallengeDuration::Weekly && streak >= 7)
    {
        score += 15.0;
    }

    if signals.completed_challenges > 3 {
        score += (f64::from(challenge.points) / 50.0).min(20.0);
    }

    score
}

/// Top challenges by score, ties broken by newest first.
pub fn recommend(available: Vec<ChallengeRow>, signals: &UserSignals) -> Vec<Recommendation> {
    let mut scored: Vec<(f64, ChallengeRow)> = available
        .into_iter()
        .map(|c| (score_challenge(&c, signals), c))
        .collect();

    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.1.created_at.cmp(&a.1.created_at))
    });

    scored
        .into_iter()
        .take(MAX_RECOMMENDATIONS)
        .map(|(score, challenge)| Recommendation {
            challenge,
            match_score: score.clamp(MIN_MATCH, MAX_MATCH).round() as i32,
        })
        .collect()
}

/// Maps an ML `recommend-challenge` response onto the available challenges.
///
/// The service answers `{ "recommendations": [{ "challenge_id", "confidence_score", .. }] }`.
/// Entries naming unknown or unavailable challenges are dropped; `None` means
/// nothing usable came back.
pub fn from_ml_response(available: &[ChallengeRow], body: &Value) -> Option<Vec<Recommendation>> {
    let entries = body.get("recommendations")?.as_array()?;

    let picks: Vec<Recommendation> = entries
        .iter()
        .filter_map(|entry| {
            let id = entry
                .get("challenge_id")
                .and_then(Value::as_str)
                .and_then(|raw| Uuid::parse_str(raw).ok())?;
            let challenge = available.iter().find(|c| c.id == id)?.clone();
            let confidence = entry
                .get("confidence_score")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            Some(Recommendation {
                challenge,
                match_score: (confidence * 100.0).clamp(MIN_MATCH, MAX_MATCH).round() as i32,
            })
        })
        .take(MAX_RECOMMENDATIONS)
        .collect();

    (!picks.is_empty()).then_some(picks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn challenge(category: &str, difficulty: i32, duration: &str, points: i32) -> ChallengeRow {
        ChallengeRow {
            id: Uuid::new_v4(),
            title: format!("{category} challenge"),
            description: String::new(),
            category: category.to_string(),
            tracking: "activity_count".to_string(),
            difficulty,
            points,
            duration: duration.to_string(),
            criteria_type: "count".to_string(),
            criteria_target: 7.0,
            criteria_metric: "activities".to_string(),
            active: true,
            created_by: None,
            image_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_beginner_scoring() {
        let signals = UserSignals {
            current_streak: 2,
            completed_challenges: 0,
            activity_types: HashMap::from([("exercise".to_string(), 4)]),
        };
        // 50 + 30 (category) + 20 (easy) + 15 (daily)
        assert_eq!(score_challenge(&challenge("fitness", 1, "daily", 100), &signals), 115.0);
        // 50 only
        assert_eq!(score_challenge(&challenge("nutrition", 5, "monthly", 100), &signals), 50.0);
    }

    #[test]
    fn test_point_bonus_for_engaged_users() {
        let signals = UserSignals {
            current_streak: 25,
            completed_challenges: 5,
            activity_types: HashMap::new(),
        };
        // 50 + 20 (hard) + 15 (weekly) + min(2000/50, 20)
        assert_eq!(score_challenge(&challenge("social", 5, "weekly", 2000), &signals), 105.0);
    }

    #[test]
    fn test_recommend_takes_top_three_and_clamps_match() {
        let signals = UserSignals {
            current_streak: 0,
            ..Default::default()
        };
        let mut low = challenge("social", 5, "monthly", 100);
        low.created_at = Utc::now() - Duration::days(1);
        let picks = recommend(
            vec![
                low,
                challenge("fitness", 1, "daily", 100),
                challenge("meditation", 2, "daily", 100),
                challenge("nutrition", 3, "weekly", 100),
            ],
            &signals,
        );
        assert_eq!(picks.len(), MAX_RECOMMENDATIONS);
        assert!(picks.iter().all(|p| (65..=95).contains(&p.match_score)));
        assert_eq!(picks[0].match_score, 85);
        assert!(picks.iter().all(|p| p.challenge.category != "social"));
    }

    #[test]
    fn test_from_ml_response_keeps_known_challenges() {
        let available = vec![challenge("fitness", 1, "daily", 100)];
        let body = serde_json::json!({
            "recommendations": [
                { "challenge_id": Uuid::new_v4().to_string(), "confidence_score": 0.9 },
                { "challenge_id": available[0].id.to_string(), "confidence_score": 0.99 }
            ]
        });
        let picks = from_ml_response(&available, &body).unwrap();
        assert_eq!(picks.len(), 1);
        assert_eq!(picks[0].challenge.id, available[0].id);
        assert_eq!(picks[0].match_score, 95);
    }

    #[test]
    fn test_from_ml_response_without_matches() {
        let available = vec![challenge("fitness", 1, "daily", 100)];
        assert!(from_ml_response(&available, &serde_json::json!({})).is_none());
        assert!(from_ml_response(&available, &serde_json::json!({ "recommendations": [] })).is_none());
    }

    #[test]
    fn test_top_activity_type() {
        let signals = UserSignals {
            activity_types: HashMap::from([
                ("exercise".to_string(), 2),
                ("meditation".to_string(), 5),
            ]),
            ..Default::default()
        };
        assert_eq!(signals.top_activity_type(), "meditation");
        assert_eq!(UserSignals::default().top_activity_type(), "fitness");
    }
}
