use serde::{Deserialize, Serialize};

/// Tones the front end knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Celebratory,
    Challenging,
    Supportive,
    Encouraging,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotivationMessage {
    pub message: String,
    pub tone: Tone,
    pub personalization_score: f64,
}

/// Streak-based message used when the ML service is unavailable.
pub fn fallback_message(name: &str, current_streak: i32, dropout_risk: Option<f64>) -> MotivationMessage {
    let first_name = name.split_whitespace().next().unwrap_or("there");

    let (tone, message) = match current_streak {
        _ if dropout_risk.is_some_and(|r| r >= 0.6) => (
            Tone::Supportive,
            format!("Every step counts, {first_name}. A short session today is enough to get going again."),
        ),
        0 => (
            Tone::Encouraging,
            format!("Today is a great day to start, {first_name}. Log one activity and your streak begins."),
        ),
        1..=6 => (
            Tone::Encouraging,
            format!("{current_streak} days in a row, {first_name}! Keep it up and you'll hit a full week."),
        ),
        7..=29 => (
            Tone::Challenging,
            format!("{current_streak}-day streak, {first_name}. Ready to push for 30?"),
        ),
        _ => (
            Tone::Celebratory,
            format!("{current_streak} days strong, {first_name}! You're an inspiration."),
        ),
    };

    MotivationMessage {
        message,
        tone,
        personalization_score: 0.5,
    }
}
