use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const HYDRATION: &str = "hydration";
pub const VITALS: &str = "vitals";
pub const EXERCISE: &str = "exercise";

/// Longest single activity accepted, in minutes.
pub const MAX_DURATION_MINUTES: i32 = 1440;

/// A positive duration no longer than one day.
pub fn checked_duration(duration: Option<i32>) -> Option<i32> {
    duration.filter(|d| (1..=MAX_DURATION_MINUTES).contains(d))
}

/// A single logged activity. Rows are never updated after insert.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRow {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub activity_type: String,
    pub name: String,
    pub duration: i32,
    pub intensity: String,
    pub calories: i32,
    pub calories_burned: i32,
    pub met: Option<f64>,
    /// Counted units for quantity-based logs (glasses of water for hydration).
    pub quantity: Option<i32>,
    pub completed: bool,
    pub notes: Option<String>,
    pub heart_rate: Option<f64>,
    pub resting_heart_rate: Option<f64>,
    pub blood_oxygen: Option<f64>,
    pub blood_pressure_systolic: Option<f64>,
    pub blood_pressure_diastolic: Option<f64>,
    pub heart_rate_variability: Option<f64>,
    pub completed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ActivityRow {
    /// Glasses of water recorded by a hydration log.
    ///
    /// Rows written before `quantity` existed carry the count only as the
    /// leading integer of `notes` ("3 glasses (750ml)").
    pub fn glasses(&self) -> i64 {
        match self.quantity {
            Some(q) => i64::from(q.max(0)),
            None => self.notes.as_deref().map(leading_integer).unwrap_or(0),
        }
    }

    pub fn is_walk_or_step(&self) -> bool {
        let name = self.name.to_lowercase();
        name.contains("walk") || name.contains("step")
    }
}

/// Leading integer of the first whitespace-separated token; 0 when absent.
/// Capped at `i32::MAX`, the range of the typed `quantity` column.
pub fn leading_integer(text: &str) -> i64 {
    let token = text.split_whitespace().next().unwrap_or("");
    let digits: String = token
        .chars()
        .enumerate()
        .take_while(|(i, c)| c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+')))
        .map(|(_, c)| c)
        .collect();
    if digits.trim_start_matches(['-', '+']).is_empty() {
        return 0;
    }
    digits
        .parse::<i64>()
        .unwrap_or(if digits.starts_with('-') { 0 } else { i64::MAX })
        .clamp(0, i64::from(i32::MAX))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Low,
    #[default]
    Moderate,
    High,
    Light,
    Vigorous,
}

impl Intensity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intensity::Low => "low",
            Intensity::Moderate => "moderate",
            Intensity::High => "high",
            Intensity::Light => "light",
            Intensity::Vigorous => "vigorous",
        }
    }

    /// Points multiplier applied to activity duration.
    pub fn points_multiplier(&self) -> f64 {
        match self {
            Intensity::High => 2.0,
            Intensity::Moderate => 1.5,
            _ => 1.0,
        }
    }

    /// MET adjustment used for calorie estimates.
    pub fn met_multiplier(&self) -> f64 {
        match self {
            Intensity::Light => 0.7,
            Intensity::Vigorous => 1.3,
            _ => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity(name: &str, quantity: Option<i32>, notes: Option<&str>) -> ActivityRow {
        ActivityRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            activity_type: HYDRATION.to_string(),
            name: name.to_string(),
            duration: 0,
            intensity: "moderate".to_string(),
            calories: 0,
            calories_burned: 0,
            met: None,
            quantity,
            completed: false,
            notes: notes.map(str::to_string),
            heart_rate: None,
            resting_heart_rate: None,
            blood_oxygen: None,
            blood_pressure_systolic: None,
            blood_pressure_diastolic: None,
            heart_rate_variability: None,
            completed_at: Utc::now(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_leading_integer() {
        assert_eq!(leading_integer("3 glasses (750ml)"), 3);
        assert_eq!(leading_integer("12glasses"), 12);
        assert_eq!(leading_integer("glasses 3"), 0);
        assert_eq!(leading_integer(""), 0);
        assert_eq!(leading_integer("-2 glasses"), 0);
        assert_eq!(leading_integer("+ glasses"), 0);
    }

    #[test]
    fn test_leading_integer_is_capped_to_quantity_range() {
        assert_eq!(leading_integer("9223372036854775807 glasses"), i64::from(i32::MAX));
        assert_eq!(leading_integer("99999999999999999999999 glasses"), i64::from(i32::MAX));
        assert_eq!(leading_integer("-99999999999999999999999"), 0);
    }

    #[test]
    fn test_checked_duration() {
        assert_eq!(checked_duration(Some(30)), Some(30));
        assert_eq!(checked_duration(Some(MAX_DURATION_MINUTES)), Some(1440));
        assert_eq!(checked_duration(Some(1441)), None);
        assert_eq!(checked_duration(Some(2_000_000_000)), None);
        assert_eq!(checked_duration(Some(0)), None);
        assert_eq!(checked_duration(None), None);
    }

    #[test]
    fn test_glasses_prefers_quantity() {
        let a = activity("Water Intake", Some(5), Some("3 glasses (750ml)"));
        assert_eq!(a.glasses(), 5);
    }

    #[test]
    fn test_glasses_falls_back_to_notes() {
        let a = activity("Water Intake", None, Some("4 glasses (1000ml)"));
        assert_eq!(a.glasses(), 4);
        let b = activity("Water Intake", None, None);
        assert_eq!(b.glasses(), 0);
    }

    #[test]
    fn test_walk_or_step_is_case_insensitive() {
        assert!(activity("Morning WALK", None, None).is_walk_or_step());
        assert!(activity("Stepper", None, None).is_walk_or_step());
        assert!(!activity("Running", None, None).is_walk_or_step());
    }

    #[test]
    fn test_intensity_multipliers() {
        assert_eq!(Intensity::High.points_multiplier(), 2.0);
        assert_eq!(Intensity::Moderate.points_multiplier(), 1.5);
        assert_eq!(Intensity::Light.points_multiplier(), 1.0);
        assert_eq!(Intensity::Light.met_multiplier(), 0.7);
        assert_eq!(Intensity::Vigorous.met_multiplier(), 1.3);
    }
}
