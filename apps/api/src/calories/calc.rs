//! Energy estimates: resting metabolic rate, maintenance and activity burn.

use crate::models::activity::Intensity;
use crate::models::user::{ActivityLevel, UserRow};

const DEFAULT_HEIGHT_CM: f64 = 170.0;
const DEFAULT_WEIGHT_KG: f64 = 70.0;
const DEFAULT_WEIGHT_LBS: f64 = 154.0;
const DEFAULT_AGE: i32 = 25;

const CM_PER_FOOT: f64 = 30.48;
const KG_PER_LB: f64 = 0.453592;

const GOAL_ADJUSTMENT: i32 = 500;
const DEFAULT_MET: f64 = 5.0;

/// MET values for the exercises the calorie tracker offers.
const MET_VALUES: [(&str, f64); 10] = [
    ("Running", 9.8),
    ("Cycling", 7.5),
    ("Swimming", 8.0),
    ("Walking", 3.8),
    ("Yoga", 2.5),
    ("Weight Training", 6.0),
    ("Dancing", 5.0),
    ("Hiking", 6.5),
    ("HIIT", 12.0),
    ("Pilates", 3.0),
];

pub fn met_for(activity: &str) -> f64 {
    MET_VALUES
        .iter()
        .find(|(name, _)| *name == activity)
        .map(|(_, met)| *met)
        .unwrap_or(DEFAULT_MET)
}

pub fn height_cm(user: &UserRow) -> f64 {
    let height = user.height.filter(|h| *h > 0.0).unwrap_or(DEFAULT_HEIGHT_CM);
    if user.height_unit == "ft" && user.height.is_some() {
        height * CM_PER_FOOT
    } else {
        height
    }
}

pub fn weight_kg(user: &UserRow) -> f64 {
    let weight = user.weight.filter(|w| *w > 0.0);
    if user.weight_unit == "lbs" {
        weight.unwrap_or(DEFAULT_WEIGHT_LBS) * KG_PER_LB
    } else {
        weight.unwrap_or(DEFAULT_WEIGHT_KG)
    }
}

/// Mifflin-St Jeor basal metabolic rate, kcal/day.
pub fn bmr(user: &UserRow) -> i32 {
    let age = f64::from(user.age.filter(|a| *a > 0).unwrap_or(DEFAULT_AGE));
    let base = 10.0 * weight_kg(user) + 6.25 * height_cm(user) - 5.0 * age;
    let is_male = user
        .gender
        .as_deref()
        .is_some_and(|g| g.eq_ignore_ascii_case("male"));
    let offset = if is_male { 5.0 } else { -161.0 };
    (base + offset).round() as i32
}

pub fn activity_factor(level: ActivityLevel) -> f64 {
    match level {
        ActivityLevel::Sedentary => 1.2,
        ActivityLevel::LightlyActive => 1.375,
        ActivityLevel::ModeratelyActive => 1.55,
        ActivityLevel::VeryActive => 1.725,
        ActivityLevel::ExtraActive => 1.9,
    }
}

pub fn maintenance_calories(bmr: i32, level: ActivityLevel) -> i32 {
    (f64::from(bmr) * activity_factor(level)).round() as i32
}

/// Daily target: 500 below maintenance for weight loss, 500 above for gain.
pub fn calorie_goal(maintenance: i32, primary_goal: Option<&str>) -> i32 {
    match primary_goal {
        Some(g) if g.eq_ignore_ascii_case("weight loss") => maintenance - GOAL_ADJUSTMENT,
        Some(g) if g.eq_ignore_ascii_case("muscle gain") || g.eq_ignore_ascii_case("weight gain") => {
            maintenance + GOAL_ADJUSTMENT
        }
        _ => maintenance,
    }
}

/// `round(MET × kg × hours × intensity)`.
pub fn calories_burned(met: f64, weight_kg: f64, minutes: i32, intensity: Intensity) -> i32 {
    let hours = f64::from(minutes.max(0)) / 60.0;
    (met * weight_kg * hours * intensity.met_multiplier()).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(gender: &str, height: f64, weight: f64, age: i32) -> UserRow {
        let mut u = UserRow::fixture();
        u.gender = Some(gender.to_string());
        u.height = Some(height);
        u.weight = Some(weight);
        u.age = Some(age);
        u
    }

    #[test]
    fn test_bmr_mifflin_st_jeor() {
        // 10*80 + 6.25*180 - 5*30 + 5 = 1780
        assert_eq!(bmr(&user("Male", 180.0, 80.0, 30)), 1780);
        // 10*60 + 6.25*165 - 5*28 - 161 = 1330.25
        assert_eq!(bmr(&user("Female", 165.0, 60.0, 28)), 1330);
    }

    #[test]
    fn test_bmr_defaults() {
        // 10*70 + 6.25*170 - 5*25 - 161 = 1476.5
        assert_eq!(bmr(&UserRow::fixture()), 1477);
    }

    #[test]
    fn test_unit_conversion() {
        let mut u = user("Male", 6.0, 200.0, 40);
        u.height_unit = "ft".to_string();
        u.weight_unit = "lbs".to_string();
        assert!((height_cm(&u) - 182.88).abs() < 1e-9);
        assert!((weight_kg(&u) - 90.7184).abs() < 1e-9);
    }

    #[test]
    fn test_goal_adjustment() {
        assert_eq!(calorie_goal(2000, Some("Weight Loss")), 1500);
        assert_eq!(calorie_goal(2000, Some("Muscle Gain")), 2500);
        assert_eq!(calorie_goal(2000, Some("Weight Gain")), 2500);
        assert_eq!(calorie_goal(2000, Some("Flexibility")), 2000);
        assert_eq!(calorie_goal(2000, None), 2000);
    }

    #[test]
    fn test_maintenance_uses_activity_factor() {
        assert_eq!(maintenance_calories(2000, ActivityLevel::ModeratelyActive), 3100);
        assert_eq!(maintenance_calories(1500, ActivityLevel::parse("unknown")), 1800);
    }

    #[test]
    fn test_calories_burned() {
        // 9.8 * 70 * 0.5 = 343
        assert_eq!(calories_burned(met_for("Running"), 70.0, 30, Intensity::Moderate), 343);
        // 343 * 1.3 = 445.9
        assert_eq!(calories_burned(met_for("Running"), 70.0, 30, Intensity::Vigorous), 446);
        assert_eq!(met_for("Rowing"), 5.0);
    }
}
