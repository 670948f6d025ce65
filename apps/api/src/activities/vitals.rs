use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::activity::{ActivityRow, VITALS};
use crate::state::AppState;

const MAX_RECORDS: i64 = 100;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalsReading {
    pub heart_rate: Option<f64>,
    pub resting_heart_rate: Option<f64>,
    pub blood_oxygen: Option<f64>,
    pub blood_pressure_systolic: Option<f64>,
    pub blood_pressure_diastolic: Option<f64>,
    pub heart_rate_variability: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl VitalsReading {
    fn has_any(&self) -> bool {
        [
            self.heart_rate,
            self.resting_heart_rate,
            self.blood_oxygen,
            self.blood_pressure_systolic,
            self.blood_pressure_diastolic,
            self.heart_rate_variability,
        ]
        .iter()
        .any(|v| v.is_some_and(f64::is_finite))
    }
}

#[derive(Debug, Serialize)]
pub struct RecordVitalsResponse {
    pub success: bool,
    pub message: &'static str,
    pub data: ActivityRow,
}

#[derive(Debug, Deserialize)]
pub struct VitalsQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalsAverages {
    pub heart_rate: f64,
    pub resting_heart_rate: f64,
    pub blood_oxygen: f64,
    pub blood_pressure_systolic: f64,
    pub blood_pressure_diastolic: f64,
    pub heart_rate_variability: f64,
}

#[derive(Debug, Serialize)]
pub struct VitalsSummary {
    pub records: Vec<ActivityRow>,
    pub averages: VitalsAverages,
    pub count: usize,
    pub period: String,
}

#[derive(Debug, Serialize)]
pub struct VitalsResponse {
    pub success: bool,
    pub data: VitalsSummary,
}

/// Mean of the values present, rounded to one decimal; 0 when none are.
fn mean_of(values: impl Iterator<Item = Option<f64>>) -> f64 {
    let (sum, n) = values
        .flatten()
        .filter(|v| v.is_finite())
        .fold((0.0, 0u32), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        return 0.0;
    }
    (sum / f64::from(n) * 10.0).round() / 10.0
}

/// Per-field averages. Each field is averaged over the records that carry it.
pub fn average_vitals(records: &[ActivityRow]) -> VitalsAverages {
    VitalsAverages {
        heart_rate: mean_of(records.iter().map(|r| r.heart_rate)),
        resting_heart_rate: mean_of(records.iter().map(|r| r.resting_heart_rate)),
        blood_oxygen: mean_of(records.iter().map(|r| r.blood_oxygen)),
        blood_pressure_systolic: mean_of(records.iter().map(|r| r.blood_pressure_systolic)),
        blood_pressure_diastolic: mean_of(records.iter().map(|r| r.blood_pressure_diastolic)),
        heart_rate_variability: mean_of(records.iter().map(|r| r.heart_rate_variability)),
    }
}

/// POST /api/vitals
pub async fn handle_record_vitals(
    State(state): State<AppState>,
    user: AuthUser,
    Json(reading): Json<VitalsReading>,
) -> Result<(StatusCode, Json<RecordVitalsResponse>), AppError> {
    if !reading.has_any() {
        return Err(AppError::validation("At least one vital sign reading is required"));
    }

    let data = sqlx::query_as::<_, ActivityRow>(
        "INSERT INTO activities (id, user_id, activity_type, name, duration, completed, completed_at,
                                 heart_rate, resting_heart_rate, blood_oxygen,
                                 blood_pressure_systolic, blood_pressure_diastolic, heart_rate_variability)
         VALUES ($1, $2, $3, 'Vital Signs Check', 1, TRUE, $4, $5, $6, $7, $8, $9, $10)
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(user.id)
    .bind(VITALS)
    .bind(reading.timestamp.unwrap_or_else(Utc::now))
    .bind(reading.heart_rate)
    .bind(reading.resting_heart_rate)
    .bind(reading.blood_oxygen)
    .bind(reading.blood_pressure_systolic)
    .bind(reading.blood_pressure_diastolic)
    .bind(reading.heart_rate_variability)
    .fetch_one(&state.db)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(RecordVitalsResponse {
            success: true,
            message: "Vital signs recorded successfully",
            data,
        }),
    ))
}

/// GET /api/vitals?days=7
pub async fn handle_list_vitals(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<VitalsQuery>,
) -> Result<Json<VitalsResponse>, AppError> {
    let days = query.days.filter(|d| *d > 0).unwrap_or(7).min(365);
    let since = Utc::now() - Duration::days(days);

    let records = sqlx::query_as::<_, ActivityRow>(
        "SELECT * FROM activities
         WHERE user_id = $1 AND completed_at >= $2
           AND (heart_rate IS NOT NULL OR blood_oxygen IS NOT NULL OR blood_pressure_systolic IS NOT NULL)
         ORDER BY completed_at DESC LIMIT $3",
    )
    .bind(user.id)
    .bind(since)
    .bind(MAX_RECORDS)
    .fetch_all(&state.db)
    .await?;

    let averages = average_vitals(&records);

    Ok(Json(VitalsResponse {
        success: true,
        data: VitalsSummary {
            count: records.len(),
            records,
            averages,
            period: format!("{days} days"),
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(heart_rate: Option<f64>, blood_oxygen: Option<f64>) -> ActivityRow {
        let raw = serde_json::json!({
            "id": Uuid::new_v4(),
            "userId": Uuid::new_v4(),
            "type": VITALS,
            "name": "Vital Signs Check",
            "duration": 1,
            "intensity": "moderate",
            "calories": 0,
            "caloriesBurned": 0,
            "met": null,
            "quantity": null,
            "completed": true,
            "notes": null,
            "heartRate": heart_rate,
            "restingHeartRate": null,
            "bloodOxygen": blood_oxygen,
            "bloodPressureSystolic": null,
            "bloodPressureDiastolic": null,
            "heartRateVariability": null,
            "completedAt": Utc::now(),
            "createdAt": Utc::now(),
        });
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_averages_skip_missing_fields() {
        let records = vec![
            record(Some(70.0), Some(98.0)),
            record(Some(75.0), None),
            record(None, Some(97.0)),
        ];
        let avg = average_vitals(&records);
        assert_eq!(avg.heart_rate, 72.5);
        assert_eq!(avg.blood_oxygen, 97.5);
        assert_eq!(avg.resting_heart_rate, 0.0);
    }

    #[test]
    fn test_averages_round_to_one_decimal() {
        let records = vec![
            record(Some(70.0), None),
            record(Some(71.0), None),
            record(Some(71.0), None),
        ];
        assert_eq!(average_vitals(&records).heart_rate, 70.7);
    }

    #[test]
    fn test_empty_reading_is_rejected() {
        assert!(!VitalsReading::default().has_any());
        let reading = VitalsReading {
            blood_oxygen: Some(97.0),
            ..Default::default()
        };
        assert!(reading.has_any());
    }
}
