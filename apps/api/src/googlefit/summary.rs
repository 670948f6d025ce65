//! Reduces `dataset:aggregate` responses to the figures the insights page shows.

use serde::{Deserialize, Serialize};

use crate::googlefit::client::FitDataKind;

#[derive(Debug, Default, Deserialize)]
pub struct AggregateResponse {
    #[serde(default)]
    pub bucket: Vec<Bucket>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Bucket {
    #[serde(default)]
    pub dataset: Vec<Dataset>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub point: Vec<Point>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    pub start_time_nanos: Option<String>,
    pub end_time_nanos: Option<String>,
    #[serde(default)]
    pub value: Vec<PointValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointValue {
    pub int_val: Option<i64>,
    pub fp_val: Option<f64>,
}

impl PointValue {
    fn number(&self) -> Option<f64> {
        self.fp_val.or(self.int_val.map(|v| v as f64))
    }
}

impl Point {
    fn nth(&self, i: usize) -> Option<f64> {
        self.value.get(i).and_then(PointValue::number)
    }

    fn minutes(&self) -> f64 {
        let parse = |n: &Option<String>| n.as_deref().and_then(|s| s.parse::<i64>().ok());
        match (parse(&self.start_time_nanos), parse(&self.end_time_nanos)) {
            (Some(start), Some(end)) if end > start => (end - start) as f64 / 60e9,
            _ => 0.0,
        }
    }
}

impl AggregateResponse {
    pub fn has_points(&self) -> bool {
        self.bucket
            .iter()
            .any(|b| b.dataset.iter().any(|d| !d.point.is_empty()))
    }

    /// Points of the `idx`-th requested data type across all buckets.
    fn points(&self, idx: usize) -> impl Iterator<Item = &Point> {
        self.bucket
            .iter()
            .filter_map(move |b| b.dataset.get(idx))
            .flat_map(|d| d.point.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FitSummary {
    #[serde(rename_all = "camelCase")]
    Activity {
        steps: i64,
        calories: f64,
        distance: f64,
        active_minutes: i64,
    },
    #[serde(rename_all = "camelCase")]
    HeartRate {
        heart_rate: Option<i64>,
        resting_heart_rate: Option<i64>,
        max_heart_rate: Option<i64>,
        min_heart_rate: Option<i64>,
    },
    #[serde(rename_all = "camelCase")]
    Sleep {
        sleep_duration: i64,
        deep_sleep: i64,
        light_sleep: i64,
        rem_sleep: i64,
    },
    #[serde(rename_all = "camelCase")]
    Body {
        weight: Option<f64>,
        height: Option<f64>,
        body_fat: Option<f64>,
        bmi: Option<f64>,
    },
}

// Sleep stage codes in com.google.sleep.segment.
const SLEEP_AWAKE: i64 = 1;
const SLEEP_OUT_OF_BED: i64 = 3;
const SLEEP_LIGHT: i64 = 4;
const SLEEP_DEEP: i64 = 5;
const SLEEP_REM: i64 = 6;

pub fn summarize(kind: FitDataKind, data: &AggregateResponse) -> FitSummary {
    match kind {
        FitDataKind::Activity => summarize_activity(data),
        FitDataKind::HeartRate => summarize_heart_rate(data),
        FitDataKind::Sleep => summarize_sleep(data),
        FitDataKind::Body => summarize_body(data),
    }
}

fn summarize_activity(data: &AggregateResponse) -> FitSummary {
    let sum = |idx: usize| -> f64 { data.points(idx).filter_map(|p| p.nth(0)).sum() };
    FitSummary::Activity {
        steps: sum(0).round() as i64,
        calories: (sum(1) * 10.0).round() / 10.0,
        distance: (sum(2) * 10.0).round() / 10.0,
        active_minutes: sum(3).round() as i64,
    }
}

/// Average of the per-bucket means, resting rate as the mean of the lowest
/// tenth of those readings (at least one).
fn summarize_heart_rate(data: &AggregateResponse) -> FitSummary {
    let mut averages: Vec<f64> = data
        .points(0)
        .filter_map(|p| p.nth(0))
        .filter(|v| *v > 0.0)
        .collect();
    let maxima = data.points(0).filter_map(|p| p.nth(1)).reduce(f64::max);
    let minima = data.points(0).filter_map(|p| p.nth(2)).reduce(f64::min);

    if averages.is_empty() {
        return FitSummary::HeartRate {
            heart_rate: None,
            resting_heart_rate: None,
            max_heart_rate: maxima.map(|v| v.round() as i64),
            min_heart_rate: minima.map(|v| v.round() as i64),
        };
    }

    averages.sort_by(f64::total_cmp);
    let mean = |xs: &[f64]| xs.iter().sum::<f64>() / xs.len() as f64;
    let resting_count = (averages.len() / 10).max(1);

    FitSummary::HeartRate {
        heart_rate: Some(mean(&averages).round() as i64),
        resting_heart_rate: Some(mean(&averages[..resting_count]).round() as i64),
        max_heart_rate: maxima.map(|v| v.round() as i64),
        min_heart_rate: minima.map(|v| v.round() as i64),
    }
}

fn summarize_sleep(data: &AggregateResponse) -> FitSummary {
    let (mut total, mut deep, mut light, mut rem) = (0.0, 0.0, 0.0, 0.0);
    for point in data.points(0) {
        let stage = point.value.first().and_then(|v| v.int_val).unwrap_or(0);
        if stage == SLEEP_AWAKE || stage == SLEEP_OUT_OF_BED {
            continue;
        }
        let minutes = point.minutes();
        total += minutes;
        match stage {
            SLEEP_DEEP => deep += minutes,
            SLEEP_LIGHT => light += minutes,
            SLEEP_REM => rem += minutes,
            _ => {}
        }
    }
    FitSummary::Sleep {
        sleep_duration: total.round() as i64,
        deep_sleep: deep.round() as i64,
        light_sleep: light.round() as i64,
        rem_sleep: rem.round() as i64,
    }
}

/// Latest reading of each measurement. Height arrives in metres and is reported in cm.
fn summarize_body(data: &AggregateResponse) -> FitSummary {
    let latest = |idx: usize| data.points(idx).filter_map(|p| p.nth(0)).filter(|v| *v > 0.0).last();
    let weight = latest(0);
    let height_m = latest(1);
    let bmi = match (weight, height_m) {
        (Some(w), Some(h)) => Some((w / (h * h) * 10.0).round() / 10.0),
        _ => None,
    };
    FitSummary::Body {
        weight,
        height: height_m.map(|h| (h * 1000.0).round() / 10.0),
        body_fat: latest(2),
        bmi,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(raw: serde_json::Value) -> AggregateResponse {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_activity_sums_each_dataset() {
        let data = parse(json!({ "bucket": [
            { "dataset": [
                { "point": [{ "value": [{ "intVal": 4000 }] }] },
                { "point": [{ "value": [{ "fpVal": 150.25 }] }] },
                { "point": [{ "value": [{ "fpVal": 3000.0 }] }] },
                { "point": [{ "value": [{ "intVal": 30 }] }] }
            ]},
            { "dataset": [
                { "point": [{ "value": [{ "intVal": 6000 }] }] },
                { "point": [] },
                { "point": [{ "value": [{ "fpVal": 4500.0 }] }] },
                { "point": [{ "value": [{ "intVal": 45 }] }] }
            ]}
        ]}));
        assert!(data.has_points());
        assert_eq!(
            summarize(FitDataKind::Activity, &data),
            FitSummary::Activity {
                steps: 10000,
                calories: 150.3,
                distance: 7500.0,
                active_minutes: 75,
            }
        );
    }

    #[test]
    fn test_heart_rate_resting_from_lowest_readings() {
        let data = parse(json!({ "bucket": [
            { "dataset": [{ "point": [{ "value": [{ "fpVal": 80.0 }, { "fpVal": 150.0 }, { "fpVal": 55.0 }] }] }] },
            { "dataset": [{ "point": [{ "value": [{ "fpVal": 60.0 }, { "fpVal": 170.0 }, { "fpVal": 50.0 }] }] }] },
            { "dataset": [{ "point": [{ "value": [{ "fpVal": 70.0 }, { "fpVal": 140.0 }, { "fpVal": 52.0 }] }] }] }
        ]}));
        assert_eq!(
            summarize(FitDataKind::HeartRate, &data),
            FitSummary::HeartRate {
                heart_rate: Some(70),
                resting_heart_rate: Some(60),
                max_heart_rate: Some(170),
                min_heart_rate: Some(50),
            }
        );
    }

    #[test]
    fn test_sleep_skips_awake_segments() {
        let minute = 60_000_000_000_i64;
        let segment = |stage: i64, start: i64, minutes: i64| {
            json!({
                "startTimeNanos": (start * minute).to_string(),
                "endTimeNanos": ((start + minutes) * minute).to_string(),
                "value": [{ "intVal": stage }]
            })
        };
        let data = parse(json!({ "bucket": [{ "dataset": [{ "point": [
            segment(SLEEP_LIGHT, 0, 200),
            segment(SLEEP_AWAKE, 200, 15),
            segment(SLEEP_DEEP, 215, 70),
            segment(SLEEP_REM, 285, 95)
        ]}]}]}));
        assert_eq!(
            summarize(FitDataKind::Sleep, &data),
            FitSummary::Sleep {
                sleep_duration: 365,
                deep_sleep: 70,
                light_sleep: 200,
                rem_sleep: 95,
            }
        );
    }

    #[test]
    fn test_body_converts_height_and_computes_bmi() {
        let data = parse(json!({ "bucket": [{ "dataset": [
            { "point": [{ "value": [{ "fpVal": 72.0 }] }, { "value": [{ "fpVal": 71.0 }] }] },
            { "point": [{ "value": [{ "fpVal": 1.8 }] }] },
            { "point": [] }
        ]}]}));
        assert_eq!(
            summarize(FitDataKind::Body, &data),
            FitSummary::Body {
                weight: Some(71.0),
                height: Some(180.0),
                body_fat: None,
                bmi: Some(21.9),
            }
        );
    }

    #[test]
    fn test_empty_response_has_no_points() {
        let data = parse(json!({ "bucket": [{ "dataset": [{ "point": [] }] }] }));
        assert!(!data.has_points());
        assert!(!AggregateResponse::default().has_points());
    }

    #[test]
    fn test_summary_serializes_camel_case_without_tag() {
        let json = serde_json::to_value(FitSummary::Activity {
            steps: 1,
            calories: 2.0,
            distance: 3.0,
            active_minutes: 4,
        })
        .unwrap();
        assert_eq!(json["activeMinutes"], 4);
        assert!(json.get("Activity").is_none());
    }
}
