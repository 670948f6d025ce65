use serde::Serialize;

/// Total points required to reach each level; index 0 is level 1.
pub const LEVEL_THRESHOLDS: [i32; 30] = [
    0, 100, 250, 500, 800, 1200, 1700, 2300, 3000, 3800, 4700, 5700, 6800, 8000, 9300, 10700,
    12200, 13800, 15500, 17300, 19200, 21200, 23300, 25500, 27800, 30200, 32700, 35300, 38000,
    40800,
];

/// Points past the last threshold needed for the (open-ended) next level.
const BEYOND_MAX_LEVEL_POINTS: i32 = 1000;

pub fn calculate_level(points: i32) -> i32 {
    LEVEL_THRESHOLDS
        .iter()
        .rposition(|&threshold| points >= threshold)
        .map(|idx| idx as i32 + 1)
        .unwrap_or(1)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    pub current_level: i32,
    pub next_level: i32,
    pub current_level_points: i32,
    pub next_level_points: i32,
    /// 0.0 to 100.0
    pub progress: f64,
    pub points_to_next: i32,
}

pub fn level_progress(points: i32) -> LevelProgress {
    let current_level = calculate_level(points);
    let idx = (current_level - 1) as usize;
    let current_level_points = LEVEL_THRESHOLDS[idx];
    let next_level_points = LEVEL_THRESHOLDS
        .get(idx + 1)
        .copied()
        .unwrap_or(LEVEL_THRESHOLDS[LEVEL_THRESHOLDS.len() - 1] + BEYOND_MAX_LEVEL_POINTS);

    let span = (next_level_points - current_level_points) as f64;
    let progress = ((points - current_level_points) as f64 / span * 100.0).clamp(0.0, 100.0);

    LevelProgress {
        current_level,
        next_level: current_level + 1,
        current_level_points,
        next_level_points,
        progress,
        points_to_next: (next_level_points - points).max(0),
    }
}
