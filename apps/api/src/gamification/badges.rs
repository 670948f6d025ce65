//! Badge catalog and eligibility rules.

use std::collections::HashMap;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeCategory {
    Streak,
    Activity,
    Social,
    Challenge,
    Milestone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

/// What a badge measures. `Count`, `Cumulative`, `Weekly` and `TimeBased` read a
/// named metric from the stats map; the rest read fixed user stats.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Criteria {
    Streak { threshold: f64 },
    SingleActivity { threshold: f64, metric: &'static str },
    Cumulative { threshold: f64, metric: &'static str },
    Count { threshold: f64, metric: &'static str },
    Weekly { threshold: f64, metric: &'static str },
    PerfectChallenges { threshold: f64 },
    EncouragementsGiven { threshold: f64 },
    TotalPoints { threshold: f64 },
    Level { threshold: f64 },
    TimeBased { threshold: f64, metric: &'static str },
}

impl Criteria {
    pub fn threshold(&self) -> f64 {
        match *self {
            Criteria::Streak { threshold }
            | Criteria::SingleActivity { threshold, .. }
            | Criteria::Cumulative { threshold, .. }
            | Criteria::Count { threshold, .. }
            | Criteria::Weekly { threshold, .. }
            | Criteria::PerfectChallenges { threshold }
            | Criteria::EncouragementsGiven { threshold }
            | Criteria::TotalPoints { threshold }
            | Criteria::Level { threshold }
            | Criteria::TimeBased { threshold, .. } => threshold,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Badge {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub category: BadgeCategory,
    pub rarity: Rarity,
    pub criteria: Criteria,
    pub points: i32,
}

/// Snapshot of the numbers badge rules are evaluated against.
/// `metrics` holds named counters (e.g. `meditation`, `total_steps`) supplied by callers.
#[derive(Debug, Clone, Default)]
pub struct BadgeStats {
    pub current_streak: i32,
    pub total_points: i32,
    pub level: i32,
    pub completed_challenges: i32,
    pub metrics: HashMap<String, f64>,
}

impl BadgeStats {
    fn metric(&self, name: &str) -> f64 {
        if name == "challenges_completed" {
            return f64::from(self.completed_challenges);
        }
        self.metrics.get(name).copied().unwrap_or(0.0)
    }

    /// Current value of whatever `criteria` measures.
    pub fn value_for(&self, criteria: &Criteria) -> f64 {
        match criteria {
            Criteria::Streak { .. } => f64::from(self.current_streak),
            Criteria::Count { metric, .. } => self.metric(metric),
            Criteria::Cumulative { metric, .. } => self.metric(&format!("total_{metric}")),
            Criteria::TotalPoints { .. } => f64::from(self.total_points),
            Criteria::Level { .. } => f64::from(self.level.max(1)),
            Criteria::SingleActivity { metric, .. }
            | Criteria::Weekly { metric, .. }
            | Criteria::TimeBased { metric, .. } => self.metric(metric),
            Criteria::PerfectChallenges { .. } => self.metric("perfect_challenges"),
            Criteria::EncouragementsGiven { .. } => self.metric("encouragements_given"),
        }
    }
}

/// Rules that can be evaluated from stored stats. Per-activity, weekly, time-of-day and
/// encouragement badges need event data the service does not aggregate yet.
pub fn is_eligible(badge: &Badge, stats: &BadgeStats) -> bool {
    match badge.criteria {
        Criteria::Streak { .. }
        | Criteria::Count { .. }
        | Criteria::Cumulative { .. }
        | Criteria::TotalPoints { .. }
        | Criteria::Level { .. } => stats.value_for(&badge.criteria) >= badge.criteria.threshold(),
        _ => false,
    }
}

/// Progress toward a badge as a whole percentage, 0 to 100.
pub fn badge_progress(badge: &Badge, stats: &BadgeStats) -> i32 {
    let threshold = badge.criteria.threshold();
    if threshold <= 0.0 {
        return 100;
    }
    let pct = (stats.value_for(&badge.criteria) / threshold * 100.0).min(100.0);
    pct.max(0.0).round() as i32
}

pub fn find_badge(id: &str) -> Option<&'static Badge> {
    BADGES.iter().find(|b| b.id == id)
}

pub static BADGES: [Badge; 23] = [
    // Streak
    Badge {
        id: "streak_1",
        name: "First Step",
        description: "Start your wellness journey with your first day",
        icon: "✨",
        category: BadgeCategory::Streak,
        rarity: Rarity::Common,
        criteria: Criteria::Streak { threshold: 1.0 },
        points: 10,
    },
    Badge {
        id: "streak_7",
        name: "7-Day Warrior",
        description: "Complete activities for 7 days in a row",
        icon: "🔥",
        category: BadgeCategory::Streak,
        rarity: Rarity::Common,
        criteria: Criteria::Streak { threshold: 7.0 },
        points: 100,
    },
    Badge {
        id: "streak_30",
        name: "Monthly Champion",
        description: "Maintain a 30-day streak",
        icon: "⚡",
        category: BadgeCategory::Streak,
        rarity: Rarity::Rare,
        criteria: Criteria::Streak { threshold: 30.0 },
        points: 500,
    },
    Badge {
        id: "streak_100",
        name: "Century Master",
        description: "Achieve a 100-day streak",
        icon: "👑",
        category: BadgeCategory::Streak,
        rarity: Rarity::Epic,
        criteria: Criteria::Streak { threshold: 100.0 },
        points: 2000,
    },
    Badge {
        id: "streak_365",
        name: "Year Legend",
        description: "Complete a full year streak",
        icon: "🏆",
        category: BadgeCategory::Streak,
        rarity: Rarity::Legendary,
        criteria: Criteria::Streak { threshold: 365.0 },
        points: 10000,
    },
    // Activity
    Badge {
        id: "steps_10k",
        name: "Step Master",
        description: "Walk 10,000 steps in a single day",
        icon: "👟",
        category: BadgeCategory::Activity,
        rarity: Rarity::Common,
        criteria: Criteria::SingleActivity { threshold: 10_000.0, metric: "steps" },
        points: 50,
    },
    Badge {
        id: "steps_million",
        name: "Million Steps",
        description: "Accumulate 1 million total steps",
        icon: "🎖️",
        category: BadgeCategory::Activity,
        rarity: Rarity::Epic,
        criteria: Criteria::Cumulative { threshold: 1_000_000.0, metric: "steps" },
        points: 1500,
    },
    Badge {
        id: "meditation_100",
        name: "Zen Master",
        description: "Complete 100 meditation sessions",
        icon: "🧘",
        category: BadgeCategory::Activity,
        rarity: Rarity::Rare,
        criteria: Criteria::Count { threshold: 100.0, metric: "meditation" },
        points: 750,
    },
    Badge {
        id: "workout_50",
        name: "Fitness Fanatic",
        description: "Complete 50 workout sessions",
        icon: "💪",
        category: BadgeCategory::Activity,
        rarity: Rarity::Rare,
        criteria: Criteria::Count { threshold: 50.0, metric: "exercise" },
        points: 600,
    },
    Badge {
        id: "calories_5k",
        name: "Calorie Crusher",
        description: "Burn 5,000 calories in a week",
        icon: "🔥",
        category: BadgeCategory::Activity,
        rarity: Rarity::Rare,
        criteria: Criteria::Weekly { threshold: 5000.0, metric: "calories" },
        points: 400,
    },
    // Challenge
    Badge {
        id: "challenge_1",
        name: "Challenge Starter",
        description: "Complete your first challenge",
        icon: "🎯",
        category: BadgeCategory::Challenge,
        rarity: Rarity::Common,
        criteria: Criteria::Count { threshold: 1.0, metric: "challenges_completed" },
        points: 50,
    },
    Badge {
        id: "challenge_10",
        name: "Challenge Veteran",
        description: "Complete 10 challenges",
        icon: "🏅",
        category: BadgeCategory::Challenge,
        rarity: Rarity::Common,
        criteria: Criteria::Count { threshold: 10.0, metric: "challenges_completed" },
        points: 250,
    },
    Badge {
        id: "challenge_50",
        name: "Challenge Elite",
        description: "Complete 50 challenges",
        icon: "⭐",
        category: BadgeCategory::Challenge,
        rarity: Rarity::Rare,
        criteria: Criteria::Count { threshold: 50.0, metric: "challenges_completed" },
        points: 1000,
    },
    Badge {
        id: "challenge_perfect",
        name: "Perfectionist",
        description: "Complete 5 challenges with 100% success",
        icon: "💎",
        category: BadgeCategory::Challenge,
        rarity: Rarity::Epic,
        criteria: Criteria::PerfectChallenges { threshold: 5.0 },
        points: 1200,
    },
    // Social
    Badge {
        id: "social_10",
        name: "Social Butterfly",
        description: "Make 10 social interactions",
        icon: "🦋",
        category: BadgeCategory::Social,
        rarity: Rarity::Common,
        criteria: Criteria::Count { threshold: 10.0, metric: "social_interactions" },
        points: 100,
    },
    Badge {
        id: "social_100",
        name: "Community Leader",
        description: "Reach 100 social interactions",
        icon: "🌟",
        category: BadgeCategory::Social,
        rarity: Rarity::Rare,
        criteria: Criteria::Count { threshold: 100.0, metric: "social_interactions" },
        points: 500,
    },
    Badge {
        id: "motivator",
        name: "Motivator",
        description: "Encourage 25 other users",
        icon: "💬",
        category: BadgeCategory::Social,
        rarity: Rarity::Rare,
        criteria: Criteria::EncouragementsGiven { threshold: 25.0 },
        points: 400,
    },
    // Milestone
    Badge {
        id: "points_1k",
        name: "Point Collector",
        description: "Earn 1,000 total points",
        icon: "💰",
        category: BadgeCategory::Milestone,
        rarity: Rarity::Common,
        criteria: Criteria::TotalPoints { threshold: 1000.0 },
        points: 0,
    },
    Badge {
        id: "points_10k",
        name: "Point Master",
        description: "Earn 10,000 total points",
        icon: "💎",
        category: BadgeCategory::Milestone,
        rarity: Rarity::Rare,
        criteria: Criteria::TotalPoints { threshold: 10_000.0 },
        points: 0,
    },
    Badge {
        id: "level_10",
        name: "Level 10 Hero",
        description: "Reach level 10",
        icon: "🎮",
        category: BadgeCategory::Milestone,
        rarity: Rarity::Rare,
        criteria: Criteria::Level { threshold: 10.0 },
        points: 0,
    },
    Badge {
        id: "level_25",
        name: "Level 25 Legend",
        description: "Reach level 25",
        icon: "👑",
        category: BadgeCategory::Milestone,
        rarity: Rarity::Epic,
        criteria: Criteria::Level { threshold: 25.0 },
        points: 0,
    },
    Badge {
        id: "early_bird",
        name: "Early Bird",
        description: "Complete 10 morning activities",
        icon: "🌅",
        category: BadgeCategory::Activity,
        rarity: Rarity::Common,
        criteria: Criteria::TimeBased { threshold: 10.0, metric: "morning_activities" },
        points: 150,
    },
    Badge {
        id: "night_owl",
        name: "Night Owl",
        description: "Complete 10 evening activities",
        icon: "🌙",
        category: BadgeCategory::Activity,
        rarity: Rarity::Common,
        criteria: Criteria::TimeBased { threshold: 10.0, metric: "evening_activities" },
        points: 150,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(streak: i32, points: i32, level: i32, completed: i32) -> BadgeStats {
        BadgeStats {
            current_streak: streak,
            total_points: points,
            level,
            completed_challenges: completed,
            metrics: HashMap::new(),
        }
    }

    #[test]
    fn test_badge_ids_are_unique() {
        let mut ids: Vec<_> = BADGES.iter().map(|b| b.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), BADGES.len());
    }

    #[test]
    fn test_streak_badges() {
        let s = stats(7, 0, 1, 0);
        assert!(is_eligible(find_badge("streak_1").unwrap(), &s));
        assert!(is_eligible(find_badge("streak_7").unwrap(), &s));
        assert!(!is_eligible(find_badge("streak_30").unwrap(), &s));
    }

    #[test]
    fn test_challenge_count_reads_completed_challenges() {
        let s = stats(0, 0, 1, 1);
        assert!(is_eligible(find_badge("challenge_1").unwrap(), &s));
        assert!(!is_eligible(find_badge("challenge_10").unwrap(), &s));
    }

    #[test]
    fn test_metric_badges_use_supplied_counters() {
        let mut s = stats(0, 0, 1, 0);
        s.metrics.insert("meditation".to_string(), 100.0);
        s.metrics.insert("total_steps".to_string(), 1_200_000.0);
        assert!(is_eligible(find_badge("meditation_100").unwrap(), &s));
        assert!(is_eligible(find_badge("steps_million").unwrap(), &s));
    }

    #[test]
    fn test_milestone_badges() {
        let s = stats(0, 10_500, 16, 0);
        assert!(is_eligible(find_badge("points_1k").unwrap(), &s));
        assert!(is_eligible(find_badge("points_10k").unwrap(), &s));
        assert!(is_eligible(find_badge("level_10").unwrap(), &s));
        assert!(!is_eligible(find_badge("level_25").unwrap(), &s));
    }

    #[test]
    fn test_event_badges_are_never_awarded_from_stats() {
        let mut s = stats(0, 0, 1, 0);
        s.metrics.insert("morning_activities".to_string(), 50.0);
        assert!(!is_eligible(find_badge("early_bird").unwrap(), &s));
    }

    #[test]
    fn test_badge_progress_is_clamped() {
        let s = stats(3, 0, 1, 0);
        assert_eq!(badge_progress(find_badge("streak_7").unwrap(), &s), 43);
        assert_eq!(badge_progress(find_badge("streak_1").unwrap(), &s), 100);
    }
}
