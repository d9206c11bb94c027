use serde::{Deserialize, Serialize};

use crate::seating;

/// Weekly-score cutoffs for rank assignment. A score at or above `good` is
/// Good, at or above `fair` is Fair, at or above `pass` is Pass, else Fail.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankThresholds {
    pub good: i64,
    pub fair: i64,
    pub pass: i64,
}

/// Point value each weekly rank converts to for the semester average.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankPoints {
    pub good: f64,
    pub fair: f64,
    pub pass: f64,
    pub fail: f64,
}

/// Cutoffs applied to the converted-points average for the semester rank.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterThresholds {
    pub good: f64,
    pub fair: f64,
    pub pass: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorItem {
    pub id: String,
    pub label: String,
    /// Negative for violations, positive for good behaviors.
    pub points: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorConfig {
    pub violations: Vec<BehaviorItem>,
    pub positives: Vec<BehaviorItem>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatingConfig {
    pub rows: usize,
    pub cols: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// ISO date (YYYY-MM-DD) the week numbering counts from.
    pub semester_start_date: String,
    pub thresholds: RankThresholds,
    pub default_score: i64,
    pub rank_scores: RankPoints,
    pub semester_thresholds: SemesterThresholds,
    pub behavior_config: BehaviorConfig,
    pub seating: SeatingConfig,
}

fn item(id: &str, label: &str, points: i64) -> BehaviorItem {
    BehaviorItem {
        id: id.to_string(),
        label: label.to_string(),
        points,
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            semester_start_date: chrono::Local::now().date_naive().to_string(),
            thresholds: RankThresholds {
                good: 80,
                fair: 65,
                pass: 50,
            },
            default_score: 100,
            rank_scores: RankPoints {
                good: 10.0,
                fair: 8.0,
                pass: 6.0,
                fail: 4.0,
            },
            semester_thresholds: SemesterThresholds {
                good: 9.0,
                fair: 7.0,
                pass: 5.0,
            },
            behavior_config: BehaviorConfig {
                violations: vec![
                    item("v1", "Talking in class", -2),
                    item("v2", "Homework not done", -5),
                    item("v3", "Late for class", -2),
                    item("v4", "Lesson not prepared", -5),
                    item("v5", "Disruptive behavior", -2),
                    item("v6", "Uniform violation", -2),
                    item("v7", "Fighting", -20),
                    item("v8", "Disrespecting the teacher", -20),
                ],
                positives: vec![
                    item("p1", "Active participation", 1),
                    item("p2", "Excellent classwork", 2),
                    item("p3", "Improved from last week", 5),
                    item("p4", "Classroom duty well done", 2),
                    item("p5", "Helping classmates", 2),
                ],
            },
            seating: SeatingConfig {
                rows: seating::DEFAULT_ROWS,
                cols: seating::DEFAULT_COLS,
            },
        }
    }
}

impl Settings {
    pub fn find_behavior(&self, behavior_id: &str) -> Option<&BehaviorItem> {
        self.behavior_config
            .violations
            .iter()
            .chain(self.behavior_config.positives.iter())
            .find(|b| b.id == behavior_id)
    }
}
