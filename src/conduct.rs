use serde::Serialize;

use crate::seating::AcademicRank;
use crate::settings::Settings;

pub const MIN_SCORE: i64 = 0;
pub const MAX_SCORE: i64 = 100;

pub fn clamp_score(score: i64) -> i64 {
    score.clamp(MIN_SCORE, MAX_SCORE)
}

pub fn rank_from_score(score: i64, settings: &Settings) -> AcademicRank {
    let t = &settings.thresholds;
    if score >= t.good {
        AcademicRank::Good
    } else if score >= t.fair {
        AcademicRank::Fair
    } else if score >= t.pass {
        AcademicRank::Pass
    } else {
        AcademicRank::Fail
    }
}

fn rank_points(rank: AcademicRank, settings: &Settings) -> f64 {
    let p = &settings.rank_scores;
    match rank {
        AcademicRank::Good => p.good,
        AcademicRank::Fair => p.fair,
        AcademicRank::Pass => p.pass,
        AcademicRank::Fail => p.fail,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterSummary {
    /// Plain average of the weekly scores, rounded to the nearest integer.
    pub avg_raw: i64,
    /// Average of the converted rank points, rounded to two decimals.
    pub avg_converted: f64,
    /// None when the student has no records in the requested range.
    pub rank: Option<AcademicRank>,
}

/// Semester conduct rank: each weekly score maps to a weekly rank, each rank
/// to its point value, and the point average maps through the semester
/// thresholds.
pub fn semester_summary(scores: &[i64], settings: &Settings) -> SemesterSummary {
    if scores.is_empty() {
        return SemesterSummary {
            avg_raw: 0,
            avg_converted: 0.0,
            rank: None,
        };
    }

    let total_raw: i64 = scores.iter().sum();
    let total_converted: f64 = scores
        .iter()
        .map(|&s| rank_points(rank_from_score(s, settings), settings))
        .sum();

    let n = scores.len() as f64;
    let avg_raw = (total_raw as f64 / n).round() as i64;
    let avg_converted = (total_converted / n * 100.0).round() / 100.0;

    let t = &settings.semester_thresholds;
    let rank = if avg_converted >= t.good {
        AcademicRank::Good
    } else if avg_converted >= t.fair {
        AcademicRank::Fair
    } else if avg_converted >= t.pass {
        AcademicRank::Pass
    } else {
        AcademicRank::Fail
    };

    SemesterSummary {
        avg_raw,
        avg_converted,
        rank: Some(rank),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekly_rank_threshold_boundaries() {
        let s = Settings::default();
        assert_eq!(rank_from_score(100, &s), AcademicRank::Good);
        assert_eq!(rank_from_score(80, &s), AcademicRank::Good);
        assert_eq!(rank_from_score(79, &s), AcademicRank::Fair);
        assert_eq!(rank_from_score(65, &s), AcademicRank::Fair);
        assert_eq!(rank_from_score(64, &s), AcademicRank::Pass);
        assert_eq!(rank_from_score(50, &s), AcademicRank::Pass);
        assert_eq!(rank_from_score(49, &s), AcademicRank::Fail);
        assert_eq!(rank_from_score(0, &s), AcademicRank::Fail);
    }

    #[test]
    fn clamp_keeps_scores_in_range() {
        assert_eq!(clamp_score(-5), 0);
        assert_eq!(clamp_score(0), 0);
        assert_eq!(clamp_score(83), 83);
        assert_eq!(clamp_score(117), 100);
    }

    #[test]
    fn semester_summary_converts_weekly_ranks_to_points() {
        let s = Settings::default();
        // 85 -> Good (10), 70 -> Fair (8), 40 -> Fail (4).
        let summary = semester_summary(&[85, 70, 40], &s);
        assert_eq!(summary.avg_raw, 65);
        assert_eq!(summary.avg_converted, 7.33);
        assert_eq!(summary.rank, Some(AcademicRank::Fair));
    }

    #[test]
    fn semester_summary_all_good_weeks() {
        let s = Settings::default();
        let summary = semester_summary(&[95, 88, 100, 82], &s);
        assert_eq!(summary.avg_converted, 10.0);
        assert_eq!(summary.rank, Some(AcademicRank::Good));
    }

    #[test]
    fn semester_summary_without_records_has_no_rank() {
        let s = Settings::default();
        let summary = semester_summary(&[], &s);
        assert_eq!(summary.rank, None);
        assert_eq!(summary.avg_raw, 0);
        assert_eq!(summary.avg_converted, 0.0);
    }
}
