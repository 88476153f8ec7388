use serde::Serialize;

use super::scorer::{RiskTier, ScoreResult};

/// スコア集合の要約。確率は 0〜1 のまま保持する。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortStatistics {
    pub mean: f64,
    pub max: f64,
    pub min: f64,
    pub high_risk_count: usize,
    pub medium_risk_count: usize,
    pub low_risk_count: usize,
}

impl CohortStatistics {
    /// 空の入力は統計が定義されないため `None`。
    #[must_use]
    pub fn from_scores(scores: &[ScoreResult]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }
        let mut stats = Self {
            mean: 0.0,
            max: f64::NEG_INFINITY,
            min: f64::INFINITY,
            high_risk_count: 0,
            medium_risk_count: 0,
            low_risk_count: 0,
        };
        let mut sum = 0.0;
        for score in scores {
            sum += score.probability;
            stats.max = stats.max.max(score.probability);
            stats.min = stats.min.min(score.probability);
            match score.risk_tier {
                RiskTier::High => stats.high_risk_count += 1,
                RiskTier::Medium => stats.medium_risk_count += 1,
                RiskTier::Low => stats.low_risk_count += 1,
            }
        }
        #[allow(clippy::cast_precision_loss)]
        let count = scores.len() as f64;
        stats.mean = sum / count;
        Some(stats)
    }

    #[must_use]
    pub fn mean_percent(&self) -> f64 {
        self.mean * 100.0
    }

    #[must_use]
    pub fn max_percent(&self) -> f64 {
        self.max * 100.0
    }

    #[must_use]
    pub fn min_percent(&self) -> f64 {
        self.min * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(probability: f64) -> ScoreResult {
        ScoreResult {
            probability,
            risk_tier: RiskTier::from_probability(probability),
            clickbait: 0.0,
            keywords: Vec::new(),
        }
    }

    #[test]
    fn empty_cohort_has_no_statistics() {
        assert_eq!(CohortStatistics::from_scores(&[]), None);
    }

    #[test]
    fn single_score_is_mean_max_and_min() {
        let stats = CohortStatistics::from_scores(&[score(0.42)]).expect("stats");
        assert!((stats.mean - 0.42).abs() < 1e-12);
        assert!((stats.max - stats.min).abs() < 1e-12);
        assert_eq!(stats.medium_risk_count, 1);
    }
}
