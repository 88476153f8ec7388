//! 学習済みモデルによる投稿ごとのスコアと説明。
use serde::Serialize;

use crate::classification::TrainedModel;
use crate::classification::features::clickbait_subscore;
use crate::classification::keywords::EXPLANATION_MATCHER;
use crate::classification::model::ClassifierError;
use crate::schema::PostRecord;

pub const HIGH_RISK_PERCENT: f64 = 70.0;
pub const MEDIUM_RISK_PERCENT: f64 = 40.0;

/// 確率から導く粗いリスク区分。下限を含み上限を含まない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    #[must_use]
    pub fn from_percent(percent: f64) -> Self {
        if percent >= HIGH_RISK_PERCENT {
            Self::High
        } else if percent >= MEDIUM_RISK_PERCENT {
            Self::Medium
        } else {
            Self::Low
        }
    }

    #[must_use]
    pub fn from_probability(probability: f64) -> Self {
        Self::from_percent(probability * 100.0)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreResult {
    /// 誤情報ラベルの確率（0〜1）。
    pub probability: f64,
    pub risk_tier: RiskTier,
    pub clickbait: f64,
    pub keywords: Vec<&'static str>,
}

impl ScoreResult {
    #[must_use]
    pub fn from_probability(record: &PostRecord, probability: f64) -> Self {
        let text = record.text();
        Self {
            probability,
            risk_tier: RiskTier::from_probability(probability),
            clickbait: clickbait_subscore(&text),
            keywords: EXPLANATION_MATCHER.matched(&text),
        }
    }

    #[must_use]
    pub fn percent(&self) -> f64 {
        self.probability * 100.0
    }
}

/// 各レコードをスコアリングする。結果はレコードと同じ順序。
///
/// # Errors
/// モデルと特徴量の幅やベクトライザが一致しない場合は `ClassifierError`。
pub fn score_posts(
    model: &TrainedModel,
    records: &[PostRecord],
) -> Result<Vec<ScoreResult>, ClassifierError> {
    let probabilities = model.predict_proba(records)?;
    Ok(records
        .iter()
        .zip(probabilities)
        .map(|(record, probability)| ScoreResult::from_probability(record, probability))
        .collect())
}
