//! 投稿ごとのスコアリングと集計。
pub mod scorer;
pub mod stats;

pub use scorer::{RiskTier, ScoreResult, score_posts};
pub use stats::CohortStatistics;
