//! 特徴量抽出と集計の結合テスト。

use clipcheck::classification::features::{
    ENGINEERED_WIDTH, build_feature_matrix, clickbait_subscore, keyword_flags, subreddit_risk,
};
use clipcheck::classification::keywords::KEYWORD_COUNT;
use clipcheck::schema::PostRecord;
use clipcheck::scoring::{CohortStatistics, RiskTier, ScoreResult};

fn record(title: &str, subreddit: Option<&str>, rank: Option<i64>) -> PostRecord {
    PostRecord {
        rank,
        title: title.to_string(),
        snippet: String::new(),
        url: String::new(),
        subreddit: subreddit.map(ToString::to_string),
        date_hint: None,
    }
}

#[test]
fn sensational_rows_outscore_neutral_rows() {
    let records = vec![
        record("CONFIRMED!!! leaked proof", Some("conspiracy"), Some(1)),
        record("CONFIRMED!!! leaked proof", Some("conspiracy"), Some(1)),
        record("Looking for co-op recommendations", Some("gaming"), Some(1)),
        record("Weekly screenshot thread", Some("gaming"), Some(1)),
    ];
    let (matrix, _vectorizer) = build_feature_matrix(&records, None);
    let engineered = &matrix.engineered;

    for sensational in 0..2 {
        for neutral in 2..4 {
            assert!(engineered[[sensational, 0]] > engineered[[neutral, 0]]);
            assert!(engineered[[sensational, 1]] > engineered[[neutral, 1]]);
        }
    }
}

#[test]
fn engineered_width_is_invariant_with_missing_fields() {
    let records = vec![
        record("", None, None),
        record("Title only", None, Some(-3)),
        PostRecord {
            snippet: "snippet only".into(),
            ..PostRecord::default()
        },
    ];
    let (matrix, vectorizer) = build_feature_matrix(&records, None);
    assert_eq!(matrix.engineered.ncols(), ENGINEERED_WIDTH);
    assert_eq!(matrix.engineered.nrows(), 3);
    assert_eq!(matrix.width(), vectorizer.vocab_len() + 3 + KEYWORD_COUNT);
    for row in matrix.engineered.rows() {
        assert!(row[2].abs() < f64::EPSILON, "rank decay should be zero");
    }
}

#[test]
fn pure_feature_properties_hold() {
    for text in ["", "!!!!!!", "ALL CAPS SHOUTING", "fake hoax scam rumor cure", "ok"] {
        let score = clickbait_subscore(text);
        assert!((0.0..=1.0).contains(&score), "{text:?} -> {score}");
        assert_eq!(keyword_flags(text).len(), KEYWORD_COUNT);
    }
    assert!(clickbait_subscore("").abs() < f64::EPSILON);
    assert!((subreddit_risk(Some("CONSPIRACY")) - 1.0).abs() < f64::EPSILON);
    assert!((subreddit_risk(None) - subreddit_risk(Some("unknown_sub"))).abs() < f64::EPSILON);
}

#[test]
fn cohort_statistics_summarize_mixed_scores() {
    let scores: Vec<ScoreResult> = [0.9, 0.5, 0.1]
        .into_iter()
        .map(|probability| ScoreResult {
            probability,
            risk_tier: RiskTier::from_probability(probability),
            clickbait: 0.0,
            keywords: Vec::new(),
        })
        .collect();

    let stats = CohortStatistics::from_scores(&scores).expect("non-empty cohort");

    assert!((stats.mean_percent() - 50.0).abs() < 1e-9);
    assert!((stats.max_percent() - 90.0).abs() < 1e-9);
    assert!((stats.min_percent() - 10.0).abs() < 1e-9);
    assert_eq!(stats.high_risk_count, 1);
    assert_eq!(stats.medium_risk_count, 1);
    assert_eq!(stats.low_risk_count, 1);
}
