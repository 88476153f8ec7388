//! 投稿レコードからテキスト表現と手設計特徴量を作る。
use std::borrow::Cow;

use ndarray::Array2;
use sprs::{CsMat, TriMat};

use super::keywords::{KEYWORD_COUNT, MISINFO_MATCHER};
use super::tokenizer::{clickbait_words, is_shouting};
use super::vectorizer::{MAX_VOCABULARY, TextVectorizer};
use crate::schema::PostRecord;

/// 未知または欠損 subreddit のリスク値。
pub const DEFAULT_SUBREDDIT_RISK: f64 = 0.4;

/// 手設計特徴量の列数: [clickbait, subreddit_risk, rank_decay, keyword_flags...]
pub const ENGINEERED_WIDTH: usize = 3 + KEYWORD_COUNT;

const SUBREDDIT_RISK: [(&str, f64); 6] = [
    ("conspiracy", 1.0),
    ("the_donald", 0.9),
    ("conspiracy_commons", 0.85),
    ("politics", 0.6),
    ("news", 0.3),
    ("science", 0.1),
];

const CAPS_WEIGHT: f64 = 0.5;
const EXCLAMATION_WEIGHT: f64 = 0.3;
const KEYWORD_WEIGHT: f64 = 0.2;

/// クリックベイトらしさ（0〜1）。
///
/// 全大文字語の割合、感嘆符密度（3個で飽和）、誤情報キーワード数（3個で飽和）の加重和。
#[must_use]
pub fn clickbait_subscore(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    let words = clickbait_words(text);
    if words.is_empty() {
        return 0.0;
    }
    let shouting = words.iter().filter(|word| is_shouting(word)).count();
    #[allow(clippy::cast_precision_loss)]
    let caps_fraction = shouting as f64 / words.len() as f64;

    #[allow(clippy::cast_precision_loss)]
    let exclamation = (text.matches('!').count() as f64 / 3.0).min(1.0);

    #[allow(clippy::cast_precision_loss)]
    let sensational = (MISINFO_MATCHER.count(text) as f64 / 3.0).min(1.0);

    (CAPS_WEIGHT * caps_fraction + EXCLAMATION_WEIGHT * exclamation + KEYWORD_WEIGHT * sensational)
        .clamp(0.0, 1.0)
}

/// subreddit 名のリスク値（大文字小文字を無視）。
#[must_use]
pub fn subreddit_risk(name: Option<&str>) -> f64 {
    let Some(name) = name.filter(|name| !name.is_empty()) else {
        return DEFAULT_SUBREDDIT_RISK;
    };
    let lowered = name.to_lowercase();
    SUBREDDIT_RISK
        .iter()
        .find(|(known, _)| *known == lowered)
        .map_or(DEFAULT_SUBREDDIT_RISK, |(_, risk)| *risk)
}

/// 検索順位の逆数。欠損や 0 以下は 0。
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rank_decay(rank: Option<i64>) -> f64 {
    match rank {
        Some(rank) if rank >= 1 => 1.0 / rank as f64,
        _ => 0.0,
    }
}

/// `MISINFO_KEYWORDS` の各語について部分一致なら 1、そうでなければ 0。
#[must_use]
pub fn keyword_flags(text: &str) -> [f64; KEYWORD_COUNT] {
    let mut flags = [0.0; KEYWORD_COUNT];
    for (slot, hit) in flags.iter_mut().zip(MISINFO_MATCHER.presence(text)) {
        if hit {
            *slot = 1.0;
        }
    }
    flags
}

/// 1 レコード分の手設計特徴量。
#[must_use]
pub fn engineered_row(text: &str, subreddit: Option<&str>, rank: Option<i64>) -> [f64; ENGINEERED_WIDTH] {
    let mut row = [0.0; ENGINEERED_WIDTH];
    row[0] = clickbait_subscore(text);
    row[1] = subreddit_risk(subreddit);
    row[2] = rank_decay(rank);
    row[3..].copy_from_slice(&keyword_flags(text));
    row
}

/// テキスト表現と手設計特徴量の組。
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    /// (レコード数 × 語彙数) の TF-IDF 行列。
    pub text: CsMat<f64>,
    /// (レコード数 × `ENGINEERED_WIDTH`) の行列。
    pub engineered: Array2<f64>,
    vectorizer_fingerprint: u64,
}

impl FeatureMatrix {
    #[must_use]
    pub fn rows(&self) -> usize {
        self.engineered.nrows()
    }

    /// 結合後の列数（語彙数 + `ENGINEERED_WIDTH`）。
    #[must_use]
    pub fn width(&self) -> usize {
        self.text.cols() + self.engineered.ncols()
    }

    /// テキスト表現を作ったベクトライザの識別子。
    #[must_use]
    pub fn vectorizer_fingerprint(&self) -> u64 {
        self.vectorizer_fingerprint
    }

    /// テキスト列の後ろに手設計列を横連結した CSR 行列。
    #[must_use]
    pub fn design_matrix(&self) -> CsMat<f64> {
        let offset = self.text.cols();
        let mut triplets = TriMat::new((self.rows(), self.width()));
        for (row, vector) in self.text.outer_iterator().enumerate() {
            for (col, &value) in vector.iter() {
                triplets.add_triplet(row, col, value);
            }
        }
        for ((row, col), &value) in self.engineered.indexed_iter() {
            if value != 0.0 {
                triplets.add_triplet(row, offset + col, value);
            }
        }
        triplets.to_csr()
    }
}

/// 全レコードのテキスト（タイトル + スニペット）。
#[must_use]
pub fn record_texts(records: &[PostRecord]) -> Vec<String> {
    records.iter().map(PostRecord::text).collect()
}

/// 特徴量行列を構築する。ベクトライザが無ければこのレコード群で新しく fit する。
#[must_use]
pub fn build_feature_matrix<'a>(
    records: &[PostRecord],
    vectorizer: Option<&'a TextVectorizer>,
) -> (FeatureMatrix, Cow<'a, TextVectorizer>) {
    let texts = record_texts(records);
    let vectorizer = match vectorizer {
        Some(existing) => Cow::Borrowed(existing),
        None => Cow::Owned(TextVectorizer::fit(&texts, MAX_VOCABULARY)),
    };
    let matrix = assemble(records, &texts, &vectorizer);
    (matrix, vectorizer)
}

/// 既存のベクトライザで特徴量行列を作る。
#[must_use]
pub fn transform_features(records: &[PostRecord], vectorizer: &TextVectorizer) -> FeatureMatrix {
    let texts = record_texts(records);
    assemble(records, &texts, vectorizer)
}

fn assemble(records: &[PostRecord], texts: &[String], vectorizer: &TextVectorizer) -> FeatureMatrix {
    let text = vectorizer.transform(texts);
    let mut engineered = Array2::<f64>::zeros((records.len(), ENGINEERED_WIDTH));
    for (idx, (record, text)) in records.iter().zip(texts).enumerate() {
        let row = engineered_row(text, record.subreddit.as_deref(), record.rank);
        for (col, value) in row.into_iter().enumerate() {
            engineered[[idx, col]] = value;
        }
    }
    FeatureMatrix {
        text,
        engineered,
        vectorizer_fingerprint: vectorizer.fingerprint(),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn clickbait_is_zero_for_empty_or_wordless_text() {
        assert!(clickbait_subscore("").abs() < f64::EPSILON);
        assert!(clickbait_subscore("123 456 !!!").abs() < f64::EPSILON);
    }

    #[test]
    fn clickbait_combines_three_signals() {
        // 2/3 shouting, 3 exclamations, 1 keyword ("confirmed")
        let score = clickbait_subscore("CONFIRMED NEWS today!!!");
        let expected = 0.5 * (2.0 / 3.0) + 0.3 * 1.0 + 0.2 * (1.0 / 3.0);
        assert!((score - expected).abs() < 1e-9);
    }

    #[test]
    fn clickbait_stays_within_unit_interval() {
        let extreme = "LEAKED PROOF CONFIRMED SECRET CURE FAKE HOAX SCAM!!!!!!!!!!";
        let score = clickbait_subscore(extreme);
        assert!((0.0..=1.0).contains(&score));
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[rstest]
    #[case(Some("CONSPIRACY"), 1.0)]
    #[case(Some("conspiracy"), 1.0)]
    #[case(Some("Politics"), 0.6)]
    #[case(Some("unknown_sub"), 0.4)]
    #[case(Some(""), 0.4)]
    #[case(None, 0.4)]
    fn subreddit_risk_lookup(#[case] name: Option<&str>, #[case] expected: f64) {
        assert!((subreddit_risk(name) - expected).abs() < f64::EPSILON);
    }

    #[rstest]
    #[case(None, 0.0)]
    #[case(Some(0), 0.0)]
    #[case(Some(-3), 0.0)]
    #[case(Some(1), 1.0)]
    #[case(Some(4), 0.25)]
    fn rank_decay_values(#[case] rank: Option<i64>, #[case] expected: f64) {
        assert!((rank_decay(rank) - expected).abs() < f64::EPSILON);
    }

    #[test]
    fn keyword_flags_have_fixed_length() {
        assert_eq!(keyword_flags("").len(), KEYWORD_COUNT);
        let flags = keyword_flags("this is FAKE, a hoax");
        assert_eq!(flags.len(), KEYWORD_COUNT);
        assert!((flags.iter().sum::<f64>() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn engineered_width_is_constant_with_missing_fields() {
        let records = vec![
            PostRecord::default(),
            PostRecord {
                rank: Some(2),
                title: "Secret cure LEAKED".into(),
                snippet: "proof inside".into(),
                url: "https://reddit.com/r/conspiracy/x".into(),
                subreddit: Some("conspiracy".into()),
                date_hint: None,
            },
        ];
        let (matrix, vectorizer) = build_feature_matrix(&records, None);
        assert_eq!(matrix.engineered.ncols(), ENGINEERED_WIDTH);
        assert_eq!(matrix.rows(), 2);
        assert_eq!(matrix.width(), vectorizer.vocab_len() + ENGINEERED_WIDTH);

        let design = matrix.design_matrix();
        assert_eq!(design.cols(), matrix.width());
        // subreddit_risk column of the empty record falls back to the default
        let risk = matrix.engineered[[0, 1]];
        assert!((risk - DEFAULT_SUBREDDIT_RISK).abs() < f64::EPSILON);
    }

    #[test]
    fn reusing_vectorizer_keeps_dimensions() {
        let train = vec![PostRecord {
            title: "gaming setup".into(),
            ..PostRecord::default()
        }];
        let (_, vectorizer) = build_feature_matrix(&train, None);
        let vectorizer = vectorizer.into_owned();
        let other = vec![PostRecord {
            title: "brand new words everywhere".into(),
            ..PostRecord::default()
        }];
        let (matrix, reused) = build_feature_matrix(&other, Some(&vectorizer));
        assert!(matches!(reused, Cow::Borrowed(_)));
        assert_eq!(matrix.text.cols(), vectorizer.vocab_len());
        assert_eq!(matrix.vectorizer_fingerprint(), vectorizer.fingerprint());
    }
}
