//! 誤情報らしさ分類のための高水準API。
pub mod features;
pub mod keywords;
pub mod labeler;
pub mod model;
pub mod tokenizer;
pub mod vectorizer;

use serde::{Deserialize, Serialize};

use crate::schema::PostRecord;

use self::features::{FeatureMatrix, build_feature_matrix, transform_features};
use self::model::{ClassifierError, FitOptions, LogisticRegression};
use self::vectorizer::TextVectorizer;

/// 二値ラベル。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Normal,
    Misinformation,
}

impl Label {
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::Misinformation => 1,
        }
    }

    #[must_use]
    pub fn is_positive(self) -> bool {
        matches!(self, Self::Misinformation)
    }
}

/// ラベル付きの学習例。特徴量は fit 時にベクトライザと一緒に作る。
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledExample {
    pub record: PostRecord,
    pub label: Label,
}

impl LabeledExample {
    #[must_use]
    pub fn new(record: PostRecord, label: Label) -> Self {
        Self { record, label }
    }
}

/// ベクトライザと、それで作った特徴量で学習した分類器の組。
///
/// 推論時は必ず同じベクトライザで変換するので、別の fit の語彙が混ざることはない。
#[derive(Debug, Clone)]
pub struct TrainedModel {
    vectorizer: TextVectorizer,
    classifier: LogisticRegression,
}

impl TrainedModel {
    /// 新しいベクトライザを fit し、その特徴量で分類器を学習する。
    ///
    /// # Errors
    /// 学習データが空、または単一クラスの場合はエラーを返す。
    pub fn fit(examples: &[LabeledExample], options: &FitOptions) -> Result<Self, ClassifierError> {
        let records: Vec<PostRecord> = examples.iter().map(|ex| ex.record.clone()).collect();
        let labels: Vec<Label> = examples.iter().map(|ex| ex.label).collect();
        let (matrix, vectorizer) = build_feature_matrix(&records, None);
        let classifier = LogisticRegression::fit(&matrix.design_matrix(), &labels, options)?;
        let model = Self {
            vectorizer: vectorizer.into_owned(),
            classifier,
        };
        model.check_width()?;
        Ok(model)
    }

    /// このモデルのベクトライザで特徴量を作る。
    #[must_use]
    pub fn features(&self, records: &[PostRecord]) -> FeatureMatrix {
        transform_features(records, &self.vectorizer)
    }

    /// 特徴量行列に対する陽性確率。
    ///
    /// # Errors
    /// 別のベクトライザで作られた行列や、列数の異なる行列はエラー。
    pub fn predict_features(&self, matrix: &FeatureMatrix) -> Result<Vec<f64>, ClassifierError> {
        if matrix.vectorizer_fingerprint() != self.vectorizer.fingerprint() {
            return Err(ClassifierError::VectorizerMismatch {
                expected: self.vectorizer.fingerprint(),
                actual: matrix.vectorizer_fingerprint(),
            });
        }
        self.classifier.predict_proba(&matrix.design_matrix())
    }

    /// レコード列に対する陽性確率。
    ///
    /// # Errors
    /// `predict_features` と同じ。
    pub fn predict_proba(&self, records: &[PostRecord]) -> Result<Vec<f64>, ClassifierError> {
        self.predict_features(&self.features(records))
    }

    /// ラベル付き例に対する正解率。
    ///
    /// # Errors
    /// 列数が学習時と一致しない場合はエラー。
    pub fn accuracy(&self, examples: &[LabeledExample]) -> Result<f64, ClassifierError> {
        let records: Vec<PostRecord> = examples.iter().map(|ex| ex.record.clone()).collect();
        let labels: Vec<Label> = examples.iter().map(|ex| ex.label).collect();
        let matrix = self.features(&records);
        self.classifier.accuracy(&matrix.design_matrix(), &labels)
    }

    /// 語彙数 + 手設計特徴量の列数。
    #[must_use]
    pub fn feature_width(&self) -> usize {
        self.classifier.width()
    }

    #[must_use]
    pub fn vectorizer(&self) -> &TextVectorizer {
        &self.vectorizer
    }

    fn check_width(&self) -> Result<(), ClassifierError> {
        let expected = self.vectorizer.vocab_len() + features::ENGINEERED_WIDTH;
        if self.classifier.width() == expected {
            Ok(())
        } else {
            Err(ClassifierError::WidthMismatch {
                expected,
                actual: self.classifier.width(),
            })
        }
    }
}
