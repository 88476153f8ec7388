// クラス重み付き L2 正則化ロジスティック回帰。
use ndarray::Array1;
use sprs::CsMat;
use thiserror::Error;
use tracing::debug;

use super::Label;

/// 分類器の学習・推論で起こりうるエラー。
#[derive(Debug, Error, PartialEq)]
pub enum ClassifierError {
    #[error("cannot fit a classifier on an empty training set")]
    EmptyTrainingSet,
    #[error("training set only contains label {0:?}")]
    SingleClass(Label),
    #[error("label count mismatch: {rows} rows but {labels} labels")]
    LabelCount { rows: usize, labels: usize },
    #[error("feature width mismatch: expected {expected}, got {actual}")]
    WidthMismatch { expected: usize, actual: usize },
    #[error("features were built by a different vectorizer fit ({actual:#x} != {expected:#x})")]
    VectorizerMismatch { expected: u64, actual: u64 },
}

impl ClassifierError {
    /// 学習データ不足に起因するエラーか。それ以外は呼び出し側の不整合。
    #[must_use]
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, Self::EmptyTrainingSet | Self::SingleClass(_))
    }
}

/// 最適化パラメータ。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    /// 正則化の逆強度。
    pub c: f64,
    pub max_iter: usize,
    /// 勾配ノルムがこれを下回ったら打ち切る。
    pub tolerance: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 1000,
            tolerance: 1e-6,
        }
    }
}

/// 二値ロジスティック回帰。切片は正則化しない。
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    weights: Array1<f64>,
    intercept: f64,
    iterations: usize,
}

impl LogisticRegression {
    /// 逆頻度のクラス重み（`n / (2 * n_class)`）を付けて全バッチ勾配降下で学習する。
    ///
    /// ステップ幅は目的関数の勾配の Lipschitz 上界の逆数なので、学習率の調整は不要。
    ///
    /// # Errors
    /// 空集合、単一クラス、行数とラベル数の不一致はエラー。
    pub fn fit(
        features: &CsMat<f64>,
        labels: &[Label],
        options: &FitOptions,
    ) -> Result<Self, ClassifierError> {
        let rows = features.rows();
        if labels.len() != rows {
            return Err(ClassifierError::LabelCount {
                rows,
                labels: labels.len(),
            });
        }
        if rows == 0 {
            return Err(ClassifierError::EmptyTrainingSet);
        }
        let positives = labels.iter().filter(|label| label.is_positive()).count();
        if positives == 0 {
            return Err(ClassifierError::SingleClass(Label::Normal));
        }
        if positives == rows {
            return Err(ClassifierError::SingleClass(Label::Misinformation));
        }

        let sample_weights = balanced_weights(labels, positives);
        let targets: Vec<f64> = labels.iter().map(|label| f64::from(label.as_u8())).collect();

        let regularization = 1.0 / options.c;
        let max_row_norm = features
            .outer_iterator()
            .map(|row| row.iter().map(|(_, v)| v * v).sum::<f64>() + 1.0)
            .fold(0.0f64, f64::max);
        let total_weight: f64 = sample_weights.iter().sum();
        let lipschitz = 0.25 * max_row_norm * total_weight + regularization;
        let step = 1.0 / lipschitz;

        let mut weights = Array1::<f64>::zeros(features.cols());
        let mut intercept = 0.0;
        let mut iterations = 0;

        for _ in 0..options.max_iter {
            iterations += 1;
            let mut gradient = &weights * regularization;
            let mut intercept_gradient = 0.0;

            for (idx, row) in features.outer_iterator().enumerate() {
                let margin = intercept + row.iter().map(|(col, v)| v * weights[col]).sum::<f64>();
                let residual = sample_weights[idx] * (sigmoid(margin) - targets[idx]);
                intercept_gradient += residual;
                for (col, value) in row.iter() {
                    gradient[col] += residual * value;
                }
            }

            let norm = (gradient.dot(&gradient) + intercept_gradient * intercept_gradient).sqrt();
            if norm < options.tolerance {
                break;
            }
            weights.scaled_add(-step, &gradient);
            intercept -= step * intercept_gradient;
        }

        debug!(rows, cols = features.cols(), iterations, "fitted logistic regression");

        Ok(Self {
            weights,
            intercept,
            iterations,
        })
    }

    /// 各行の陽性（誤情報）確率。
    ///
    /// # Errors
    /// 列数が学習時と異なる場合は `WidthMismatch`。
    pub fn predict_proba(&self, features: &CsMat<f64>) -> Result<Vec<f64>, ClassifierError> {
        if features.cols() != self.width() {
            return Err(ClassifierError::WidthMismatch {
                expected: self.width(),
                actual: features.cols(),
            });
        }
        Ok(features
            .outer_iterator()
            .map(|row| {
                let margin =
                    self.intercept + row.iter().map(|(col, v)| v * self.weights[col]).sum::<f64>();
                sigmoid(margin)
            })
            .collect())
    }

    /// 0.5 を閾値にしたラベル予測。
    ///
    /// # Errors
    /// `predict_proba` と同じ。
    pub fn predict(&self, features: &CsMat<f64>) -> Result<Vec<Label>, ClassifierError> {
        Ok(self
            .predict_proba(features)?
            .into_iter()
            .map(|p| if p >= 0.5 { Label::Misinformation } else { Label::Normal })
            .collect())
    }

    /// 正解率（0〜1）。
    ///
    /// # Errors
    /// `predict_proba` と同じ。行数とラベル数が異なる場合は `LabelCount`。
    pub fn accuracy(&self, features: &CsMat<f64>, labels: &[Label]) -> Result<f64, ClassifierError> {
        if labels.len() != features.rows() {
            return Err(ClassifierError::LabelCount {
                rows: features.rows(),
                labels: labels.len(),
            });
        }
        if labels.is_empty() {
            return Ok(0.0);
        }
        let predicted = self.predict(features)?;
        let correct = predicted
            .iter()
            .zip(labels)
            .filter(|(lhs, rhs)| lhs == rhs)
            .count();
        #[allow(clippy::cast_precision_loss)]
        let accuracy = correct as f64 / labels.len() as f64;
        Ok(accuracy)
    }

    /// 学習時の特徴量の列数。
    #[must_use]
    pub fn width(&self) -> usize {
        self.weights.len()
    }

    #[must_use]
    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

fn balanced_weights(labels: &[Label], positives: usize) -> Vec<f64> {
    #[allow(clippy::cast_precision_loss)]
    let total = labels.len() as f64;
    #[allow(clippy::cast_precision_loss)]
    let positive_weight = total / (2.0 * positives as f64);
    #[allow(clippy::cast_precision_loss)]
    let negative_weight = total / (2.0 * (labels.len() - positives) as f64);
    labels
        .iter()
        .map(|label| {
            if label.is_positive() {
                positive_weight
            } else {
                negative_weight
            }
        })
        .collect()
}

fn sigmoid(margin: f64) -> f64 {
    if margin >= 0.0 {
        1.0 / (1.0 + (-margin).exp())
    } else {
        let exp = margin.exp();
        exp / (1.0 + exp)
    }
}
