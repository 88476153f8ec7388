//! データセットの組み立て、学習、評価、全件での再学習。
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::bootstrap::{collect_examples, ensure_trainable};
use super::split::{SPLIT_SEED, SPLIT_THRESHOLD, TEST_FRACTION, stratified_split};
use crate::classification::model::{ClassifierError, FitOptions};
use crate::classification::{LabeledExample, TrainedModel};
use crate::clients::PostSearch;
use crate::config::TrainingMode;
use crate::error::AnalysisError;
use crate::observability::metrics::Metrics;

/// 学習精度が評価精度をこれ以上上回ると過学習の疑いとする。
pub const OVERFITTING_GAP: f64 = 0.15;

/// 学習の概要。レスポンスの `training_info` になる。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub samples: usize,
    /// 分割した場合は学習側、しない場合は全件での正解率。
    pub train_accuracy: f64,
    pub test_accuracy: Option<f64>,
    pub split_performed: bool,
    pub overfitting_suspected: bool,
    pub used_fallback: bool,
    pub failed_topics: usize,
}

/// 推論に使うモデル（常に全件で学習）と、その学習の概要。
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model: Arc<TrainedModel>,
    pub report: TrainingReport,
}

#[derive(Clone)]
pub struct TrainingController {
    search: Arc<dyn PostSearch>,
    per_topic: usize,
    mode: TrainingMode,
    options: FitOptions,
    metrics: Arc<Metrics>,
}

impl TrainingController {
    #[must_use]
    pub fn new(
        search: Arc<dyn PostSearch>,
        per_topic: usize,
        mode: TrainingMode,
        options: FitOptions,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            search,
            per_topic,
            mode,
            options,
            metrics,
        }
    }

    /// 固定トピックからデータを集めて学習する。
    ///
    /// 取得が全滅しても組み込みデータで学習するので、データ不足では失敗しない。
    ///
    /// # Errors
    /// 学習タスクの join 失敗や、モデル内部の不整合があればエラーを返す。
    pub async fn train(&self) -> Result<TrainingOutcome, AnalysisError> {
        let timer = self.metrics.training_duration.start_timer();
        let collected = collect_examples(self.search.as_ref(), self.per_topic, self.mode).await;
        if !collected.failed_topics.is_empty() {
            #[allow(clippy::cast_precision_loss)]
            let failed = collected.failed_topics.len() as f64;
            self.metrics.topic_fetch_failures.inc_by(failed);
        }

        let scraped = collected.examples.len();
        let (examples, used_fallback) = ensure_trainable(collected.examples);
        if used_fallback {
            warn!(
                scraped,
                samples = examples.len(),
                mode = self.mode.as_str(),
                "training data was empty or single-class; using built-in fallback examples"
            );
            self.metrics.training_fallback_total.inc();
        }

        let options = self.options;
        let mut outcome =
            tokio::task::spawn_blocking(move || Self::fit_examples(&examples, &options))
                .await
                .map_err(|error| AnalysisError::Internal(anyhow::Error::new(error)))??;
        outcome.report.used_fallback = used_fallback;
        outcome.report.failed_topics = collected.failed_topics.len();

        if outcome.report.overfitting_suspected {
            self.metrics.overfitting_flags.inc();
        }
        timer.observe_duration();
        Ok(outcome)
    }

    /// 与えられたラベル付き例で学習・評価する。
    ///
    /// `SPLIT_THRESHOLD` 件以上なら層化分割で汎化性能を測り、推論用モデルは常に全件で学習し直す。
    ///
    /// # Errors
    /// 空集合や単一クラスでは `ClassifierError` を返す。
    pub fn fit_examples(
        examples: &[LabeledExample],
        options: &FitOptions,
    ) -> Result<TrainingOutcome, ClassifierError> {
        let model = TrainedModel::fit(examples, options)?;

        let (train_accuracy, test_accuracy) = if examples.len() >= SPLIT_THRESHOLD {
            let split = stratified_split(examples, TEST_FRACTION, SPLIT_SEED);
            let holdout = TrainedModel::fit(&split.train, options)?;
            (holdout.accuracy(&split.train)?, Some(holdout.accuracy(&split.test)?))
        } else {
            (model.accuracy(examples)?, None)
        };

        let overfitting_suspected =
            test_accuracy.is_some_and(|test| train_accuracy - test > OVERFITTING_GAP);
        if overfitting_suspected {
            warn!(
                train_accuracy,
                test_accuracy = test_accuracy.unwrap_or_default(),
                "train accuracy exceeds test accuracy; model may be overfitting"
            );
        }
        info!(
            samples = examples.len(),
            train_accuracy,
            test_accuracy = ?test_accuracy,
            vocabulary = model.vectorizer().vocab_len(),
            "classifier trained"
        );

        Ok(TrainingOutcome {
            model: Arc::new(model),
            report: TrainingReport {
                samples: examples.len(),
                train_accuracy,
                test_accuracy,
                split_performed: test_accuracy.is_some(),
                overfitting_suspected,
                used_fallback: false,
                failed_topics: 0,
            },
        })
    }
}
