/// Prometheusメトリクス定義。
use prometheus::{
    Counter, Gauge, Histogram, HistogramOpts, Registry, register_counter_with_registry,
    register_gauge_with_registry, register_histogram_with_registry,
};
use std::sync::Arc;

/// 学習・分析の所要時間用バケット（秒）。
const DURATION_BUCKETS: &[f64] = &[0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// メトリクスコレクター。
#[derive(Debug, Clone)]
pub struct Metrics {
    // カウンター
    pub analyses_total: Counter,
    pub analysis_failures: Counter,
    pub post_analyses_total: Counter,
    pub topic_fetch_failures: Counter,
    pub training_fallback_total: Counter,
    pub overfitting_flags: Counter,
    pub cache_hits: Counter,
    pub cache_misses: Counter,

    // ヒストグラム
    pub training_duration: Histogram,
    pub analysis_duration: Histogram,

    // ゲージ
    pub active_analyses: Gauge,
}

impl Metrics {
    /// 指定したレジストリにメトリクスを登録する。
    ///
    /// # Errors
    /// 同じ名前のメトリクスが既に登録されている場合はエラーを返す。
    pub fn new(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        Ok(Self {
            analyses_total: register_counter_with_registry!(
                "clipcheck_analyses_total",
                "Total number of hashtag analyses completed",
                registry
            )?,
            analysis_failures: register_counter_with_registry!(
                "clipcheck_analysis_failures_total",
                "Total number of analyses that ended with an error response",
                registry
            )?,
            post_analyses_total: register_counter_with_registry!(
                "clipcheck_post_analyses_total",
                "Total number of single-post analyses completed",
                registry
            )?,
            topic_fetch_failures: register_counter_with_registry!(
                "clipcheck_topic_fetch_failures_total",
                "Number of bootstrap topics skipped because the fetch failed",
                registry
            )?,
            training_fallback_total: register_counter_with_registry!(
                "clipcheck_training_fallback_total",
                "Number of trainings that used the built-in fallback dataset",
                registry
            )?,
            overfitting_flags: register_counter_with_registry!(
                "clipcheck_overfitting_flags_total",
                "Number of trainings where train accuracy exceeded test accuracy by more than 15 points",
                registry
            )?,
            cache_hits: register_counter_with_registry!(
                "clipcheck_cache_hits_total",
                "Number of cache lookups served from a fresh entry",
                registry
            )?,
            cache_misses: register_counter_with_registry!(
                "clipcheck_cache_misses_total",
                "Number of cache lookups that were absent or expired",
                registry
            )?,
            training_duration: register_histogram_with_registry!(
                HistogramOpts::new(
                    "clipcheck_training_duration_seconds",
                    "Duration of dataset assembly and classifier fitting"
                )
                .buckets(DURATION_BUCKETS.to_vec()),
                registry
            )?,
            analysis_duration: register_histogram_with_registry!(
                HistogramOpts::new(
                    "clipcheck_analysis_duration_seconds",
                    "Duration of a whole analysis request"
                )
                .buckets(DURATION_BUCKETS.to_vec()),
                registry
            )?,
            active_analyses: register_gauge_with_registry!(
                "clipcheck_active_analyses",
                "Number of analyses currently in flight",
                registry
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_register_on_private_registries() {
        let first = Metrics::new(Arc::new(Registry::new())).expect("first registry");
        let second = Metrics::new(Arc::new(Registry::new())).expect("second registry");
        first.cache_hits.inc();
        assert!((first.cache_hits.get() - 1.0).abs() < f64::EPSILON);
        assert!(second.cache_hits.get().abs() < f64::EPSILON);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = Arc::new(Registry::new());
        let _metrics = Metrics::new(Arc::clone(&registry)).expect("first");
        assert!(Metrics::new(registry).is_err());
    }
}
