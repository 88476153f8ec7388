//! ハッシュタグ単位のバッチ分析（検索 → 学習 → スコアリング → 集計）。
use std::sync::Arc;

use prometheus::Gauge;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::cache::{Clock, ExpiringCache};
use crate::clients::PostSearch;
use crate::config::TrainingMode;
use crate::error::AnalysisError;
use crate::observability::metrics::Metrics;
use crate::schema::PostRecord;
use crate::scoring::{CohortStatistics, RiskTier, ScoreResult, score_posts};
use crate::training::{TrainingController, TrainingOutcome, TrainingReport};
use crate::util::{round_to, truncate_chars};

pub const SNIPPET_CHARS: usize = 250;

/// `POST /v1/analyze/hashtag` のレスポンス。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HashtagReport {
    pub hashtag: String,
    pub total_posts: usize,
    pub posts: Vec<PostReport>,
    pub statistics: StatisticsReport,
    pub training_info: TrainingInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostReport {
    pub rank: i64,
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub subreddit: Option<String>,
    pub date: String,
    /// 0〜100、小数 1 桁。
    pub misinfo_score: f64,
    /// 0〜1、小数 3 桁。
    pub clickbait_score: f64,
    pub keywords: Vec<String>,
    /// 丸める前の確率から決める。`misinfo_score` が 70.0 と表示されても、
    /// 実値が 69.996 なら `medium` になる。
    pub risk_level: RiskTier,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsReport {
    pub avg_misinfo_score: f64,
    pub max_misinfo_score: f64,
    pub min_misinfo_score: f64,
    pub high_risk_count: usize,
    pub medium_risk_count: usize,
    pub low_risk_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingInfo {
    pub samples_scraped: usize,
    /// パーセント、小数 1 桁。
    pub train_accuracy: f64,
    pub test_accuracy: Option<f64>,
    pub overfitting_suspected: bool,
    pub used_fallback: bool,
}

impl From<&TrainingReport> for TrainingInfo {
    fn from(report: &TrainingReport) -> Self {
        Self {
            samples_scraped: report.samples,
            train_accuracy: round_to(report.train_accuracy * 100.0, 1),
            test_accuracy: report.test_accuracy.map(|acc| round_to(acc * 100.0, 1)),
            overfitting_suspected: report.overfitting_suspected,
            used_fallback: report.used_fallback,
        }
    }
}

impl From<&CohortStatistics> for StatisticsReport {
    fn from(stats: &CohortStatistics) -> Self {
        Self {
            avg_misinfo_score: round_to(stats.mean_percent(), 1),
            max_misinfo_score: round_to(stats.max_percent(), 1),
            min_misinfo_score: round_to(stats.min_percent(), 1),
            high_risk_count: stats.high_risk_count,
            medium_risk_count: stats.medium_risk_count,
            low_risk_count: stats.low_risk_count,
        }
    }
}

impl PostReport {
    fn new(position: usize, record: &PostRecord, score: &ScoreResult) -> Self {
        Self {
            rank: record
                .rank
                .unwrap_or_else(|| i64::try_from(position + 1).unwrap_or(i64::MAX)),
            title: record.title.clone(),
            url: record.url.clone(),
            snippet: truncate_chars(&record.snippet, SNIPPET_CHARS).to_string(),
            subreddit: record.subreddit.clone(),
            date: record.date_hint.clone().unwrap_or_default(),
            misinfo_score: round_to(score.percent(), 1),
            clickbait_score: round_to(score.clickbait, 3),
            keywords: score.keywords.iter().map(ToString::to_string).collect(),
            risk_level: score.risk_tier,
        }
    }
}

/// 入力を正規化する。前後の空白を除き、先頭に `#` が無ければ付ける。
///
/// # Errors
/// 空（空白のみを含む）の場合は `Input`。
pub fn normalize_hashtag(raw: &str) -> Result<String, AnalysisError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AnalysisError::Input("Please provide a hashtag".to_string()));
    }
    if trimmed.starts_with('#') {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("#{trimmed}"))
    }
}

/// 実行中の分析数ゲージ。future が途中で破棄されても drop で戻す。
struct ActiveGuard<'a> {
    gauge: &'a Gauge,
}

impl<'a> ActiveGuard<'a> {
    fn enter(gauge: &'a Gauge) -> Self {
        gauge.inc();
        Self { gauge }
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}

/// バッチ経路の処理をまとめる。学習済みモデルは TTL 付きで共有する。
pub struct BatchAnalyzer {
    search: Arc<dyn PostSearch>,
    trainer: TrainingController,
    mode: TrainingMode,
    max_results: usize,
    models: ExpiringCache<TrainingMode, TrainingOutcome>,
    refresh: Mutex<()>,
    metrics: Arc<Metrics>,
}

impl BatchAnalyzer {
    #[must_use]
    pub fn new(
        search: Arc<dyn PostSearch>,
        trainer: TrainingController,
        mode: TrainingMode,
        max_results: usize,
        model_ttl: std::time::Duration,
        clock: Arc<dyn Clock>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            search,
            trainer,
            mode,
            max_results,
            models: ExpiringCache::new(model_ttl, clock),
            refresh: Mutex::new(()),
            metrics,
        }
    }

    /// ハッシュタグの投稿を取得し、学習済みモデルでスコアリングして集計する。
    ///
    /// # Errors
    /// 空の入力は `Input`、検索結果 0 件は `NoResults`、検索失敗は `UpstreamFetch`、
    /// モデルの不整合は `ModelConsistency`。
    pub async fn analyze(&self, raw_hashtag: &str) -> Result<HashtagReport, AnalysisError> {
        let _active = ActiveGuard::enter(&self.metrics.active_analyses);
        let timer = self.metrics.analysis_duration.start_timer();
        let result = self.run(raw_hashtag).await;
        timer.observe_duration();
        match &result {
            Ok(_) => self.metrics.analyses_total.inc(),
            Err(_) => self.metrics.analysis_failures.inc(),
        }
        result
    }

    async fn run(&self, raw_hashtag: &str) -> Result<HashtagReport, AnalysisError> {
        let hashtag = normalize_hashtag(raw_hashtag)?;
        let analysis_id = Uuid::new_v4();
        info!(%analysis_id, %hashtag, "starting hashtag analysis");

        let mut records = self.search.search(&hashtag, self.max_results).await?;
        records.truncate(self.max_results);
        if records.is_empty() {
            return Err(AnalysisError::NoResults(format!(
                "No Reddit posts found for {hashtag}. Try another hashtag."
            )));
        }
        debug!(%analysis_id, posts = records.len(), "fetched user posts");

        let outcome = self.trained_model().await?;
        let model = Arc::clone(&outcome.model);
        let scored_records = records.clone();
        let scores = tokio::task::spawn_blocking(move || score_posts(&model, &scored_records))
            .await
            .map_err(|error| AnalysisError::Internal(anyhow::Error::new(error)))??;

        let statistics = CohortStatistics::from_scores(&scores).ok_or_else(|| {
            AnalysisError::NoResults(format!("No Reddit posts found for {hashtag}."))
        })?;

        let posts: Vec<PostReport> = records
            .iter()
            .zip(&scores)
            .enumerate()
            .map(|(position, (record, score))| PostReport::new(position, record, score))
            .collect();

        info!(
            %analysis_id,
            %hashtag,
            posts = posts.len(),
            avg = statistics.mean_percent(),
            high = statistics.high_risk_count,
            "hashtag analysis complete"
        );

        Ok(HashtagReport {
            hashtag,
            total_posts: posts.len(),
            posts,
            statistics: StatisticsReport::from(&statistics),
            training_info: TrainingInfo::from(&outcome.report),
        })
    }

    /// キャッシュ済みのモデルを返す。期限切れなら 1 タスクだけが学習し直す。
    async fn trained_model(&self) -> Result<TrainingOutcome, AnalysisError> {
        if let Some(outcome) = self.models.get(&self.mode).await {
            self.metrics.cache_hits.inc();
            return Ok(outcome);
        }

        let _refresh_guard = self.refresh.lock().await;
        if let Some(outcome) = self.models.get(&self.mode).await {
            self.metrics.cache_hits.inc();
            return Ok(outcome);
        }
        self.metrics.cache_misses.inc();

        let outcome = self.trainer.train().await?;
        self.models.insert(self.mode, outcome.clone()).await;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use prometheus::Registry;

    use super::*;
    use crate::classification::model::FitOptions;
    use crate::clients::FetchError;
    use crate::pipeline::cache::ManualClock;

    /// ユーザークエリには固定の投稿を返し、学習トピックの呼び出し回数を数える。
    struct ScriptedSearch {
        user_posts: Vec<PostRecord>,
        training_calls: AtomicUsize,
    }

    #[async_trait]
    impl PostSearch for ScriptedSearch {
        async fn search(&self, topic: &str, max: usize) -> Result<Vec<PostRecord>, FetchError> {
            if topic == "#cyberpunk" {
                return Ok(self.user_posts.iter().take(max).cloned().collect());
            }
            self.training_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    fn analyzer(search: Arc<ScriptedSearch>, clock: Arc<ManualClock>) -> BatchAnalyzer {
        let metrics = Arc::new(Metrics::new(Arc::new(Registry::new())).expect("metrics"));
        let trainer = TrainingController::new(
            search.clone(),
            3,
            TrainingMode::Bootstrap,
            FitOptions::default(),
            Arc::clone(&metrics),
        );
        BatchAnalyzer::new(
            search,
            trainer,
            TrainingMode::Bootstrap,
            10,
            Duration::from_secs(600),
            clock,
            metrics,
        )
    }

    fn user_posts() -> Vec<PostRecord> {
        vec![
            PostRecord {
                rank: Some(1),
                title: "LEAKED: unreleased DLC CONFIRMED!!!".into(),
                snippet: "x".repeat(400),
                url: "https://www.reddit.com/r/cyberpunkgame/comments/1/a/".into(),
                subreddit: Some("cyberpunkgame".into()),
                date_hint: Some("2024-05-01".into()),
            },
            PostRecord {
                rank: None,
                title: "Photo mode screenshots".into(),
                ..PostRecord::default()
            },
        ]
    }

    #[rstest::rstest]
    #[case("cyberpunk", "#cyberpunk")]
    #[case("  #cyberpunk ", "#cyberpunk")]
    #[case("#", "#")]
    fn hashtags_are_normalized(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_hashtag(raw).expect("valid"), expected);
    }

    #[test]
    fn blank_hashtag_is_rejected() {
        assert!(matches!(normalize_hashtag("   "), Err(AnalysisError::Input(_))));
    }

    #[tokio::test]
    async fn report_is_built_and_rounded() {
        let search = Arc::new(ScriptedSearch {
            user_posts: user_posts(),
            training_calls: AtomicUsize::new(0),
        });
        let analyzer = analyzer(search, Arc::new(ManualClock::new()));

        let report = analyzer.analyze("cyberpunk").await.expect("report");

        assert_eq!(report.hashtag, "#cyberpunk");
        assert_eq!(report.total_posts, 2);
        assert_eq!(report.posts[0].snippet.chars().count(), SNIPPET_CHARS);
        assert_eq!(report.posts[0].date, "2024-05-01");
        assert_eq!(report.posts[1].rank, 2);
        assert_eq!(report.posts[1].date, "");
        assert!(report.posts[0].keywords.contains(&"leaked".to_string()));
        assert!(report.training_info.used_fallback);
        assert_eq!(report.training_info.samples_scraped, 4);
        assert_eq!(report.training_info.test_accuracy, None);

        let stats = &report.statistics;
        assert_eq!(
            stats.high_risk_count + stats.medium_risk_count + stats.low_risk_count,
            2
        );
        assert!(stats.min_misinfo_score <= stats.avg_misinfo_score);
        assert!(stats.avg_misinfo_score <= stats.max_misinfo_score);
        for post in &report.posts {
            assert!((round_to(post.misinfo_score, 1) - post.misinfo_score).abs() < 1e-9);
        }
    }

    #[tokio::test]
    async fn model_is_reused_until_it_expires() {
        let search = Arc::new(ScriptedSearch {
            user_posts: user_posts(),
            training_calls: AtomicUsize::new(0),
        });
        let clock = Arc::new(ManualClock::new());
        let analyzer = analyzer(search.clone(), clock.clone());

        analyzer.analyze("#cyberpunk").await.expect("first");
        analyzer.analyze("#cyberpunk").await.expect("second");
        assert_eq!(search.training_calls.load(Ordering::SeqCst), 6);

        clock.advance(Duration::from_secs(601));
        analyzer.analyze("#cyberpunk").await.expect("third");
        assert_eq!(search.training_calls.load(Ordering::SeqCst), 12);
    }

    struct HangingSearch;

    #[async_trait]
    impl PostSearch for HangingSearch {
        async fn search(&self, _topic: &str, _max: usize) -> Result<Vec<PostRecord>, FetchError> {
            std::future::pending::<Result<Vec<PostRecord>, FetchError>>().await
        }
    }

    #[tokio::test]
    async fn active_gauge_is_released_when_request_is_dropped() {
        let metrics = Arc::new(Metrics::new(Arc::new(Registry::new())).expect("metrics"));
        let search: Arc<dyn PostSearch> = Arc::new(HangingSearch);
        let trainer = TrainingController::new(
            Arc::clone(&search),
            3,
            TrainingMode::Bootstrap,
            FitOptions::default(),
            Arc::clone(&metrics),
        );
        let analyzer = BatchAnalyzer::new(
            search,
            trainer,
            TrainingMode::Bootstrap,
            10,
            Duration::from_secs(600),
            Arc::new(ManualClock::new()),
            Arc::clone(&metrics),
        );

        let cancelled =
            tokio::time::timeout(Duration::from_millis(20), analyzer.analyze("#stuck")).await;
        assert!(cancelled.is_err());
        assert!(metrics.active_analyses.get().abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn active_gauge_returns_to_zero_after_completion() {
        let search = Arc::new(ScriptedSearch {
            user_posts: user_posts(),
            training_calls: AtomicUsize::new(0),
        });
        let analyzer = analyzer(search, Arc::new(ManualClock::new()));
        analyzer.analyze("#cyberpunk").await.expect("report");
        assert!(analyzer.metrics.active_analyses.get().abs() < f64::EPSILON);
        assert!((analyzer.metrics.analyses_total.get() - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn empty_search_is_no_results() {
        let search = Arc::new(ScriptedSearch {
            user_posts: Vec::new(),
            training_calls: AtomicUsize::new(0),
        });
        let analyzer = analyzer(search.clone(), Arc::new(ManualClock::new()));
        let error = analyzer.analyze("#cyberpunk").await.expect_err("no posts");
        assert!(matches!(error, AnalysisError::NoResults(_)));
        assert_eq!(search.training_calls.load(Ordering::SeqCst), 0);
    }
}
