//! 単一投稿をコメント・類似投稿・メタデータの 3 シグナルで評価する。
//!
//! モデルの学習は行わない。
pub mod signals;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use self::signals::{
    SIMILAR_POST_LIMIT, comment_evidence, combine, keyword_set, metadata_evidence, search_query,
    similarity_ratio,
};
use crate::clients::{PostSource, TitleSearch};
use crate::error::AnalysisError;
use crate::observability::metrics::Metrics;
use crate::schema::{SimilarPost, Submission};
use crate::util::round_to;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostSummary {
    pub id: Option<String>,
    pub title: String,
    pub subreddit: Option<String>,
    pub url: Option<String>,
    pub score: i64,
    pub upvote_ratio: f64,
    pub num_comments: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceReport {
    pub comment_flag_rate: f64,
    pub comment_examples: Vec<String>,
    pub search_query: String,
    pub similar_posts: Vec<SimilarPost>,
}

/// 丸める前の各シグナル値。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EvidenceSignals {
    pub comment: f64,
    pub similarity: f64,
    pub metadata: f64,
}

/// `POST /v1/analyze/post` のレスポンス。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostAssessment {
    pub post: PostSummary,
    pub evidence: EvidenceReport,
    pub score_percent: f64,
    #[serde(skip)]
    pub signals: EvidenceSignals,
}

#[derive(Clone)]
pub struct EvidencePipeline {
    source: Arc<dyn PostSource>,
    titles: Arc<dyn TitleSearch>,
    metrics: Arc<Metrics>,
}

impl EvidencePipeline {
    #[must_use]
    pub fn new(
        source: Arc<dyn PostSource>,
        titles: Arc<dyn TitleSearch>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            source,
            titles,
            metrics,
        }
    }

    /// 投稿 URL を取得して評価する。
    ///
    /// # Errors
    /// URL が空なら `Input`、投稿取得やタイトル検索の失敗は `UpstreamFetch`。
    pub async fn assess(&self, url: &str) -> Result<PostAssessment, AnalysisError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(AnalysisError::Input("Please provide a post URL".to_string()));
        }
        let submission = self.source.fetch_post(url).await?;
        let assessment = self.assess_submission(submission).await?;
        self.metrics.post_analyses_total.inc();
        info!(
            url,
            score_percent = assessment.score_percent,
            comments = assessment.post.num_comments,
            "post assessed"
        );
        Ok(assessment)
    }

    /// 取得済みの投稿を評価する。
    ///
    /// タイトルからキーワードが取れない場合は類似検索を行わず、類似度を 0 とする。
    ///
    /// # Errors
    /// タイトル検索の失敗は `UpstreamFetch`。
    pub async fn assess_submission(
        &self,
        submission: Submission,
    ) -> Result<PostAssessment, AnalysisError> {
        let comments = comment_evidence(&submission.comments);
        let query = search_query(&submission.title);

        let title_keywords = keyword_set(&submission.title);
        let (similar_posts, similarity) = if title_keywords.is_empty() {
            debug!("title has no keywords; skipping similar-title search");
            (Vec::new(), 0.0)
        } else {
            let similar = self.titles.search_titles(&query, SIMILAR_POST_LIMIT).await?;
            let ratio = similarity_ratio(&title_keywords, &similar);
            (similar, ratio)
        };

        let num_comments = submission.comments.len();
        let metadata = metadata_evidence(submission.score, num_comments);
        let score = combine(comments.flag_rate, similarity, metadata);

        Ok(PostAssessment {
            post: PostSummary {
                id: submission.id,
                title: submission.title,
                subreddit: submission.subreddit,
                url: submission.url,
                score: submission.score,
                upvote_ratio: submission.upvote_ratio,
                num_comments,
            },
            evidence: EvidenceReport {
                comment_flag_rate: round_to(comments.flag_rate, 4),
                comment_examples: comments.examples,
                search_query: query,
                similar_posts,
            },
            score_percent: round_to(score * 100.0, 2),
            signals: EvidenceSignals {
                comment: comments.flag_rate,
                similarity,
                metadata,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use prometheus::Registry;

    use super::*;
    use crate::clients::FetchError;

    struct StaticSource(Submission);

    #[async_trait]
    impl PostSource for StaticSource {
        async fn fetch_post(&self, _url: &str) -> Result<Submission, FetchError> {
            Ok(self.0.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl PostSource for FailingSource {
        async fn fetch_post(&self, url: &str) -> Result<Submission, FetchError> {
            Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    /// 呼ばれたらテストを失敗させる検索スタブ。
    struct ForbiddenSearch;

    #[async_trait]
    impl TitleSearch for ForbiddenSearch {
        async fn search_titles(&self, query: &str, _limit: usize) -> Result<Vec<SimilarPost>, FetchError> {
            panic!("title search must not be invoked (query: {query:?})");
        }
    }

    struct FixedTitles(Vec<&'static str>);

    #[async_trait]
    impl TitleSearch for FixedTitles {
        async fn search_titles(&self, _query: &str, limit: usize) -> Result<Vec<SimilarPost>, FetchError> {
            assert_eq!(limit, SIMILAR_POST_LIMIT);
            Ok(self
                .0
                .iter()
                .map(|title| SimilarPost {
                    title: (*title).to_string(),
                    ..SimilarPost::default()
                })
                .collect())
        }
    }

    fn metrics() -> Arc<Metrics> {
        Arc::new(Metrics::new(Arc::new(Registry::new())).expect("metrics"))
    }

    fn submission(title: &str, score: i64, comments: Vec<&str>) -> Submission {
        Submission {
            id: Some("abc".into()),
            title: title.to_string(),
            subreddit: Some("pics".into()),
            url: Some("https://i.example/a.png".into()),
            score,
            upvote_ratio: 0.55,
            comments: comments.into_iter().map(ToString::to_string).collect(),
        }
    }

    #[tokio::test]
    async fn keywordless_title_skips_search() {
        let pipeline = EvidencePipeline::new(
            Arc::new(FailingSource),
            Arc::new(ForbiddenSearch),
            metrics(),
        );
        let assessment = pipeline
            .assess_submission(submission("?? !! ok", 100, vec!["lol"]))
            .await
            .expect("assessment");
        assert!(assessment.signals.similarity.abs() < f64::EPSILON);
        assert!(assessment.evidence.similar_posts.is_empty());
        assert_eq!(assessment.evidence.search_query, "?? !! ok");
    }

    #[tokio::test]
    async fn signals_are_weighted_into_percent() {
        let comments = vec![
            "this is fake", "edited for sure", "wow", "nice", "cool", "neat", "great", "ok",
            "lovely", "beautiful", "amazing", "so good",
        ];
        let pipeline = EvidencePipeline::new(
            Arc::new(FailingSource),
            Arc::new(FixedTitles(vec!["Sunset over harbor", "Random dog"])),
            metrics(),
        );
        let assessment = pipeline
            .assess_submission(submission("Sunset over the harbor tonight", 3, comments))
            .await
            .expect("assessment");

        // comment = 2/12, similarity = 1/2, metadata = 0.1
        let expected = 0.5 * (2.0 / 12.0) + 0.35 * 0.5 + 0.15 * 0.1;
        assert!((assessment.score_percent - round_to(expected * 100.0, 2)).abs() < 1e-9);
        assert!((assessment.evidence.comment_flag_rate - 0.1667).abs() < 1e-9);
        assert_eq!(assessment.post.num_comments, 12);
        assert_eq!(assessment.evidence.comment_examples.len(), 2);
    }

    #[tokio::test]
    async fn blank_url_is_input_error_and_fetch_failure_is_upstream() {
        let pipeline = EvidencePipeline::new(
            Arc::new(FailingSource),
            Arc::new(ForbiddenSearch),
            metrics(),
        );
        assert!(matches!(
            pipeline.assess("   ").await,
            Err(AnalysisError::Input(_))
        ));
        assert!(matches!(
            pipeline.assess("https://www.reddit.com/r/x/comments/1/y/").await,
            Err(AnalysisError::UpstreamFetch(_))
        ));
    }

    #[tokio::test]
    async fn assess_fetches_then_scores() {
        let metrics = metrics();
        let pipeline = EvidencePipeline::new(
            Arc::new(StaticSource(submission("Is this deepfake real", 50, vec!["deepfake"]))),
            Arc::new(FixedTitles(vec![])),
            Arc::clone(&metrics),
        );
        let assessment = pipeline
            .assess("https://www.reddit.com/r/pics/comments/abc/x/")
            .await
            .expect("assessment");
        assert!((assessment.score_percent - 50.0).abs() < 1e-9);
        assert!((metrics.post_analyses_total.get() - 1.0).abs() < f64::EPSILON);
    }
}
