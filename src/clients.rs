//! 外部データソース（検索・投稿取得）の境界。
pub mod reddit;

use async_trait::async_trait;
use thiserror::Error;

use crate::schema::{PostRecord, SimilarPost, Submission};

pub use reddit::{RedditClient, RedditClientConfig};

/// 単一の取得処理の失敗（タイムアウト、通信、パース）。
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned error status {status}")]
    Status { url: String, status: u16 },
    #[error("failed to parse response from {url}: {message}")]
    Parse { url: String, message: String },
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

/// トピック（ハッシュタグ）で投稿を検索する。
///
/// 該当なしは空の `Vec` で返し、エラーにはしない。
#[async_trait]
pub trait PostSearch: Send + Sync {
    async fn search(&self, topic: &str, max_results: usize) -> Result<Vec<PostRecord>, FetchError>;
}

/// 投稿 URL からメタデータとコメント本文を取得する。
#[async_trait]
pub trait PostSource: Send + Sync {
    async fn fetch_post(&self, url: &str) -> Result<Submission, FetchError>;
}

/// タイトル検索で類似投稿を探す。
#[async_trait]
pub trait TitleSearch: Send + Sync {
    async fn search_titles(&self, query: &str, limit: usize) -> Result<Vec<SimilarPost>, FetchError>;
}
