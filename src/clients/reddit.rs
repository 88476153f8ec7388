//! Reddit の JSON エンドポイントを使う検索・投稿取得クライアント。
//!
//! 認証なしの `search.json` と `<permalink>.json` のみを使う。
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::{FetchError, PostSearch, PostSource, TitleSearch};
use crate::schema::{PostRecord, SimilarPost, Submission};

/// クライアント設定。
#[derive(Debug, Clone)]
pub struct RedditClientConfig {
    pub base_url: String,
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub total_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RedditClient {
    client: Client,
    base_url: Url,
}

#[derive(Debug, Deserialize)]
struct Listing<T> {
    data: ListingData<T>,
}

#[derive(Debug, Deserialize)]
struct ListingData<T> {
    #[serde(default = "Vec::new")]
    children: Vec<Thing<T>>,
}

#[derive(Debug, Deserialize)]
struct Thing<T> {
    data: T,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPost {
    id: Option<String>,
    title: String,
    selftext: String,
    subreddit: Option<String>,
    permalink: Option<String>,
    url: Option<String>,
    created_utc: Option<f64>,
    score: i64,
    upvote_ratio: f64,
}

impl RedditClient {
    /// # Errors
    /// ベース URL のパースや HTTP クライアントの構築に失敗した場合はエラーを返す。
    pub fn new(config: RedditClientConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(config.user_agent)
            .connect_timeout(config.connect_timeout)
            .timeout(config.total_timeout)
            .build()
            .map_err(|source| FetchError::Transport {
                url: config.base_url.clone(),
                source,
            })?;
        let base_url =
            Url::parse(&config.base_url).map_err(|_| FetchError::InvalidUrl(config.base_url))?;
        Ok(Self { client, base_url })
    }

    fn search_url(&self, query: &str, limit: usize, sort: &str) -> Result<Url, FetchError> {
        let mut url = self
            .base_url
            .join("search.json")
            .map_err(|_| FetchError::InvalidUrl(format!("{}search.json", self.base_url)))?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("limit", &limit.to_string())
            .append_pair("sort", sort)
            .append_pair("raw_json", "1");
        Ok(url)
    }

    fn permalink_url(&self, raw: &RawPost) -> Option<String> {
        raw.permalink
            .as_deref()
            .and_then(|permalink| self.base_url.join(permalink).ok())
            .map(|url| url.to_string())
            .or_else(|| raw.url.clone())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, FetchError> {
        let target = url.to_string();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: target.clone(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: target,
                status: status.as_u16(),
            });
        }
        response.json::<T>().await.map_err(|error| FetchError::Parse {
            url: target,
            message: error.to_string(),
        })
    }
}

#[async_trait]
impl PostSearch for RedditClient {
    async fn search(&self, topic: &str, max_results: usize) -> Result<Vec<PostRecord>, FetchError> {
        let query = topic.trim().trim_start_matches('#');
        let url = self.search_url(query, max_results, "relevance")?;
        let listing: Listing<RawPost> = self.get_json(url).await?;
        let records: Vec<PostRecord> = listing
            .data
            .children
            .into_iter()
            .take(max_results)
            .enumerate()
            .map(|(idx, thing)| {
                let raw = thing.data;
                PostRecord {
                    rank: i64::try_from(idx + 1).ok(),
                    url: self.permalink_url(&raw).unwrap_or_default(),
                    date_hint: raw.created_utc.and_then(date_hint),
                    title: raw.title,
                    snippet: raw.selftext.trim().to_string(),
                    subreddit: raw.subreddit.filter(|name| !name.is_empty()),
                }
            })
            .collect();
        debug!(topic, results = records.len(), "reddit search finished");
        Ok(records)
    }
}

#[async_trait]
impl PostSource for RedditClient {
    async fn fetch_post(&self, url: &str) -> Result<Submission, FetchError> {
        let url = json_url(url)?;
        let target = url.to_string();
        let payload: Vec<Value> = self.get_json(url).await?;
        let mut listings = payload.into_iter();

        let post_listing = listings.next().ok_or_else(|| FetchError::Parse {
            url: target.clone(),
            message: "submission listing missing".to_string(),
        })?;
        let listing: Listing<RawPost> =
            serde_json::from_value(post_listing).map_err(|error| FetchError::Parse {
                url: target.clone(),
                message: error.to_string(),
            })?;
        let raw = listing
            .data
            .children
            .into_iter()
            .next()
            .map(|thing| thing.data)
            .ok_or_else(|| FetchError::Parse {
                url: target.clone(),
                message: "submission payload missing".to_string(),
            })?;

        let mut comments = Vec::new();
        if let Some(children) = listings
            .next()
            .as_ref()
            .and_then(|listing| listing.pointer("/data/children"))
            .and_then(Value::as_array)
        {
            for child in children {
                flatten_comments(child, &mut comments);
            }
        }

        debug!(url = %target, comments = comments.len(), "fetched submission");
        Ok(Submission {
            id: raw.id,
            title: raw.title,
            subreddit: raw.subreddit,
            url: raw.url,
            score: raw.score,
            upvote_ratio: raw.upvote_ratio,
            comments,
        })
    }
}

#[async_trait]
impl TitleSearch for RedditClient {
    async fn search_titles(&self, query: &str, limit: usize) -> Result<Vec<SimilarPost>, FetchError> {
        let url = self.search_url(query, limit, "new")?;
        let listing: Listing<RawPost> = self.get_json(url).await?;
        Ok(listing
            .data
            .children
            .into_iter()
            .take(limit)
            .map(|thing| {
                let raw = thing.data;
                SimilarPost {
                    url: self.permalink_url(&raw),
                    id: raw.id,
                    title: raw.title,
                    subreddit: raw.subreddit,
                    score: raw.score,
                }
            })
            .collect())
    }
}

/// 投稿 URL を `.json` 付きの URL に変換する。
fn json_url(post_url: &str) -> Result<Url, FetchError> {
    let mut url =
        Url::parse(post_url.trim()).map_err(|_| FetchError::InvalidUrl(post_url.to_string()))?;
    let path = url.path().trim_end_matches('/').to_string();
    if !path.ends_with(".json") {
        url.set_path(&format!("{path}.json"));
    }
    Ok(url)
}

/// コメントツリーを深さ優先で本文のリストにする。
fn flatten_comments(node: &Value, out: &mut Vec<String>) {
    let Some(data) = node.get("data") else {
        return;
    };
    if let Some(body) = data.get("body").and_then(Value::as_str)
        && !body.is_empty()
    {
        out.push(body.to_string());
    }
    // "replies" は返信が無いと空文字列になる
    if let Some(children) = data
        .get("replies")
        .and_then(|replies| replies.pointer("/data/children"))
        .and_then(Value::as_array)
    {
        for child in children {
            flatten_comments(child, out);
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn date_hint(created_utc: f64) -> Option<String> {
    DateTime::from_timestamp(created_utc.trunc() as i64, 0)
        .map(|timestamp| timestamp.format("%Y-%m-%d").to_string())
}
