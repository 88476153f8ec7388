//! 外部コラボレータとコアの間でやり取りするレコード型。
use serde::{Deserialize, Serialize};

/// 検索結果から得られた Reddit 投稿への参照。
///
/// どのコラボレータ実装から来ても欠損しうるため、`title`/`snippet` 以外は全て任意。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    #[serde(default)]
    pub rank: Option<i64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub subreddit: Option<String>,
    #[serde(default)]
    pub date_hint: Option<String>,
}

impl PostRecord {
    /// タイトルとスニペットを単一の空白で連結する。空の側は区切りを生まない。
    #[must_use]
    pub fn text(&self) -> String {
        match (self.title.is_empty(), self.snippet.is_empty()) {
            (true, true) => String::new(),
            (false, true) => self.title.clone(),
            (true, false) => self.snippet.clone(),
            (false, false) => format!("{} {}", self.title, self.snippet),
        }
    }
}

/// 単一投稿の取得結果（メタデータとフラット化済みコメント本文）。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Submission {
    pub id: Option<String>,
    pub title: String,
    pub subreddit: Option<String>,
    pub url: Option<String>,
    pub score: i64,
    pub upvote_ratio: f64,
    pub comments: Vec<String>,
}

/// タイトル検索で見つかった類似投稿。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimilarPost {
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    pub subreddit: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub score: i64,
}
