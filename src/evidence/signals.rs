//! 単一投稿スコアを構成する 3 つのシグナル。いずれも純粋関数。
use rustc_hash::FxHashSet;

use crate::classification::keywords::COMMENT_MATCHER;
use crate::classification::tokenizer::extract_keywords;
use crate::schema::SimilarPost;
use crate::util::ellipsize;

pub const COMMENT_WEIGHT: f64 = 0.5;
pub const SIMILARITY_WEIGHT: f64 = 0.35;
pub const METADATA_WEIGHT: f64 = 0.15;

/// 低スコアかつコメント過多のときに与える固定値。
pub const METADATA_BONUS: f64 = 0.1;
pub const LOW_SCORE_THRESHOLD: i64 = 20;
pub const BUSY_COMMENT_THRESHOLD: usize = 10;

pub const QUERY_WORDS: usize = 6;
pub const SIMILAR_POST_LIMIT: usize = 8;
pub const MAX_COMMENT_EXAMPLES: usize = 6;
pub const COMMENT_EXAMPLE_CHARS: usize = 300;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentEvidence {
    /// キーワードを含むコメントの割合（0〜1）。
    pub flag_rate: f64,
    pub examples: Vec<String>,
}

/// コメント本文のうちキーワードを 1 つ以上含むものの割合と、その例。
#[must_use]
pub fn comment_evidence(comments: &[String]) -> CommentEvidence {
    if comments.is_empty() {
        return CommentEvidence::default();
    }
    let flagged: Vec<&String> = comments
        .iter()
        .filter(|comment| COMMENT_MATCHER.any(comment))
        .collect();
    #[allow(clippy::cast_precision_loss)]
    let flag_rate = flagged.len() as f64 / comments.len() as f64;
    CommentEvidence {
        flag_rate,
        examples: flagged
            .into_iter()
            .take(MAX_COMMENT_EXAMPLES)
            .map(|comment| ellipsize(comment, COMMENT_EXAMPLE_CHARS))
            .collect(),
    }
}

/// タイトル先頭の語を空白で連結した検索クエリ。
#[must_use]
pub fn search_query(title: &str) -> String {
    title
        .split_whitespace()
        .take(QUERY_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}

#[must_use]
pub fn keyword_set(text: &str) -> FxHashSet<String> {
    extract_keywords(text).into_iter().collect()
}

/// 類似投稿のうち、元タイトルとキーワードを共有するものの割合。
#[must_use]
pub fn similarity_ratio(title_keywords: &FxHashSet<String>, similar: &[SimilarPost]) -> f64 {
    if title_keywords.is_empty() || similar.is_empty() {
        return 0.0;
    }
    let hits = similar
        .iter()
        .filter(|post| {
            extract_keywords(&post.title)
                .iter()
                .any(|keyword| title_keywords.contains(keyword))
        })
        .count();
    #[allow(clippy::cast_precision_loss)]
    let ratio = hits as f64 / similar.len() as f64;
    ratio
}

#[must_use]
pub fn metadata_evidence(score: i64, num_comments: usize) -> f64 {
    if score < LOW_SCORE_THRESHOLD && num_comments > BUSY_COMMENT_THRESHOLD {
        METADATA_BONUS
    } else {
        0.0
    }
}

/// 重み付き和を [0, 1] に収める。
#[must_use]
pub fn combine(comment: f64, similarity: f64, metadata: f64) -> f64 {
    (COMMENT_WEIGHT * comment + SIMILARITY_WEIGHT * similarity + METADATA_WEIGHT * metadata)
        .clamp(0.0, 1.0)
}
