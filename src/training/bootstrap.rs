//! 固定トピックからの学習データ収集と、フォールバック用の組み込みデータ。
use tracing::{info, warn};

use crate::classification::labeler::heuristic_label;
use crate::classification::{Label, LabeledExample};
use crate::clients::PostSearch;
use crate::config::TrainingMode;
use crate::schema::PostRecord;

/// 学習データを集める検索トピックと、bootstrap モードで付与するラベル。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapTopic {
    pub topic: &'static str,
    pub label: Label,
}

pub const BOOTSTRAP_TOPICS: [BootstrapTopic; 6] = [
    BootstrapTopic {
        topic: "#conspiracy",
        label: Label::Misinformation,
    },
    BootstrapTopic {
        topic: "#leaked",
        label: Label::Misinformation,
    },
    BootstrapTopic {
        topic: "#exposed",
        label: Label::Misinformation,
    },
    BootstrapTopic {
        topic: "#gaming",
        label: Label::Normal,
    },
    BootstrapTopic {
        topic: "#technology",
        label: Label::Normal,
    },
    BootstrapTopic {
        topic: "#help",
        label: Label::Normal,
    },
];

/// 取得が全滅したときに使う 4 件（陽性 2、陰性 2）。
#[must_use]
pub fn fallback_dataset() -> Vec<LabeledExample> {
    [
        (
            "BREAKING NEWS: Miracle cure CONFIRMED!!!",
            "They don't want you to know",
            "conspiracy",
            Label::Misinformation,
        ),
        (
            "Secret documents LEAKED - government coverup",
            "PROOF inside",
            "conspiracy",
            Label::Misinformation,
        ),
        (
            "How to build a gaming PC",
            "Discussion and advice",
            "buildapc",
            Label::Normal,
        ),
        (
            "Best monitor for productivity?",
            "Looking for recommendations",
            "monitors",
            Label::Normal,
        ),
    ]
    .into_iter()
    .map(|(title, snippet, subreddit, label)| {
        LabeledExample::new(
            PostRecord {
                rank: Some(1),
                title: title.to_string(),
                snippet: snippet.to_string(),
                url: String::new(),
                subreddit: Some(subreddit.to_string()),
                date_hint: None,
            },
            label,
        )
    })
    .collect()
}

/// トピック収集の結果。
#[derive(Debug, Clone, Default)]
pub struct CollectedExamples {
    pub examples: Vec<LabeledExample>,
    pub failed_topics: Vec<&'static str>,
}

/// 各トピックから最大 `per_topic` 件を取得してラベルを付ける。
///
/// 個々のトピックの取得失敗はログに残してスキップし、全体は中断しない。
pub async fn collect_examples(
    search: &dyn PostSearch,
    per_topic: usize,
    mode: TrainingMode,
) -> CollectedExamples {
    let mut collected = CollectedExamples::default();
    for entry in &BOOTSTRAP_TOPICS {
        match search.search(entry.topic, per_topic).await {
            Ok(posts) => {
                let fetched = posts.len();
                collected
                    .examples
                    .extend(posts.into_iter().take(per_topic).map(|record| {
                        let label = match mode {
                            TrainingMode::Bootstrap => entry.label,
                            TrainingMode::Heuristic => heuristic_label(&record),
                        };
                        LabeledExample::new(record, label)
                    }));
                info!(topic = entry.topic, fetched, mode = mode.as_str(), "collected training topic");
            }
            Err(error) => {
                warn!(topic = entry.topic, error = %error, "failed to fetch training topic; skipping");
                collected.failed_topics.push(entry.topic);
            }
        }
    }
    collected
}

/// 学習可能な集合に補正する。補正した場合は `true` を返す。
///
/// 空ならフォールバックで置き換え、単一クラスならフォールバックを追加して両クラスを揃える。
#[must_use]
pub fn ensure_trainable(examples: Vec<LabeledExample>) -> (Vec<LabeledExample>, bool) {
    if examples.is_empty() {
        return (fallback_dataset(), true);
    }
    let positives = examples.iter().filter(|ex| ex.label.is_positive()).count();
    if positives == 0 || positives == examples.len() {
        let mut extended = examples;
        extended.extend(fallback_dataset());
        return (extended, true);
    }
    (examples, false)
}
