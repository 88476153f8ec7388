//! 学習済みモデルを使わない規則ベースの弱ラベル付け。
use super::Label;
use super::features::{clickbait_subscore, subreddit_risk};
use super::keywords::{MISINFO_MATCHER, PHRASE_MATCHER};
use crate::schema::PostRecord;

/// 無条件で +2 される subreddit。
pub const HIGH_RISK_SUBREDDITS: [&str; 2] = ["conspiracy", "the_donald"];

/// この点数以上で誤情報ラベル。
pub const LABEL_THRESHOLD: u32 = 3;

/// ヒューリスティック得点を計算する。
#[must_use]
pub fn heuristic_score(record: &PostRecord) -> u32 {
    let text = record.text();
    let lowered = text.to_lowercase();
    let mut score = 0u32;

    let clickbait = clickbait_subscore(&text);
    if clickbait > 0.5 {
        score += 2;
    } else if clickbait > 0.3 {
        score += 1;
    }

    score += u32::try_from(MISINFO_MATCHER.count(&lowered)).unwrap_or(u32::MAX);

    let subreddit = record.subreddit.as_deref().map(str::to_lowercase);
    if subreddit
        .as_deref()
        .is_some_and(|name| HIGH_RISK_SUBREDDITS.contains(&name))
    {
        score += 2;
    } else if subreddit_risk(subreddit.as_deref()) > 0.6 {
        score += 1;
    }

    if PHRASE_MATCHER.any(&lowered) {
        score += 1;
    }

    if lowered.contains("!!!") || lowered.matches('!').count() >= 3 {
        score += 1;
    }

    score
}

/// 得点が閾値以上なら `Label::Misinformation`。
#[must_use]
pub fn heuristic_label(record: &PostRecord) -> Label {
    if heuristic_score(record) >= LABEL_THRESHOLD {
        Label::Misinformation
    } else {
        Label::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, snippet: &str, subreddit: Option<&str>) -> PostRecord {
        PostRecord {
            rank: Some(1),
            title: title.to_string(),
            snippet: snippet.to_string(),
            url: String::new(),
            subreddit: subreddit.map(ToString::to_string),
            date_hint: None,
        }
    }

    #[test]
    fn sensational_conspiracy_post_is_flagged() {
        let post = record(
            "CONFIRMED!!! leaked proof",
            "they dont want you to see this",
            Some("Conspiracy"),
        );
        assert!(heuristic_score(&post) >= LABEL_THRESHOLD);
        assert_eq!(heuristic_label(&post), Label::Misinformation);
    }

    #[test]
    fn neutral_post_is_normal() {
        let post = record(
            "How to build a gaming PC",
            "Discussion and advice",
            Some("buildapc"),
        );
        assert_eq!(heuristic_score(&post), 0);
        assert_eq!(heuristic_label(&post), Label::Normal);
    }

    #[test]
    fn keyword_count_is_not_capped() {
        let post = record("fake hoax scam rumor", "", None);
        // 4 keywords, clickbait = 0.2 * 1.0 -> no bonus
        assert_eq!(heuristic_score(&post), 4);
    }

    #[rstest::rstest]
    // 全大文字 2/2 語 -> 0.5 ちょうどは +1
    #[case("BIG NEWS", 1)]
    // 全大文字 2/3 語 -> 0.333 で +1
    #[case("BIG NEWS today", 1)]
    // 0.5 + 感嘆符 1/3 * 0.3 -> 0.6 で +2
    #[case("BIG NEWS!", 2)]
    // 感嘆符で 0.3 ちょうどは加点なし、"!!!" で +1
    #[case("nice build!!!", 1)]
    // 連続していなくても 3 個以上で +1
    #[case("nice! cool! great!", 1)]
    #[case("nice build!!", 0)]
    fn clickbait_and_exclamation_rules_are_exact(#[case] title: &str, #[case] expected: u32) {
        assert_eq!(heuristic_score(&record(title, "", None)), expected);
    }

    #[test]
    fn labeling_is_deterministic() {
        let post = record("Secret cure exposed!", "wake up", Some("news"));
        let first = heuristic_label(&post);
        for _ in 0..10 {
            assert_eq!(heuristic_label(&post), first);
        }
    }

    #[test]
    fn elevated_risk_subreddit_adds_one() {
        let base = record("Weekly thread", "", Some("science"));
        let elevated = record("Weekly thread", "", Some("conspiracy_commons"));
        assert_eq!(heuristic_score(&elevated), heuristic_score(&base) + 1);
    }
}
