//! 固定キーワード辞書と大文字小文字を無視した部分一致照合。
use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use once_cell::sync::Lazy;

/// 特徴量（keyword_flags）とクリックベイト判定で使う誤情報キーワード。順序が特徴量の列順になる。
pub const MISINFO_KEYWORDS: [&str; 17] = [
    "confirmed",
    "leaked",
    "official",
    "exposed",
    "cure",
    "proof",
    "guaranteed",
    "secret",
    "unreleased",
    "tomorrow",
    "rumor",
    "scam",
    "fake",
    "hoax",
    "they don't want you",
    "wake up",
    "conspiracy",
];

/// `MISINFO_KEYWORDS` の長さ（K）。
pub const KEYWORD_COUNT: usize = MISINFO_KEYWORDS.len();

/// レスポンスの説明欄に表示するキーワード。
pub const EXPLANATION_KEYWORDS: [&str; 11] = [
    "confirmed",
    "leaked",
    "official",
    "proof",
    "cure",
    "exposed",
    "fake",
    "scam",
    "rumor",
    "conspiracy",
    "hoax",
];

/// ヒューリスティックラベラーが加点する煽り表現。
pub const SUSPICIOUS_PHRASES: [&str; 5] = ["proof", "exposed", "they dont want", "wake up", "leaked"];

/// 単一投稿パイプラインでコメントを判定するキーワード。
pub const COMMENT_KEYWORDS: [&str; 9] = [
    "fake",
    "cap",
    "edited",
    "misleading",
    "not true",
    "out of context",
    "deepfake",
    "lies",
    "lying",
];

/// 固定辞書に対する部分一致照合器。
///
/// 全パターンの出現有無を知りたいので、重なりを許す `Standard` で走査する。
#[derive(Debug)]
pub struct KeywordMatcher {
    ac: AhoCorasick,
    phrases: &'static [&'static str],
}

impl KeywordMatcher {
    /// # Errors
    /// オートマトンの構築に失敗した場合はエラーを返す。
    pub fn new(phrases: &'static [&'static str]) -> Result<Self, aho_corasick::BuildError> {
        let ac = AhoCorasickBuilder::new()
            .match_kind(MatchKind::Standard)
            .ascii_case_insensitive(true)
            .build(phrases)?;
        Ok(Self { ac, phrases })
    }

    /// 辞書順に並んだ出現フラグを返す。
    #[must_use]
    pub fn presence(&self, text: &str) -> Vec<bool> {
        let lowered = text.to_lowercase();
        let mut seen = vec![false; self.phrases.len()];
        for mat in self.ac.find_overlapping_iter(&lowered) {
            seen[mat.pattern().as_usize()] = true;
        }
        seen
    }

    /// 出現したフレーズを辞書順で返す。
    #[must_use]
    pub fn matched(&self, text: &str) -> Vec<&'static str> {
        self.presence(text)
            .into_iter()
            .zip(self.phrases.iter())
            .filter_map(|(hit, phrase)| hit.then_some(*phrase))
            .collect()
    }

    /// 出現した異なるフレーズの数。
    #[must_use]
    pub fn count(&self, text: &str) -> usize {
        self.presence(text).into_iter().filter(|hit| *hit).count()
    }

    #[must_use]
    pub fn any(&self, text: &str) -> bool {
        self.ac.is_match(&text.to_lowercase())
    }
}

pub static MISINFO_MATCHER: Lazy<KeywordMatcher> =
    Lazy::new(|| KeywordMatcher::new(&MISINFO_KEYWORDS).expect("misinfo keyword matcher"));

pub static EXPLANATION_MATCHER: Lazy<KeywordMatcher> = Lazy::new(|| {
    KeywordMatcher::new(&EXPLANATION_KEYWORDS).expect("explanation keyword matcher")
});

pub static PHRASE_MATCHER: Lazy<KeywordMatcher> =
    Lazy::new(|| KeywordMatcher::new(&SUSPICIOUS_PHRASES).expect("suspicious phrase matcher"));

pub static COMMENT_MATCHER: Lazy<KeywordMatcher> =
    Lazy::new(|| KeywordMatcher::new(&COMMENT_KEYWORDS).expect("comment keyword matcher"));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_is_case_insensitive_and_ordered() {
        let flags = MISINFO_MATCHER.presence("LEAKED proof of a Secret cure");
        assert_eq!(flags.len(), KEYWORD_COUNT);
        assert!(flags[1]); // leaked
        assert!(flags[4]); // cure
        assert!(flags[5]); // proof
        assert!(flags[7]); // secret
        assert!(!flags[0]);
    }

    #[test]
    fn overlapping_phrases_are_all_reported() {
        // "lies" と "lying" は別々に数える。"cap" は "capture" の部分文字列でも一致する。
        let matched = COMMENT_MATCHER.matched("Nice capture, but he lies. Lying again.");
        assert_eq!(matched, vec!["cap", "lies", "lying"]);
    }

    #[test]
    fn multiword_phrases_match_as_substrings() {
        assert_eq!(
            MISINFO_MATCHER.matched("They Don't Want You to know, WAKE UP"),
            vec!["they don't want you", "wake up"]
        );
        assert_eq!(MISINFO_MATCHER.count("nothing to see here"), 0);
        assert!(PHRASE_MATCHER.any("they dont want this out"));
    }
}
