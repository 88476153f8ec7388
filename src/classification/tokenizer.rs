//! 用途別のトークナイズ処理。
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static CLICKBAIT_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z']+").expect("compile clickbait word regex"));
static KEYWORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[a-zA-Z0-9']+\b").expect("compile keyword regex"));
static TERM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("compile term regex"));

pub(crate) fn normalize_text(input: &str) -> String {
    input.nfc().collect::<String>()
}

/// 英字とアポストロフィからなる語。クリックベイト判定の母数になる。
#[must_use]
pub fn clickbait_words(text: &str) -> Vec<&str> {
    CLICKBAIT_WORD_RE
        .find_iter(text)
        .map(|mat| mat.as_str())
        .collect()
}

/// 全て大文字の語か（1文字の語は除く）。
#[must_use]
pub fn is_shouting(word: &str) -> bool {
    word.len() > 1
        && word.chars().any(|c| c.is_ascii_alphabetic())
        && !word.chars().any(|c| c.is_ascii_lowercase())
}

/// タイトル類似度に使うキーワード抽出。小文字化した3文字以上の英数字トークン。
#[must_use]
pub fn extract_keywords(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let lowered = text.to_lowercase();
    KEYWORD_RE
        .find_iter(&lowered)
        .map(|mat| mat.as_str())
        .filter(|token| token.chars().count() > 2)
        .map(ToString::to_string)
        .collect()
}

/// TF-IDF 用の語（ユニグラム）。2文字以上の単語文字列を小文字化して返す。
#[must_use]
pub fn vectorizer_tokens(text: &str) -> Vec<String> {
    let normalized = normalize_text(text).to_lowercase();
    TERM_RE
        .find_iter(&normalized)
        .map(|mat| mat.as_str().to_string())
        .collect()
}

/// ユニグラムと隣接バイグラムを並べた n-gram 列。
#[must_use]
pub fn unigrams_and_bigrams(text: &str) -> Vec<String> {
    let tokens = vectorizer_tokens(text);
    let mut grams = Vec::with_capacity(tokens.len() * 2);
    for pair in tokens.windows(2) {
        grams.push(format!("{} {}", pair[0], pair[1]));
    }
    grams.extend(tokens);
    grams
}
