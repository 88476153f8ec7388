//! レスポンス整形用の小さな数値・文字列ユーティリティ。

/// 小数点以下 `decimals` 桁に丸める（0.5 は 0 から遠い側へ）。
#[must_use]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// 先頭 `max_chars` 文字までに切り詰める。文字境界で切るので UTF-8 として常に正しい。
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// `max_chars` を超える場合は末尾を `...` にして全体を `max_chars` 文字に収める。
#[must_use]
pub fn ellipsize(text: &str, max_chars: usize) -> String {
    const ELLIPSIS: &str = "...";
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    format!("{}{ELLIPSIS}", truncate_chars(text, keep))
}
