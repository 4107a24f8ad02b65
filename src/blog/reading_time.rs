pub const DEFAULT_WORDS_PER_MINUTE: usize = 200;

/// 估算阅读时间（分钟），向上取整且至少 1 分钟；空文本返回 0
pub fn calculate_reading_time(text: &str, words_per_minute: usize) -> usize {
    if text.is_empty() {
        return 0;
    }
    let words = strip_tags(text).split_whitespace().count();
    let wpm = words_per_minute.max(1);
    words.div_ceil(wpm).max(1)
}

pub fn format_reading_time(minutes: usize) -> String {
    format!("{} min read", minutes)
}

/// 去掉 `<...>` 标签，未闭合的 `<` 原样保留
fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('<') {
        match rest[open..].find('>') {
            Some(close) => {
                out.push_str(&rest[..open]);
                rest = &rest[open + close + 1..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}
