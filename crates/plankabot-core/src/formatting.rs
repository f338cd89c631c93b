//! Formatting utilities (Telegram HTML escaping, message chunking).

/// Single list items longer than this are cut before chunking.
pub const ITEM_MAX_CHARS: usize = 1000;

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Cut `s` to at most `max_chars` characters, ending with `...` when cut.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Pack `header` followed by one line per item into messages of at most
/// `limit` characters each.
///
/// Splits only on item boundaries; an item is never spread over two
/// messages. Items over [`ITEM_MAX_CHARS`] (or over the limit itself) are
/// truncated first.
pub fn chunk_lines(header: &str, lines: &[String], limit: usize) -> Vec<String> {
    let item_max = ITEM_MAX_CHARS.min(limit.saturating_sub(1)).max(4);
    let mut out = Vec::new();
    let mut chunk = header.to_string();
    let mut chunk_len = header.chars().count();

    for line in lines {
        let safe = truncate_chars(line, item_max);
        let safe_len = safe.chars().count() + 1;

        if chunk_len + safe_len > limit && !chunk.trim().is_empty() {
            out.push(chunk.trim_end().to_string());
            chunk.clear();
            chunk_len = 0;
        }
        chunk.push_str(&safe);
        chunk.push('\n');
        chunk_len += safe_len;
    }

    if !chunk.trim().is_empty() {
        out.push(chunk.trim_end().to_string());
    }
    out
}
