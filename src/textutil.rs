//! UTF-8-safe preview helpers for status lines and logs.
//!
//! Streamed output can contain arbitrary multi-byte text, so previews are cut
//! by characters, never by byte offsets.

/// Collapse all whitespace runs (newlines included) to single spaces and cap
/// the result at `max_chars`, appending `...` when something was cut.
pub fn single_line_preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let prefix: String = flat.chars().take(max_chars).collect();
    format!("{prefix}...")
}

/// Last line of `text` that has visible content.
pub fn last_nonempty_line(text: &str) -> Option<&str> {
    text.lines().rev().map(str::trim_end).find(|line| !line.trim().is_empty())
}
