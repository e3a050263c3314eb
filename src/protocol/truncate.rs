//! Output truncation
//!
//! Anything that goes back into a prompt is capped. The result never exceeds
//! `max_bytes`, always ends on a UTF-8 boundary, and truncating an already
//! truncated string to the same bound returns it unchanged.

pub const TRUNCATION_MARKER: &str = "\n... [output truncated]";

/// Cap `text` at `max_bytes`, appending a marker when something was cut
pub fn truncate_output(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }

    if max_bytes < TRUNCATION_MARKER.len() {
        return text[..floor_char_boundary(text, max_bytes)].to_string();
    }

    let keep = floor_char_boundary(text, max_bytes - TRUNCATION_MARKER.len());
    let mut out = String::with_capacity(keep + TRUNCATION_MARKER.len());
    out.push_str(&text[..keep]);
    out.push_str(TRUNCATION_MARKER);
    out
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut i = index.min(text.len());
    while !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}
