//! Answer extraction from model output.
//!
//! Stage outputs wrap their conclusion in `<answer>` tags; tag matching is
//! case-insensitive and spans newlines. Output without a complete tag pair
//! is used whole.

/// Extract the `<answer>` tag body, trimmed; the full text when no
/// complete pair exists.
pub fn extract_answer(text: &str) -> &str {
    extract_tag(text, "answer").unwrap_or(text)
}

fn extract_tag<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let body_start = find_ascii_ci(text, &open)? + open.len();
    let body_end = body_start + find_ascii_ci(&text[body_start..], &close)?;
    Some(text[body_start..body_end].trim())
}

/// Byte offset of the first case-insensitive occurrence of an ASCII
/// needle. Matched bytes are ASCII, so the offset is a char boundary.
fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    let needle = needle.as_bytes();
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

/// Remove every `[...]` segment, non-greedy.
///
/// Used to strip coordinate lists out of a stage answer before it becomes
/// a retrieval query. An unclosed `[` keeps the rest of the text as-is.
pub fn strip_bracketed(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        match rest[open + 1..].find(']') {
            Some(close) => rest = &rest[open + 1 + close + 1..],
            None => {
                out.push_str(&rest[open..]);
                return out;
            }
        }
    }
    out.push_str(rest);
    out
}
