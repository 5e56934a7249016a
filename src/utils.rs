//! Small string helpers for logging and for coaxing JSON out of model replies.

/// Truncate a string for logging.
///
/// Cuts on a character boundary and appends `"…(+N bytes)"` with the number
/// of bytes dropped.
///
/// # Arguments
///
/// * `s` - The string to potentially truncate
/// * `max` - Maximum number of characters to keep
///
/// # Returns
///
/// `s` unchanged if it has at most `max` characters, otherwise its first
/// `max` characters plus the dropped-byte marker.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Detect if a serde_json error indicates truncated/incomplete JSON.
///
/// A model that runs out of tokens mid-reply produces an EOF error; that is
/// worth one re-ask, anything else is not.
///
/// # Arguments
///
/// * `e` - The error from parsing the reply
///
/// # Returns
///
/// `true` when the input ended before the JSON value did.
///
/// # Examples
///
/// ```ignore
/// let err = serde_json::from_str::<serde_json::Value>(r#"{"labels": ["POS"#).unwrap_err();
/// assert!(looks_truncated(&err));
/// ```
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

/// Slice out the JSON object a model reply is wrapped around.
///
/// Models like to add code fences or a sentence of preamble. Returns the span
/// from the first `{` to the last `}`, the tail from the first `{` when the
/// object is unterminated, or the whole reply when there is no `{` at all.
///
/// # Examples
///
/// ```ignore
/// let reply = "```json\n{\"labels\": [\"NEUTRAL\"]}\n```";
/// assert_eq!(extract_json_object(reply), "{\"labels\": [\"NEUTRAL\"]}");
/// ```
pub fn extract_json_object(reply: &str) -> &str {
    let Some(start) = reply.find('{') else {
        return reply.trim();
    };
    match reply.rfind('}') {
        Some(end) if end > start => &reply[start..=end],
        _ => &reply[start..],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.ends_with("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundaries() {
        let s = "Zürich résumé ünïcödé";
        let result = truncate_for_log(s, 2);
        assert!(result.starts_with("Zü…"));
    }

    #[test]
    fn test_looks_truncated() {
        let eof: Result<serde_json::Value, _> = serde_json::from_str(r#"{"labels": ["POSITIVE""#);
        assert!(looks_truncated(&eof.unwrap_err()));

        let syntax: Result<serde_json::Value, _> = serde_json::from_str(r#"{"labels": ]"#);
        assert!(!looks_truncated(&syntax.unwrap_err()));
    }

    #[test]
    fn test_extract_json_object_strips_fences() {
        let reply = "```json\n{\"labels\": [\"NEUTRAL\"]}\n```";
        assert_eq!(extract_json_object(reply), "{\"labels\": [\"NEUTRAL\"]}");
    }

    #[test]
    fn test_extract_json_object_unterminated() {
        let reply = "Sure! {\"labels\": [\"POSITIVE\"";
        assert_eq!(extract_json_object(reply), "{\"labels\": [\"POSITIVE\"");
    }

    #[test]
    fn test_extract_json_object_without_braces() {
        assert_eq!(extract_json_object("  no json here "), "no json here");
    }
}
