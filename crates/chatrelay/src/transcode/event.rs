//! Upstream SSE line classification
//!
//! Each reassembled line is classified on its own. A parse failure is a value
//! ([`UpstreamEvent::Malformed`]) so the caller can log it and move on.

use serde_json::Value;

/// Prefix marking an SSE data line
pub const DATA_PREFIX: &str = "data: ";

/// Payload signaling the logical end of upstream content
pub const DONE_SENTINEL: &str = "[DONE]";

/// One classified upstream line
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamEvent {
    /// Data event; `None` when the chunk carries no text (role-only deltas,
    /// finish chunks, usage chunks)
    Data(Option<String>),
    /// Terminal `[DONE]` marker
    Done,
    /// Blank lines, comments, `event:`/`id:` fields and anything else
    Ignored,
    /// Data line whose payload is not valid JSON
    Malformed { payload: String, reason: String },
}

impl UpstreamEvent {
    /// The content fragment, if this event carries one
    pub fn fragment(&self) -> Option<&str> {
        match self {
            UpstreamEvent::Data(content) => content.as_deref(),
            _ => None,
        }
    }
}

/// Classify a single line (without its trailing `\n`)
pub fn parse_line(line: &str) -> UpstreamEvent {
    let trimmed = line.trim();

    let Some(payload) = trimmed.strip_prefix(DATA_PREFIX) else {
        return UpstreamEvent::Ignored;
    };

    if payload == DONE_SENTINEL {
        return UpstreamEvent::Done;
    }

    match serde_json::from_str::<Value>(payload) {
        Ok(value) => UpstreamEvent::Data(extract_delta_content(&value)),
        Err(e) => match replace_lone_surrogates(payload)
            .and_then(|repaired| serde_json::from_str::<Value>(&repaired).ok())
        {
            Some(value) => UpstreamEvent::Data(extract_delta_content(&value)),
            None => UpstreamEvent::Malformed {
                payload: payload.to_string(),
                reason: e.to_string(),
            },
        },
    }
}

/// Rewrite unpaired `\uD800`-`\uDFFF` escapes to `\uFFFD`.
///
/// Providers sometimes split a surrogate pair across two deltas. Such payloads
/// are valid JSON grammar but `serde_json` refuses to build a `String` from
/// them. Returns `None` when there was nothing to rewrite.
fn replace_lone_surrogates(payload: &str) -> Option<String> {
    let bytes = payload.as_bytes();
    let mut repaired = String::with_capacity(payload.len());
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'\\' {
            i += 1;
            continue;
        }

        let Some(unit) = hex_escape_at(bytes, i) else {
            // Some other escape; skip the escaped character too
            i += 2;
            continue;
        };

        match unit {
            0xD800..=0xDBFF if matches!(hex_escape_at(bytes, i + 6), Some(0xDC00..=0xDFFF)) => {
                i += 12;
            }
            0xD800..=0xDFFF => {
                repaired.push_str(&payload[copied..i]);
                repaired.push_str("\\uFFFD");
                i += 6;
                copied = i;
            }
            _ => i += 6,
        }
    }

    if copied == 0 {
        return None;
    }

    repaired.push_str(&payload[copied..]);
    Some(repaired)
}

/// Code unit of a `\uXXXX` escape starting at `at`
fn hex_escape_at(bytes: &[u8], at: usize) -> Option<u16> {
    let digits = bytes.get(at..at + 6)?.strip_prefix(b"\\u")?;
    if !digits.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    u16::from_str_radix(std::str::from_utf8(digits).ok()?, 16).ok()
}

/// Read `choices[0].delta.content` from a chat-completion chunk.
///
/// Returns `None` when any level is missing, the content is not a string, or
/// the string is empty.
pub fn extract_delta_content(chunk: &Value) -> Option<String> {
    chunk
        .get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_chunk() {
        let line = r#"data: {"id":"gen-1","choices":[{"index":0,"delta":{"content":"Hola"}}]}"#;
        assert_eq!(parse_line(line), UpstreamEvent::Data(Some("Hola".to_string())));
    }

    #[test]
    fn test_parse_done_sentinel() {
        assert_eq!(parse_line("data: [DONE]"), UpstreamEvent::Done);
        assert_eq!(parse_line("  data: [DONE]\r"), UpstreamEvent::Done);
    }

    #[test]
    fn test_parse_role_only_delta() {
        let line = r#"data: {"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_line(line), UpstreamEvent::Data(None));
    }

    #[test]
    fn test_parse_finish_chunk() {
        let line = r#"data: {"choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#;
        assert_eq!(parse_line(line), UpstreamEvent::Data(None));
    }

    #[test]
    fn test_parse_empty_choices() {
        let line = r#"data: {"choices":[],"usage":{"total_tokens":12}}"#;
        assert_eq!(parse_line(line), UpstreamEvent::Data(None));
    }

    #[test]
    fn test_parse_non_string_content() {
        let line = r#"data: {"choices":[{"delta":{"content":42}}]}"#;
        assert_eq!(parse_line(line), UpstreamEvent::Data(None));
    }

    #[test]
    fn test_parse_empty_string_content() {
        let line = r#"data: {"choices":[{"delta":{"content":""}}]}"#;
        assert_eq!(parse_line(line), UpstreamEvent::Data(None));
    }

    #[test]
    fn test_parse_malformed_payload() {
        let event = parse_line("data: {\"choices\":[{");
        match event {
            UpstreamEvent::Malformed { payload, reason } => {
                assert_eq!(payload, "{\"choices\":[{");
                assert!(!reason.is_empty());
            }
            other => panic!("expected malformed event, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_ignores_non_data_lines() {
        assert_eq!(parse_line(""), UpstreamEvent::Ignored);
        assert_eq!(parse_line("   "), UpstreamEvent::Ignored);
        assert_eq!(parse_line(": OPENROUTER PROCESSING"), UpstreamEvent::Ignored);
        assert_eq!(parse_line("event: message"), UpstreamEvent::Ignored);
        assert_eq!(parse_line("id: 7"), UpstreamEvent::Ignored);
        assert_eq!(parse_line("data:{\"choices\":[]}"), UpstreamEvent::Ignored);
        assert_eq!(parse_line("data: "), UpstreamEvent::Ignored);
    }

    #[test]
    fn test_parse_tolerates_surrounding_whitespace() {
        let line = "  data: {\"choices\":[{\"delta\":{\"content\":\" x \"}}]}\r";
        assert_eq!(parse_line(line), UpstreamEvent::Data(Some(" x ".to_string())));
    }

    #[test]
    fn test_parse_lone_high_surrogate() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hi \ud83d"}}]}"#;
        assert_eq!(parse_line(line), UpstreamEvent::Data(Some("Hi \u{FFFD}".to_string())));
    }

    #[test]
    fn test_parse_lone_low_surrogate() {
        let line = r#"data: {"choices":[{"delta":{"content":"\udc4b there"}}]}"#;
        assert_eq!(parse_line(line), UpstreamEvent::Data(Some("\u{FFFD} there".to_string())));
    }

    #[test]
    fn test_parse_high_surrogate_followed_by_non_low() {
        let line = r#"data: {"choices":[{"delta":{"content":"\ud83d\u0041"}}]}"#;
        assert_eq!(parse_line(line), UpstreamEvent::Data(Some("\u{FFFD}A".to_string())));
    }

    #[test]
    fn test_parse_surrogate_pair_untouched() {
        let line = r#"data: {"choices":[{"delta":{"content":"\ud83d\udc4b \ud83d"}}]}"#;
        assert_eq!(parse_line(line), UpstreamEvent::Data(Some("👋 \u{FFFD}".to_string())));
    }

    #[test]
    fn test_escaped_backslash_is_not_a_surrogate_escape() {
        assert_eq!(replace_lone_surrogates(r#"{"a":"\\ud83d"}"#), None);
        assert_eq!(replace_lone_surrogates(r#"{"a":"plain"}"#), None);
        assert_eq!(
            replace_lone_surrogates(r#"{"a":"\\\ud83d"}"#),
            Some(r#"{"a":"\\\uFFFD"}"#.to_string())
        );
    }

    #[test]
    fn test_surrogate_repair_keeps_real_malformed_payloads_malformed() {
        let event = parse_line(r#"data: {"choices":[{"delta":{"content":"\ud83d"#);
        assert!(matches!(event, UpstreamEvent::Malformed { .. }));
    }

    #[test]
    fn test_fragment_accessor() {
        assert_eq!(UpstreamEvent::Data(Some("a".into())).fragment(), Some("a"));
        assert_eq!(UpstreamEvent::Data(None).fragment(), None);
        assert_eq!(UpstreamEvent::Done.fragment(), None);
    }
}
