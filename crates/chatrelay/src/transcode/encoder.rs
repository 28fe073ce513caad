//! Downstream data-stream frame encoding
//!
//! Frame format:
//! ```text
//! 0:"escaped text"\n
//! ```

use bytes::Bytes;

use super::error::TranscodeError;

/// Channel index for text frames
pub const TEXT_CHANNEL: u8 = 0;

/// Escape text for embedding inside a quoted frame.
///
/// Backslash goes first so the escapes introduced afterwards are not escaped
/// a second time.
pub fn escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

/// Encode one sanitized, non-empty fragment as a single frame
pub fn encode_frame(text: &str) -> Bytes {
    Bytes::from(format!("{TEXT_CHANNEL}:\"{}\"\n", escape(text)))
}

/// Decode a single frame line back into its text.
///
/// Accepts only the exact shape produced by [`encode_frame`] (with or without
/// the trailing newline) and the five escapes it emits.
pub fn decode_frame(line: &str) -> Option<String> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let quoted = line.strip_prefix("0:")?;
    let inner = quoted.strip_prefix('"')?.strip_suffix('"')?;

    let mut text = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next()? {
                '\\' => text.push('\\'),
                '"' => text.push('"'),
                'n' => text.push('\n'),
                'r' => text.push('\r'),
                't' => text.push('\t'),
                _ => return None,
            },
            '"' | '\n' | '\r' | '\t' => return None,
            other => text.push(other),
        }
    }

    Some(text)
}

/// Check that `frame` decodes and re-encodes to the same bytes, returning the
/// decoded text
pub fn verify_frame(frame: &[u8]) -> Result<String, TranscodeError> {
    let line = std::str::from_utf8(frame)
        .map_err(|e| TranscodeError::Verify(format!("frame is not UTF-8: {e}")))?;

    let text = decode_frame(line)
        .ok_or_else(|| TranscodeError::Verify(format!("not a text frame: {line:?}")))?;

    if encode_frame(&text) != frame {
        return Err(TranscodeError::Verify(format!(
            "frame does not round-trip: {line:?}"
        )));
    }

    Ok(text)
}
