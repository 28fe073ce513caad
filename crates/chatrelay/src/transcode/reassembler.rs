//! Line reassembly over an arbitrarily chunked byte stream
//!
//! Upstream bodies arrive in network-sized chunks that have no relation to
//! line or character boundaries. [`LineReassembler`] turns those chunks back
//! into complete lines:
//! - bytes are decoded as UTF-8 incrementally, so a code point split across
//!   two chunks is carried forward as raw bytes until it completes
//! - only `\n`-terminated lines are yielded, the trailing partial line stays
//!   buffered until the next chunk (or [`LineReassembler::finish`])

use std::char::REPLACEMENT_CHARACTER;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Incremental UTF-8 decoder.
///
/// Invalid sequences decode to U+FFFD, one replacement per maximal invalid
/// subsequence. An incomplete sequence at the end of a chunk is held back
/// rather than replaced. A byte-order mark at the very start of the input is
/// dropped; one appearing later is kept as U+FEFF.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
    bom_checked: bool,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `bytes`, appending every complete character to `out`
    pub fn decode_into(&mut self, bytes: &[u8], out: &mut String) {
        let mut joined = std::mem::take(&mut self.pending);
        let mut rest: &[u8] = if joined.is_empty() {
            bytes
        } else {
            joined.extend_from_slice(bytes);
            &joined
        };

        if !self.bom_checked {
            // Not enough bytes yet to tell whether the input opens with a BOM
            if rest.len() < UTF8_BOM.len() && UTF8_BOM.starts_with(rest) {
                self.pending = rest.to_vec();
                return;
            }
            self.bom_checked = true;
            rest = rest.strip_prefix(UTF8_BOM).unwrap_or(rest);
        }

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    return;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));

                    match e.error_len() {
                        Some(len) => {
                            out.push(REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            self.pending = after.to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Flush the decoder at end of input. A dangling incomplete sequence
    /// becomes a single U+FFFD.
    pub fn finish_into(&mut self, out: &mut String) {
        if !self.pending.is_empty() {
            self.pending.clear();
            out.push(REPLACEMENT_CHARACTER);
        }
    }

    /// Number of bytes held back waiting for the rest of a code point
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Reassembles complete lines from chunked upstream bytes
#[derive(Debug, Default)]
pub struct LineReassembler {
    decoder: Utf8Decoder,
    buffer: String,
}

impl LineReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one upstream chunk and return every line it completed, in order.
    ///
    /// Returned lines do not include the `\n`. Anything after the last
    /// newline is retained for the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.decoder.decode_into(bytes, &mut self.buffer);

        let Some(last_newline) = self.buffer.rfind('\n') else {
            return Vec::new();
        };

        let tail = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, tail);

        complete[..last_newline]
            .split('\n')
            .map(str::to_owned)
            .collect()
    }

    /// Flush at end of stream, returning the leftover partial line if any.
    pub fn finish(&mut self) -> Option<String> {
        self.decoder.finish_into(&mut self.buffer);

        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }

    /// The currently buffered partial line
    pub fn buffered(&self) -> &str {
        &self.buffer
    }
}
