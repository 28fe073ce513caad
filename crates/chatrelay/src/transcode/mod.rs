//! SSE → data stream transcoding
//!
//! ```text
//! upstream bytes -> reassembler -> event parser -> sanitizer -> encoder -> frames
//! ```

mod encoder;
mod error;
mod event;
mod reassembler;
mod sanitize;
mod stream;

pub use encoder::{TEXT_CHANNEL, decode_frame, encode_frame, escape, verify_frame};
pub use error::TranscodeError;
pub use event::{DATA_PREFIX, DONE_SENTINEL, UpstreamEvent, extract_delta_content, parse_line};
pub use reassembler::{LineReassembler, Utf8Decoder};
pub use sanitize::{CONTROL_MARKERS, sanitize};
pub use stream::{StreamState, TranscodeStats, TranscodeStream, pipe};
