//! Stream controller
//!
//! [`TranscodeStream`] wraps an upstream SSE body and yields downstream
//! frames. It is pull-driven: every `poll_next` either hands out a frame that
//! is already encoded or reads one more upstream chunk.
//!
//! ```text
//! Reading --(upstream ends)--> Draining --(leftover line processed)--> Closed
//!    \
//!     `--(upstream error)--> Errored
//! ```
//!
//! Dropping the stream drops the upstream, so the upstream connection is
//! released on completion, on error and on cancellation alike.

use bytes::Bytes;
use futures::stream::{FusedStream, Stream, StreamExt};
use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::encoder::{encode_frame, verify_frame};
use super::error::TranscodeError;
use super::event::{UpstreamEvent, parse_line};
use super::reassembler::LineReassembler;
use super::sanitize::sanitize;

/// Lifecycle of a [`TranscodeStream`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Pulling chunks from upstream
    Reading,
    /// Upstream finished; the leftover partial line is processed once
    Draining,
    /// Finished normally
    Closed,
    /// Finished after a fatal upstream failure
    Errored,
}

/// Counters collected over the life of one stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranscodeStats {
    /// Upstream bytes received
    pub bytes_in: usize,
    /// Lines handed to the event parser (including the final pseudo-line)
    pub lines: usize,
    /// Frames emitted downstream
    pub frames: usize,
    /// Encoded bytes emitted downstream
    pub bytes_out: usize,
    /// Data lines skipped because their payload was not valid JSON
    pub malformed: usize,
    /// `[DONE]` sentinels seen
    pub done_markers: usize,
}

/// Transcodes an upstream SSE byte stream into downstream frames
pub struct TranscodeStream<S> {
    upstream: Option<S>,
    reassembler: LineReassembler,
    pending: VecDeque<Bytes>,
    state: StreamState,
    stats: TranscodeStats,
    verify: bool,
}

impl<S> TranscodeStream<S> {
    pub fn new(upstream: S) -> Self {
        Self {
            upstream: Some(upstream),
            reassembler: LineReassembler::new(),
            pending: VecDeque::new(),
            state: StreamState::Reading,
            stats: TranscodeStats::default(),
            verify: false,
        }
    }

    /// Decode every frame again before yielding it; a frame that does not
    /// round-trip ends the stream with [`TranscodeError::Verify`].
    pub fn with_verification(mut self, enabled: bool) -> Self {
        self.verify = enabled;
        self
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn stats(&self) -> TranscodeStats {
        self.stats
    }

    fn process_line(&mut self, line: &str) {
        self.stats.lines += 1;

        match parse_line(line) {
            UpstreamEvent::Data(Some(fragment)) => {
                if let Some(text) = sanitize(&fragment) {
                    let frame = encode_frame(text);
                    self.stats.frames += 1;
                    self.stats.bytes_out += frame.len();
                    self.pending.push_back(frame);
                }
            }
            UpstreamEvent::Done => {
                self.stats.done_markers += 1;
                tracing::trace!("Received [DONE] sentinel");
            }
            UpstreamEvent::Malformed { payload, reason } => {
                self.stats.malformed += 1;
                tracing::warn!(
                    error_type = "malformed_event",
                    error_message = %reason,
                    payload = %payload,
                    "Skipping malformed upstream event"
                );
            }
            UpstreamEvent::Data(None) | UpstreamEvent::Ignored => {}
        }
    }

    fn drain(&mut self) {
        if let Some(line) = self.reassembler.finish() {
            if !line.trim().is_empty() {
                tracing::debug!("Processing remaining buffer ({} bytes)", line.len());
            }
            self.process_line(&line);
        }

        self.state = StreamState::Closed;
        tracing::debug!(
            frames = self.stats.frames,
            lines = self.stats.lines,
            malformed = self.stats.malformed,
            bytes_in = self.stats.bytes_in,
            bytes_out = self.stats.bytes_out,
            "Upstream stream finished"
        );
    }

    fn fail(&mut self, error: TranscodeError) -> TranscodeError {
        self.upstream = None;
        self.reassembler = LineReassembler::new();
        self.pending.clear();
        self.state = StreamState::Errored;

        tracing::error!(
            error_type = error.category(),
            error_message = %error,
            frames = self.stats.frames,
            "Transcoding failed, aborting"
        );

        error
    }
}

impl<S, B, E> Stream for TranscodeStream<S>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
{
    type Item = Result<Bytes, TranscodeError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        loop {
            if let Some(frame) = this.pending.pop_front() {
                if this.verify {
                    if let Err(e) = verify_frame(&frame) {
                        return Poll::Ready(Some(Err(this.fail(e))));
                    }
                }
                return Poll::Ready(Some(Ok(frame)));
            }

            match this.state {
                StreamState::Reading => {
                    let Some(upstream) = this.upstream.as_mut() else {
                        this.state = StreamState::Draining;
                        continue;
                    };

                    let polled = Pin::new(upstream).poll_next(cx);
                    match polled {
                        Poll::Ready(Some(Ok(chunk))) => {
                            let bytes = chunk.as_ref();
                            this.stats.bytes_in += bytes.len();
                            for line in this.reassembler.feed(bytes) {
                                this.process_line(&line);
                            }
                        }
                        Poll::Ready(Some(Err(e))) => {
                            let error = TranscodeError::Upstream(e.to_string());
                            return Poll::Ready(Some(Err(this.fail(error))));
                        }
                        Poll::Ready(None) => {
                            this.upstream = None;
                            this.state = StreamState::Draining;
                        }
                        Poll::Pending => return Poll::Pending,
                    }
                }
                StreamState::Draining => this.drain(),
                StreamState::Closed | StreamState::Errored => return Poll::Ready(None),
            }
        }
    }
}

impl<S, B, E> FusedStream for TranscodeStream<S>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
{
    fn is_terminated(&self) -> bool {
        self.pending.is_empty()
            && matches!(self.state, StreamState::Closed | StreamState::Errored)
    }
}

impl<S> Drop for TranscodeStream<S> {
    fn drop(&mut self) {
        if matches!(self.state, StreamState::Reading | StreamState::Draining) {
            tracing::debug!(
                frames = self.stats.frames,
                "Downstream went away mid-stream, releasing upstream"
            );
        }
    }
}

/// Drive `frames` into an async writer.
///
/// The writer is shut down on every exit path. Frames written before a
/// failure stay written.
pub async fn pipe<S, B, E, W>(
    mut frames: TranscodeStream<S>,
    writer: &mut W,
) -> Result<TranscodeStats, TranscodeError>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
    W: AsyncWrite + Unpin,
{
    let written = write_frames(&mut frames, writer).await;
    drop(frames);

    let closed = writer
        .shutdown()
        .await
        .map_err(|e| TranscodeError::Sink(e.to_string()));

    let stats = written?;
    closed?;
    Ok(stats)
}

async fn write_frames<S, B, E, W>(
    frames: &mut TranscodeStream<S>,
    writer: &mut W,
) -> Result<TranscodeStats, TranscodeError>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = frames.next().await {
        let frame = frame?;
        writer
            .write_all(&frame)
            .await
            .map_err(|e| TranscodeError::Sink(e.to_string()))?;
    }

    writer
        .flush()
        .await
        .map_err(|e| TranscodeError::Sink(e.to_string()))?;

    Ok(frames.stats())
}
