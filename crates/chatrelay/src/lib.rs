//! chatrelay - streaming relay between an OpenAI-compatible provider and
//! data stream consumers
//!
//! The heart of the crate is [`transcode`], which turns an upstream SSE body
//! into `0:"text"\n` frames incrementally. [`proxy`] wraps it in an HTTP
//! endpoint that validates chat requests and calls the provider.

pub mod config;
pub mod error;
pub mod proxy;
pub mod transcode;

pub use error::RelayError;
