mod error;
mod request;
mod server;
mod upstream;

pub use error::ProxyError;
pub use request::{ChatMessage, ChatRequest, Role, ValidationIssue, parse_chat_request};
pub use server::{AppState, DATA_STREAM_HEADER, ProxyServer, create_router};
pub use upstream::{CompletionRequest, UpstreamClient};
