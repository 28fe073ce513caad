//! Chat request parsing and validation
//!
//! Requests arrive as `{"messages": [{"role": "...", "content": "..."}]}`.
//! Validation reports every violated rule at once; content is then trimmed
//! and capped before it is forwarded upstream.

use serde::{Deserialize, Serialize};

use crate::config::LimitsConfig;

use super::error::ProxyError;

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A single chat message, as received and as forwarded upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Incoming chat request body
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

/// One violated validation rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Location of the offending value (e.g. `messages.2.content`)
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl ChatRequest {
    /// Check message count and content length limits
    pub fn validate(&self, limits: &LimitsConfig) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if self.messages.is_empty() {
            issues.push(ValidationIssue::new(
                "messages",
                "At least 1 message is required",
            ));
        } else if self.messages.len() > limits.max_messages {
            issues.push(ValidationIssue::new(
                "messages",
                format!("At most {} messages are allowed", limits.max_messages),
            ));
        }

        for (i, message) in self.messages.iter().enumerate() {
            let chars = message.content.chars().count();
            if chars == 0 {
                issues.push(ValidationIssue::new(
                    format!("messages.{i}.content"),
                    "Content must not be empty",
                ));
            } else if chars > limits.max_content_chars {
                issues.push(ValidationIssue::new(
                    format!("messages.{i}.content"),
                    format!(
                        "Content must be at most {} characters",
                        limits.max_content_chars
                    ),
                ));
            }
        }

        issues
    }

    /// Trim every message and cap it at the content limit
    pub fn into_sanitized(self, limits: &LimitsConfig) -> Vec<ChatMessage> {
        self.messages
            .into_iter()
            .map(|m| ChatMessage {
                role: m.role,
                content: m
                    .content
                    .trim()
                    .chars()
                    .take(limits.max_content_chars)
                    .collect(),
            })
            .collect()
    }
}

/// Parse, validate and sanitize a raw request body
pub fn parse_chat_request(
    body: &[u8],
    limits: &LimitsConfig,
) -> Result<Vec<ChatMessage>, ProxyError> {
    let request: ChatRequest = serde_json::from_slice(body).map_err(|e| {
        ProxyError::Validation(vec![ValidationIssue::new("body", e.to_string())])
    })?;

    let issues = request.validate(limits);
    if !issues.is_empty() {
        return Err(ProxyError::Validation(issues));
    }

    Ok(request.into_sanitized(limits))
}
