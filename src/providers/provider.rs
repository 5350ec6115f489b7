use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;

use crate::chat::transcript::{ChatMessage, TokenUsage};

/// Timeouts applied per provider operation. Chat completions are quick;
/// media generation is not.
pub const CHAT_TIMEOUT: Duration = Duration::from_secs(60);
pub const MEDIA_TIMEOUT: Duration = Duration::from_secs(120);
pub const VIDEO_TIMEOUT: Duration = Duration::from_secs(180);

/// Errors that can occur during provider operations.
#[derive(Debug)]
pub enum ProviderError {
    /// The vendor requires an API key and none was configured. Maps to 401.
    MissingKey(String),
    /// The request is malformed before it ever leaves the process. Maps to 400.
    InvalidRequest(String),
    /// Network-level failure (DNS, connection refused, broken transfer).
    Network(String),
    /// The vendor returned a non-2xx response. Status is relayed as-is.
    Api { status: u16, message: String },
    /// The vendor's response body couldn't be interpreted.
    Parse(String),
    /// No response within the operation's timeout window. Maps to 504.
    Timeout,
    /// The caller aborted the in-flight request.
    Cancelled,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::MissingKey(provider) => {
                write!(f, "missing API key for {provider}")
            }
            ProviderError::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
            ProviderError::Network(msg) => write!(f, "network error: {msg}"),
            ProviderError::Api { status, message } => {
                write!(f, "API error (HTTP {status}): {message}")
            }
            ProviderError::Parse(msg) => write!(f, "parse error: {msg}"),
            ProviderError::Timeout => write!(f, "request timed out"),
            ProviderError::Cancelled => write!(f, "request cancelled"),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Everything a provider needs to fulfill a chat completion.
pub struct ChatRequest<'a> {
    pub messages: &'a [ChatMessage],
    pub model: &'a str,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// A normalized completion: assistant text plus whatever metadata the
/// vendor reported.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub content: String,
    pub model: String,
    pub usage: Option<TokenUsage>,
}

/// One upstream chat vendor.
///
/// `forward` returns the raw vendor JSON (the gateway relays it untouched);
/// `complete` is `forward` plus normalization into [`ChatReply`] for the
/// chat client.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Returns the name of the provider.
    fn name(&self) -> &str;

    /// Builds the vendor payload, sends it, and returns the raw response body.
    async fn forward(&self, request: ChatRequest<'_>) -> Result<Value, ProviderError>;

    /// Sends the request and normalizes the vendor response.
    async fn complete(&self, request: ChatRequest<'_>) -> Result<ChatReply, ProviderError>;
}

/// Sends a prepared request under `timeout` and returns the parsed JSON body.
///
/// Non-2xx responses become `ProviderError::Api` carrying the body text;
/// elapsed timers become `ProviderError::Timeout`. Shared by every provider
/// so the error taxonomy stays uniform.
pub(crate) async fn send_json(
    request: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<Value, ProviderError> {
    let response = tokio::time::timeout(timeout, request.send())
        .await
        .map_err(|_| ProviderError::Timeout)?
        .map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

    let status = response.status();
    debug!("Upstream response status: {}", status);

    if !status.is_success() {
        let message = tokio::time::timeout(timeout, response.text())
            .await
            .map_err(|_| ProviderError::Timeout)?
            .unwrap_or_else(|_| "unknown error".to_string());
        warn!("Upstream API error: {} - {}", status.as_u16(), message);
        return Err(ProviderError::Api {
            status: status.as_u16(),
            message,
        });
    }

    tokio::time::timeout(timeout, response.json::<Value>())
        .await
        .map_err(|_| ProviderError::Timeout)?
        .map_err(|e| ProviderError::Parse(e.to_string()))
}

/// Rejects a request with no user-visible content before it leaves the
/// process.
pub(crate) fn require_messages(request: &ChatRequest<'_>) -> Result<(), ProviderError> {
    if request.messages.is_empty() {
        return Err(ProviderError::InvalidRequest(
            "messages must not be empty".to_string(),
        ));
    }
    if request.model.is_empty() {
        return Err(ProviderError::InvalidRequest(
            "model must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProviderError::Api {
            status: 429,
            message: "rate limited".to_string(),
        };
        assert_eq!(err.to_string(), "API error (HTTP 429): rate limited");
        assert_eq!(ProviderError::Timeout.to_string(), "request timed out");
        assert_eq!(
            ProviderError::MissingKey("anthropic".to_string()).to_string(),
            "missing API key for anthropic"
        );
    }

    #[test]
    fn test_require_messages_rejects_empty() {
        let request = ChatRequest {
            messages: &[],
            model: "m",
            max_tokens: 16,
            temperature: 0.0,
        };
        assert!(matches!(
            require_messages(&request),
            Err(ProviderError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_require_messages_rejects_empty_model() {
        let messages = vec![crate::chat::transcript::ChatMessage::user("hi")];
        let request = ChatRequest {
            messages: &messages,
            model: "",
            max_tokens: 16,
            temperature: 0.0,
        };
        assert!(matches!(
            require_messages(&request),
            Err(ProviderError::InvalidRequest(_))
        ));
    }
}
