//! Anthropic provider using the Messages API.
//!
//! Differs from the OpenAI-compatible family in three ways: auth is an
//! `x-api-key` header plus a pinned `anthropic-version`, the system prompt
//! is a top-level field rather than a message, and reply content arrives as
//! a list of typed blocks.

use std::time::Duration;

use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chat::transcript::{ChatMessage, Role, TokenUsage};
use crate::providers::provider::{
    require_messages, send_json, ChatProvider, ChatRequest, ChatReply, ProviderError,
    CHAT_TIMEOUT,
};

pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";

const ANTHROPIC_VERSION: &str = "2023-06-01";

// ============================================================================
// Messages API Types
// ============================================================================

#[derive(Serialize, Debug)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize, Debug)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage>,
}

#[derive(Deserialize, Debug)]
struct MessagesResponse {
    #[serde(default)]
    model: String,
    content: Vec<ContentBlock>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize, Debug)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    block_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Debug)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

// ============================================================================
// Translation Layer
// ============================================================================

/// Splits the conversation into Anthropic's shape: system prompts join into
/// the top-level `system` field, user/assistant turns become the messages
/// array.
fn split_system(messages: &[ChatMessage]) -> (Option<String>, Vec<WireMessage>) {
    let mut system_parts = Vec::new();
    let mut wire = Vec::new();
    for message in messages {
        match message.role {
            Role::System => system_parts.push(message.content.clone()),
            Role::User => wire.push(WireMessage {
                role: "user",
                content: message.content.clone(),
            }),
            Role::Assistant => wire.push(WireMessage {
                role: "assistant",
                content: message.content.clone(),
            }),
        }
    }
    let system = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };
    (system, wire)
}

fn parse_reply(raw: Value) -> Result<ChatReply, ProviderError> {
    let response: MessagesResponse =
        serde_json::from_value(raw).map_err(|e| ProviderError::Parse(e.to_string()))?;
    let content: String = response
        .content
        .iter()
        .filter(|block| block.block_type == "text")
        .map(|block| block.text.as_str())
        .collect();
    if content.is_empty() && response.content.is_empty() {
        return Err(ProviderError::Parse(
            "response contained no content blocks".to_string(),
        ));
    }
    Ok(ChatReply {
        content,
        model: response.model,
        usage: response
            .usage
            .map(|u| TokenUsage::new(u.input_tokens, u.output_tokens)),
    })
}

// ============================================================================
// Provider Implementation
// ============================================================================

pub struct AnthropicProvider {
    api_key: String,
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url,
            timeout: CHAT_TIMEOUT,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn forward(&self, request: ChatRequest<'_>) -> Result<Value, ProviderError> {
        require_messages(&request)?;

        let (system, messages) = split_system(request.messages);
        if messages.is_empty() {
            return Err(ProviderError::InvalidRequest(
                "messages must contain at least one user or assistant turn".to_string(),
            ));
        }

        let payload = MessagesRequest {
            model: request.model.to_string(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system,
            messages,
        };

        info!(
            "anthropic request: model={}, messages={}",
            request.model,
            payload.messages.len()
        );

        let builder = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload);

        send_json(builder, self.timeout).await
    }

    async fn complete(&self, request: ChatRequest<'_>) -> Result<ChatReply, ProviderError> {
        let raw = self.forward(request).await?;
        parse_reply(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_system_hoists_system_prompt() {
        let messages = vec![
            ChatMessage::system("Be brief."),
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
        ];
        let (system, wire) = split_system(&messages);
        assert_eq!(system.as_deref(), Some("Be brief."));
        assert_eq!(wire.len(), 2);
        assert_eq!(wire[0].role, "user");
        assert_eq!(wire[1].role, "assistant");
    }

    #[test]
    fn test_split_system_joins_multiple_prompts() {
        let messages = vec![
            ChatMessage::system("A."),
            ChatMessage::system("B."),
            ChatMessage::user("hi"),
        ];
        let (system, _) = split_system(&messages);
        assert_eq!(system.as_deref(), Some("A.\n\nB."));
    }

    #[test]
    fn test_split_system_none_without_system() {
        let messages = vec![ChatMessage::user("hi")];
        let (system, wire) = split_system(&messages);
        assert!(system.is_none());
        assert_eq!(wire.len(), 1);
    }

    #[test]
    fn test_parse_reply_concatenates_text_blocks() {
        let raw = json!({
            "id": "msg_1",
            "model": "claude-sonnet-4-20250514",
            "content": [
                {"type": "text", "text": "Hello"},
                {"type": "text", "text": " world"}
            ],
            "usage": {"input_tokens": 9, "output_tokens": 2}
        });
        let reply = parse_reply(raw).unwrap();
        assert_eq!(reply.content, "Hello world");
        let usage = reply.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 9);
        assert_eq!(usage.completion_tokens, 2);
        assert_eq!(usage.total_tokens, 11);
    }

    #[test]
    fn test_parse_reply_ignores_non_text_blocks() {
        let raw = json!({
            "model": "claude-sonnet-4-20250514",
            "content": [
                {"type": "thinking", "text": "hmm"},
                {"type": "text", "text": "Answer"}
            ]
        });
        let reply = parse_reply(raw).unwrap();
        assert_eq!(reply.content, "Answer");
    }

    #[test]
    fn test_parse_reply_rejects_empty_content() {
        let raw = json!({"model": "m", "content": []});
        assert!(matches!(parse_reply(raw), Err(ProviderError::Parse(_))));
    }
}
