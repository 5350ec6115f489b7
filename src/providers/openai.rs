//! OpenAI-compatible chat completions.
//!
//! OpenAI, DeepSeek, Grok, and locally hosted servers (LM Studio, Ollama,
//! llama.cpp) all speak the same `/chat/completions` schema; only the base
//! URL and auth differ. One implementation covers all four.

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

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_DEEPSEEK_MODEL: &str = "deepseek-chat";
pub const DEFAULT_GROK_MODEL: &str = "grok-3";
pub const DEFAULT_LOCAL_MODEL: &str = "local-model";

// ============================================================================
// Chat Completions API Types
// ============================================================================

#[derive(Serialize, Debug, Clone)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize, Debug)]
struct CompletionsRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize, Debug)]
struct CompletionsResponse {
    #[serde(default)]
    model: String,
    choices: Vec<Choice>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize, Debug)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

// ============================================================================
// Translation Layer
// ============================================================================

fn messages_to_wire(messages: &[ChatMessage]) -> Vec<WireMessage> {
    messages
        .iter()
        .map(|m| WireMessage {
            role: match m.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: m.content.clone(),
        })
        .collect()
}

fn parse_reply(raw: Value) -> Result<ChatReply, ProviderError> {
    let response: CompletionsResponse =
        serde_json::from_value(raw).map_err(|e| ProviderError::Parse(e.to_string()))?;
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Parse("response contained no choices".to_string()))?;
    Ok(ChatReply {
        content: choice.message.content,
        model: response.model,
        usage: response
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens)),
    })
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// A chat vendor speaking the OpenAI completions schema.
pub struct OpenAiProvider {
    name: &'static str,
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiProvider {
    fn build(name: &'static str, api_key: Option<String>, base_url: String) -> Self {
        Self {
            name,
            api_key,
            base_url,
            timeout: CHAT_TIMEOUT,
            client: reqwest::Client::new(),
        }
    }

    pub fn openai(api_key: String, base_url: String) -> Self {
        Self::build("openai", Some(api_key), base_url)
    }

    pub fn deepseek(api_key: String, base_url: String) -> Self {
        Self::build("deepseek", Some(api_key), base_url)
    }

    pub fn grok(api_key: String, base_url: String) -> Self {
        Self::build("grok", Some(api_key), base_url)
    }

    /// Locally hosted OpenAI-compatible server; no auth.
    pub fn local(base_url: String) -> Self {
        Self::build("local", None, base_url)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn forward(&self, request: ChatRequest<'_>) -> Result<Value, ProviderError> {
        require_messages(&request)?;

        let payload = CompletionsRequest {
            model: request.model.to_string(),
            messages: messages_to_wire(request.messages),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        info!(
            "{} request: model={}, messages={}",
            self.name,
            request.model,
            payload.messages.len()
        );

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&payload);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        send_json(builder, self.timeout).await
    }

    async fn complete(&self, request: ChatRequest<'_>) -> Result<ChatReply, ProviderError> {
        let raw = self.forward(request).await?;
        parse_reply(raw)
    }
}
