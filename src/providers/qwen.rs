//! Alibaba Qwen provider using the DashScope generation API.
//!
//! DashScope wraps the conversation in an `input` object and tuning knobs in
//! `parameters`; with `result_format = "message"` replies come back in an
//! OpenAI-style `output.choices` array. Speech synthesis rides the
//! multimodal endpoint and returns a temporary audio URL.

use std::time::Duration;

use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chat::transcript::{ChatMessage, Role, TokenUsage};
use crate::providers::provider::{
    require_messages, send_json, ChatProvider, ChatRequest, ChatReply, ProviderError,
    CHAT_TIMEOUT, MEDIA_TIMEOUT,
};

pub const DEFAULT_QWEN_MODEL: &str = "qwen-plus";
pub const DEFAULT_QWEN_TTS_MODEL: &str = "qwen-tts";
pub const DEFAULT_QWEN_TTS_VOICE: &str = "Cherry";

const GENERATION_PATH: &str = "/api/v1/services/aigc/text-generation/generation";
const MULTIMODAL_PATH: &str = "/api/v1/services/aigc/multimodal-generation/generation";

// ============================================================================
// DashScope API Types
// ============================================================================

#[derive(Serialize, Debug)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize, Debug)]
struct GenerationInput {
    messages: Vec<WireMessage>,
}

#[derive(Serialize, Debug)]
struct GenerationParameters {
    result_format: &'static str,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize, Debug)]
struct GenerationRequest {
    model: String,
    input: GenerationInput,
    parameters: GenerationParameters,
}

#[derive(Serialize, Debug)]
struct TtsInput {
    text: String,
    voice: String,
}

#[derive(Serialize, Debug)]
struct TtsRequest {
    model: String,
    input: TtsInput,
}

#[derive(Deserialize, Debug)]
struct GenerationResponse {
    output: GenerationOutput,
    usage: Option<WireUsage>,
}

#[derive(Deserialize, Debug)]
struct GenerationOutput {
    #[serde(default)]
    choices: Vec<Choice>,
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
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
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

fn parse_reply(raw: Value, model: &str) -> Result<ChatReply, ProviderError> {
    let response: GenerationResponse =
        serde_json::from_value(raw).map_err(|e| ProviderError::Parse(e.to_string()))?;
    let choice = response
        .output
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Parse("response contained no choices".to_string()))?;
    Ok(ChatReply {
        content: choice.message.content,
        model: model.to_string(),
        usage: response
            .usage
            .map(|u| TokenUsage::new(u.input_tokens, u.output_tokens)),
    })
}

/// Pulls the temporary audio URL out of a raw speech-synthesis response.
pub fn extract_audio_url(raw: &Value) -> Result<String, ProviderError> {
    raw.pointer("/output/audio/url")
        .and_then(Value::as_str)
        .map(|s| s.to_string())
        .ok_or_else(|| ProviderError::Parse("response contained no audio URL".to_string()))
}

// ============================================================================
// Provider Implementation
// ============================================================================

pub struct QwenProvider {
    api_key: String,
    base_url: String,
    timeout: Duration,
    media_timeout: Duration,
    client: reqwest::Client,
}

impl QwenProvider {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url,
            timeout: CHAT_TIMEOUT,
            media_timeout: MEDIA_TIMEOUT,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.media_timeout = timeout;
        self
    }

    /// Synthesizes speech from text. Returns the raw vendor JSON; use
    /// [`extract_audio_url`] to pull out the clip location.
    pub async fn synthesize_speech(
        &self,
        text: &str,
        model: &str,
        voice: &str,
    ) -> Result<Value, ProviderError> {
        if text.trim().is_empty() {
            return Err(ProviderError::InvalidRequest(
                "text must not be empty".to_string(),
            ));
        }

        let payload = TtsRequest {
            model: model.to_string(),
            input: TtsInput {
                text: text.to_string(),
                voice: voice.to_string(),
            },
        };

        info!("qwen tts request: model={}, voice={}", model, voice);

        let builder = self
            .client
            .post(format!("{}{}", self.base_url, MULTIMODAL_PATH))
            .bearer_auth(&self.api_key)
            .json(&payload);

        send_json(builder, self.media_timeout).await
    }
}

#[async_trait]
impl ChatProvider for QwenProvider {
    fn name(&self) -> &str {
        "qwen"
    }

    async fn forward(&self, request: ChatRequest<'_>) -> Result<Value, ProviderError> {
        require_messages(&request)?;

        let payload = GenerationRequest {
            model: request.model.to_string(),
            input: GenerationInput {
                messages: messages_to_wire(request.messages),
            },
            parameters: GenerationParameters {
                result_format: "message",
                max_tokens: request.max_tokens,
                temperature: request.temperature,
            },
        };

        info!(
            "qwen request: model={}, messages={}",
            request.model,
            payload.input.messages.len()
        );

        let builder = self
            .client
            .post(format!("{}{}", self.base_url, GENERATION_PATH))
            .bearer_auth(&self.api_key)
            .json(&payload);

        send_json(builder, self.timeout).await
    }

    async fn complete(&self, request: ChatRequest<'_>) -> Result<ChatReply, ProviderError> {
        let model = request.model.to_string();
        let raw = self.forward(request).await?;
        parse_reply(raw, &model)
    }
}
