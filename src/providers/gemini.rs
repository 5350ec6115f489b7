//! Google Gemini provider using the `generateContent` API.
//!
//! Gemini's schema is camelCase throughout, addresses the model in the URL
//! path, calls the assistant role "model", and nests message text inside
//! `parts`. Image generation rides the same endpoint with an image response
//! modality and returns base64 `inlineData`.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chat::transcript::{ChatMessage, Role, TokenUsage};
use crate::providers::provider::{
    require_messages, send_json, ChatProvider, ChatRequest, ChatReply, ProviderError,
    CHAT_TIMEOUT, MEDIA_TIMEOUT,
};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_GEMINI_IMAGE_MODEL: &str = "gemini-2.0-flash-preview-image-generation";

// ============================================================================
// generateContent API Types
// ============================================================================

#[derive(Serialize, Debug)]
struct Part {
    text: String,
}

#[derive(Serialize, Debug)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize, Debug)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<&'static str>>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: String,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct CandidatePart {
    #[serde(default)]
    text: String,
    inline_data: Option<InlineData>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

/// A decoded image from an image-generation response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime: String,
}

// ============================================================================
// Translation Layer
// ============================================================================

/// Converts the conversation to Gemini's shape: system prompts join into
/// `systemInstruction`, and the assistant role is spelled "model".
fn split_contents(messages: &[ChatMessage]) -> (Option<SystemInstruction>, Vec<Content>) {
    let mut system_parts = Vec::new();
    let mut contents = Vec::new();
    for message in messages {
        match message.role {
            Role::System => system_parts.push(Part {
                text: message.content.clone(),
            }),
            Role::User => contents.push(Content {
                role: "user",
                parts: vec![Part {
                    text: message.content.clone(),
                }],
            }),
            Role::Assistant => contents.push(Content {
                role: "model",
                parts: vec![Part {
                    text: message.content.clone(),
                }],
            }),
        }
    }
    let system = if system_parts.is_empty() {
        None
    } else {
        Some(SystemInstruction {
            parts: system_parts,
        })
    };
    (system, contents)
}

fn parse_reply(raw: Value) -> Result<ChatReply, ProviderError> {
    let response: GenerateContentResponse =
        serde_json::from_value(raw).map_err(|e| ProviderError::Parse(e.to_string()))?;
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Parse("response contained no candidates".to_string()))?;
    let content: String = candidate
        .content
        .parts
        .iter()
        .map(|p| p.text.as_str())
        .collect();
    Ok(ChatReply {
        content,
        model: response.model_version,
        usage: response
            .usage_metadata
            .map(|u| TokenUsage::new(u.prompt_token_count, u.candidates_token_count)),
    })
}

/// Pulls the first base64 `inlineData` image out of a raw image-generation
/// response and decodes it.
pub fn extract_image(raw: &Value) -> Result<GeneratedImage, ProviderError> {
    let response: GenerateContentResponse = serde_json::from_value(raw.clone())
        .map_err(|e| ProviderError::Parse(e.to_string()))?;
    for candidate in response.candidates {
        for part in candidate.content.parts {
            if let Some(inline) = part.inline_data {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(inline.data.as_bytes())
                    .map_err(|e| ProviderError::Parse(format!("bad image data: {e}")))?;
                return Ok(GeneratedImage {
                    bytes,
                    mime: inline.mime_type,
                });
            }
        }
    }
    Err(ProviderError::Parse(
        "response contained no image data".to_string(),
    ))
}

// ============================================================================
// Provider Implementation
// ============================================================================

pub struct GeminiProvider {
    api_key: String,
    base_url: String,
    timeout: Duration,
    media_timeout: Duration,
    client: reqwest::Client,
}

impl GeminiProvider {
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

    fn generate_url(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }

    /// Generates an image from a text prompt. Returns the raw vendor JSON;
    /// use [`extract_image`] to decode the inline payload.
    pub async fn generate_image(
        &self,
        prompt: &str,
        model: &str,
    ) -> Result<Value, ProviderError> {
        if prompt.trim().is_empty() {
            return Err(ProviderError::InvalidRequest(
                "prompt must not be empty".to_string(),
            ));
        }

        let payload = GenerateContentRequest {
            system_instruction: None,
            contents: vec![Content {
                role: "user",
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: None,
                temperature: None,
                response_modalities: Some(vec!["TEXT", "IMAGE"]),
            },
        };

        info!("gemini image request: model={}", model);

        let builder = self
            .client
            .post(self.generate_url(model))
            .header("x-goog-api-key", &self.api_key)
            .json(&payload);

        send_json(builder, self.media_timeout).await
    }
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn forward(&self, request: ChatRequest<'_>) -> Result<Value, ProviderError> {
        require_messages(&request)?;

        let (system_instruction, contents) = split_contents(request.messages);
        if contents.is_empty() {
            return Err(ProviderError::InvalidRequest(
                "messages must contain at least one user or assistant turn".to_string(),
            ));
        }

        let payload = GenerateContentRequest {
            system_instruction,
            contents,
            generation_config: GenerationConfig {
                max_output_tokens: Some(request.max_tokens),
                temperature: Some(request.temperature),
                response_modalities: None,
            },
        };

        info!(
            "gemini request: model={}, contents={}",
            request.model,
            payload.contents.len()
        );

        let builder = self
            .client
            .post(self.generate_url(request.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&payload);

        send_json(builder, self.timeout).await
    }

    async fn complete(&self, request: ChatRequest<'_>) -> Result<ChatReply, ProviderError> {
        let raw = self.forward(request).await?;
        parse_reply(raw)
    }
}
