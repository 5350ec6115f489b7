//! Gateway route handlers.
//!
//! Every handler follows the same shape: resolve the API key (request
//! header first, then whatever the server resolved from env/config),
//! validate the JSON body, hand the request to the provider layer, and
//! relay the raw vendor JSON or the error envelope. The routes hold no
//! state between requests and never retry.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use log::info;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::chat::settings::{ProviderEndpoint, ResolvedSettings};
use crate::chat::transcript::ChatMessage;
use crate::gateway::error::GatewayError;
use crate::providers::anthropic::DEFAULT_ANTHROPIC_MODEL;
use crate::providers::fal::DEFAULT_FAL_VIDEO_MODEL;
use crate::providers::gemini::{DEFAULT_GEMINI_IMAGE_MODEL, DEFAULT_GEMINI_MODEL};
use crate::providers::openai::{DEFAULT_DEEPSEEK_MODEL, DEFAULT_GROK_MODEL};
use crate::providers::qwen::{
    DEFAULT_QWEN_MODEL, DEFAULT_QWEN_TTS_MODEL, DEFAULT_QWEN_TTS_VOICE,
};
use crate::providers::{
    AnthropicProvider, ChatProvider, ChatRequest, FalProvider, GeminiProvider, OpenAiProvider,
    QwenProvider,
};
use crate::ProviderKind;

#[derive(Clone)]
pub struct GatewayState {
    pub settings: Arc<ResolvedSettings>,
}

impl GatewayState {
    pub fn new(settings: Arc<ResolvedSettings>) -> Self {
        Self { settings }
    }
}

pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/anthropic", post(anthropic_route))
        .route("/api/deepseek", post(deepseek_route))
        .route("/api/grok", post(grok_route))
        .route("/api/qwen", post(qwen_route))
        .route("/api/qwen/tts", post(qwen_tts_route))
        .route("/api/gemini", post(gemini_route))
        .route("/api/gemini/generate-image", post(gemini_image_route))
        .route("/api/fal-video", post(fal_video_route))
        .with_state(state)
}

// ============================================================================
// Request Bodies
// ============================================================================

#[derive(Deserialize, Debug)]
struct IncomingMessage {
    role: String,
    content: String,
}

#[derive(Deserialize, Debug)]
struct ProxyChatBody {
    #[serde(default)]
    messages: Vec<IncomingMessage>,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

#[derive(Deserialize, Debug)]
struct ProxyTtsBody {
    text: Option<String>,
    model: Option<String>,
    voice: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ProxyPromptBody {
    prompt: Option<String>,
    model: Option<String>,
}

// ============================================================================
// Shared Plumbing
// ============================================================================

/// Parses the request body, mapping any JSON failure to a 400.
fn parse_body<T: DeserializeOwned>(bytes: &Bytes) -> Result<T, GatewayError> {
    serde_json::from_slice(bytes)
        .map_err(|e| GatewayError::BadRequest(format!("malformed JSON body: {e}")))
}

/// Key selection: request header first, then the server-side key (env var
/// or config file, folded in at startup).
fn resolve_key(
    headers: &HeaderMap,
    header_name: &str,
    endpoint: &ProviderEndpoint,
    provider: &str,
) -> Result<String, GatewayError> {
    if let Some(value) = headers.get(header_name).and_then(|v| v.to_str().ok()) {
        if !value.is_empty() {
            return Ok(value.to_string());
        }
    }
    endpoint
        .api_key
        .clone()
        .ok_or_else(|| GatewayError::MissingKey(provider.to_string()))
}

fn to_chat_messages(incoming: Vec<IncomingMessage>) -> Result<Vec<ChatMessage>, GatewayError> {
    if incoming.is_empty() {
        return Err(GatewayError::BadRequest(
            "messages must not be empty".to_string(),
        ));
    }
    incoming
        .into_iter()
        .map(|m| match m.role.as_str() {
            "user" => Ok(ChatMessage::user(m.content)),
            "assistant" => Ok(ChatMessage::assistant(m.content)),
            "system" => Ok(ChatMessage::system(m.content)),
            other => Err(GatewayError::BadRequest(format!("unknown role '{other}'"))),
        })
        .collect()
}

fn build_chat_provider(
    kind: ProviderKind,
    key: String,
    base_url: String,
    timeout: Duration,
) -> Result<Box<dyn ChatProvider>, GatewayError> {
    let provider: Box<dyn ChatProvider> = match kind {
        ProviderKind::Anthropic => {
            Box::new(AnthropicProvider::new(key, base_url).with_timeout(timeout))
        }
        ProviderKind::DeepSeek => {
            Box::new(OpenAiProvider::deepseek(key, base_url).with_timeout(timeout))
        }
        ProviderKind::Grok => Box::new(OpenAiProvider::grok(key, base_url).with_timeout(timeout)),
        ProviderKind::Qwen => Box::new(QwenProvider::new(key, base_url).with_timeout(timeout)),
        ProviderKind::Gemini => {
            Box::new(GeminiProvider::new(key, base_url).with_timeout(timeout))
        }
        other => {
            return Err(GatewayError::Internal(format!(
                "{other} has no chat relay route"
            )))
        }
    };
    Ok(provider)
}

/// The shared chat-relay path: key, body, provider, forward, relay raw JSON.
async fn relay_chat(
    state: &GatewayState,
    headers: &HeaderMap,
    bytes: &Bytes,
    kind: ProviderKind,
    default_model: &str,
) -> Result<Json<Value>, GatewayError> {
    let endpoint = state.settings.endpoint(kind);
    let key = resolve_key(headers, "x-api-key", endpoint, kind.as_str())?;
    let body: ProxyChatBody = parse_body(bytes)?;
    let messages = to_chat_messages(body.messages)?;
    let model = body
        .model
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| default_model.to_string());

    info!("relay {}: model={}, messages={}", kind, model, messages.len());

    let provider = build_chat_provider(
        kind,
        key,
        endpoint.base_url.clone(),
        state.settings.chat_timeout(),
    )?;
    let raw = provider
        .forward(ChatRequest {
            messages: &messages,
            model: &model,
            max_tokens: body.max_tokens.unwrap_or(state.settings.max_tokens),
            temperature: body.temperature.unwrap_or(state.settings.temperature),
        })
        .await?;
    Ok(Json(raw))
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn anthropic_route(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Result<Json<Value>, GatewayError> {
    relay_chat(
        &state,
        &headers,
        &bytes,
        ProviderKind::Anthropic,
        DEFAULT_ANTHROPIC_MODEL,
    )
    .await
}

async fn deepseek_route(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Result<Json<Value>, GatewayError> {
    relay_chat(
        &state,
        &headers,
        &bytes,
        ProviderKind::DeepSeek,
        DEFAULT_DEEPSEEK_MODEL,
    )
    .await
}

async fn grok_route(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Result<Json<Value>, GatewayError> {
    relay_chat(&state, &headers, &bytes, ProviderKind::Grok, DEFAULT_GROK_MODEL).await
}

async fn qwen_route(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Result<Json<Value>, GatewayError> {
    relay_chat(&state, &headers, &bytes, ProviderKind::Qwen, DEFAULT_QWEN_MODEL).await
}

async fn qwen_tts_route(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Result<Json<Value>, GatewayError> {
    let endpoint = state.settings.endpoint(ProviderKind::Qwen);
    let key = resolve_key(&headers, "x-api-key", endpoint, "qwen")?;
    let body: ProxyTtsBody = parse_body(&bytes)?;
    let text = body
        .text
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| GatewayError::BadRequest("text must not be empty".to_string()))?;
    let model = body
        .model
        .unwrap_or_else(|| DEFAULT_QWEN_TTS_MODEL.to_string());
    let voice = body
        .voice
        .unwrap_or_else(|| DEFAULT_QWEN_TTS_VOICE.to_string());

    let provider = QwenProvider::new(key, endpoint.base_url.clone())
        .with_timeout(state.settings.media_timeout());
    let raw = provider.synthesize_speech(&text, &model, &voice).await?;
    Ok(Json(raw))
}

async fn gemini_route(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Result<Json<Value>, GatewayError> {
    relay_chat(
        &state,
        &headers,
        &bytes,
        ProviderKind::Gemini,
        DEFAULT_GEMINI_MODEL,
    )
    .await
}

async fn gemini_image_route(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Result<Json<Value>, GatewayError> {
    let endpoint = state.settings.endpoint(ProviderKind::Gemini);
    let key = resolve_key(&headers, "x-api-key", endpoint, "gemini")?;
    let body: ProxyPromptBody = parse_body(&bytes)?;
    let prompt = body
        .prompt
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| GatewayError::BadRequest("prompt must not be empty".to_string()))?;
    let model = body
        .model
        .unwrap_or_else(|| DEFAULT_GEMINI_IMAGE_MODEL.to_string());

    let provider = GeminiProvider::new(key, endpoint.base_url.clone())
        .with_timeout(state.settings.media_timeout());
    let raw = provider.generate_image(&prompt, &model).await?;
    Ok(Json(raw))
}

async fn fal_video_route(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Result<Json<Value>, GatewayError> {
    let endpoint = state.settings.endpoint(ProviderKind::Fal);
    let key = resolve_key(&headers, "x-fal-key", endpoint, "fal")?;
    let body: ProxyPromptBody = parse_body(&bytes)?;
    let prompt = body
        .prompt
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| GatewayError::BadRequest("prompt must not be empty".to_string()))?;
    let model = body
        .model
        .unwrap_or_else(|| DEFAULT_FAL_VIDEO_MODEL.to_string());

    let provider = FalProvider::new(key, endpoint.base_url.clone())
        .with_timeout(state.settings.video_timeout());
    let raw = provider.generate_video(&prompt, &model).await?;
    Ok(Json(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_chat_messages_rejects_empty() {
        assert!(matches!(
            to_chat_messages(vec![]),
            Err(GatewayError::BadRequest(_))
        ));
    }

    #[test]
    fn test_to_chat_messages_rejects_unknown_role() {
        let incoming = vec![IncomingMessage {
            role: "tool".to_string(),
            content: "x".to_string(),
        }];
        assert!(matches!(
            to_chat_messages(incoming),
            Err(GatewayError::BadRequest(_))
        ));
    }

    #[test]
    fn test_to_chat_messages_maps_roles() {
        let incoming = vec![
            IncomingMessage {
                role: "system".to_string(),
                content: "s".to_string(),
            },
            IncomingMessage {
                role: "user".to_string(),
                content: "u".to_string(),
            },
            IncomingMessage {
                role: "assistant".to_string(),
                content: "a".to_string(),
            },
        ];
        let messages = to_chat_messages(incoming).unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].content, "u");
    }

    #[test]
    fn test_resolve_key_prefers_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", "from-header".parse().unwrap());
        let endpoint = ProviderEndpoint {
            api_key: Some("from-config".to_string()),
            base_url: "http://example".to_string(),
        };
        let key = resolve_key(&headers, "x-api-key", &endpoint, "anthropic").unwrap();
        assert_eq!(key, "from-header");
    }

    #[test]
    fn test_resolve_key_falls_back_to_endpoint() {
        let headers = HeaderMap::new();
        let endpoint = ProviderEndpoint {
            api_key: Some("from-config".to_string()),
            base_url: "http://example".to_string(),
        };
        let key = resolve_key(&headers, "x-api-key", &endpoint, "anthropic").unwrap();
        assert_eq!(key, "from-config");
    }

    #[test]
    fn test_resolve_key_missing_everywhere() {
        let headers = HeaderMap::new();
        let endpoint = ProviderEndpoint {
            api_key: None,
            base_url: "http://example".to_string(),
        };
        assert!(matches!(
            resolve_key(&headers, "x-api-key", &endpoint, "anthropic"),
            Err(GatewayError::MissingKey(_))
        ));
    }
}
