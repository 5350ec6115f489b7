//! Fal AI provider for video generation.
//!
//! Fal is media-only: no chat surface. The synchronous `fal.run` endpoint
//! addresses the model in the URL path and authenticates with a `Key`
//! authorization scheme rather than a bearer token.

use std::time::Duration;

use log::info;
use serde::Serialize;
use serde_json::Value;

use crate::providers::provider::{send_json, ProviderError, VIDEO_TIMEOUT};

pub const DEFAULT_FAL_VIDEO_MODEL: &str = "fal-ai/ltx-video";

#[derive(Serialize, Debug)]
struct VideoRequest {
    prompt: String,
}

/// Pulls the video URL out of a raw generation response.
pub fn extract_video_url(raw: &Value) -> Result<String, ProviderError> {
    raw.pointer("/video/url")
        .and_then(Value::as_str)
        .map(|s| s.to_string())
        .ok_or_else(|| ProviderError::Parse("response contained no video URL".to_string()))
}

pub struct FalProvider {
    api_key: String,
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl FalProvider {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url,
            timeout: VIDEO_TIMEOUT,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Generates a video from a text prompt. Returns the raw vendor JSON;
    /// use [`extract_video_url`] to pull out the result location.
    pub async fn generate_video(
        &self,
        prompt: &str,
        model: &str,
    ) -> Result<Value, ProviderError> {
        if prompt.trim().is_empty() {
            return Err(ProviderError::InvalidRequest(
                "prompt must not be empty".to_string(),
            ));
        }

        let payload = VideoRequest {
            prompt: prompt.to_string(),
        };

        info!("fal video request: model={}", model);

        let builder = self
            .client
            .post(format!("{}/{}", self.base_url, model))
            .header("Authorization", format!("Key {}", self.api_key))
            .json(&payload);

        send_json(builder, self.timeout).await
    }
}
