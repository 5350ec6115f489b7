//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::chat::agents::AgentBook;
use crate::chat::client::ChatClient;
use crate::chat::settings::{resolve, ParleySettings};
use crate::providers::{ChatProvider, ChatReply, ChatRequest, ProviderError};

/// A provider that always returns the same reply.
pub struct CannedProvider {
    reply: String,
}

impl CannedProvider {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
        }
    }
}

#[async_trait]
impl ChatProvider for CannedProvider {
    fn name(&self) -> &str {
        "canned"
    }

    async fn forward(&self, _request: ChatRequest<'_>) -> Result<Value, ProviderError> {
        Ok(json!({"canned": self.reply}))
    }

    async fn complete(&self, _request: ChatRequest<'_>) -> Result<ChatReply, ProviderError> {
        Ok(ChatReply {
            content: self.reply.clone(),
            model: "canned-model".to_string(),
            usage: None,
        })
    }
}

/// A provider that always fails with an upstream 500.
pub struct FailingProvider;

#[async_trait]
impl ChatProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn forward(&self, _request: ChatRequest<'_>) -> Result<Value, ProviderError> {
        Err(ProviderError::Api {
            status: 500,
            message: "boom".to_string(),
        })
    }

    async fn complete(&self, _request: ChatRequest<'_>) -> Result<ChatReply, ProviderError> {
        Err(ProviderError::Api {
            status: 500,
            message: "boom".to_string(),
        })
    }
}

/// A provider that never completes, for exercising cancellation.
pub struct StallingProvider;

#[async_trait]
impl ChatProvider for StallingProvider {
    fn name(&self) -> &str {
        "stalling"
    }

    async fn forward(&self, _request: ChatRequest<'_>) -> Result<Value, ProviderError> {
        futures::future::pending().await
    }

    async fn complete(&self, _request: ChatRequest<'_>) -> Result<ChatReply, ProviderError> {
        futures::future::pending().await
    }
}

/// Creates a ChatClient over the given provider with default settings and
/// the default persona.
pub fn test_client(provider: Arc<dyn ChatProvider>) -> ChatClient {
    let settings = resolve(&ParleySettings::default(), None, None, None);
    let agent = AgentBook::default().resolve("assistant").clone();
    ChatClient::new(provider, &settings, agent)
}
