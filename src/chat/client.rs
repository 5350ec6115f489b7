//! # Chat Client
//!
//! The provider-agnostic send loop: append the user message, dispatch to
//! the configured provider, fold the normalized reply back into the
//! conversation with its metadata. Persistence is the caller's concern -
//! the client never touches disk, which keeps it trivial to test.

use std::sync::{Arc, Mutex};

use futures::future::{AbortHandle, Abortable};
use log::debug;

use crate::chat::agents::AgentEntry;
use crate::chat::settings::ResolvedSettings;
use crate::chat::transcript::{ChatMessage, Conversation};
use crate::providers::{ChatProvider, ChatRequest, ProviderError};

pub struct ChatClient {
    provider: Arc<dyn ChatProvider>,
    pub conversation: Conversation,
    pub model: String,
    max_tokens: u32,
    temperature: f32,
    agent: AgentEntry,
    /// Abort handle for the in-flight request, if any. Shared so `cancel`
    /// can be called from another task.
    abort: Arc<Mutex<Option<AbortHandle>>>,
}

impl ChatClient {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        settings: &ResolvedSettings,
        agent: AgentEntry,
    ) -> Self {
        Self {
            provider,
            conversation: Conversation::with_system(&agent.prompt),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            agent,
            abort: Arc::new(Mutex::new(None)),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn agent_name(&self) -> &str {
        &self.agent.name
    }

    /// Switches the active persona; takes effect from the next request.
    pub fn set_agent(&mut self, agent: AgentEntry) {
        self.conversation.set_system(&agent.prompt);
        self.agent = agent;
    }

    /// Drops the dialogue and starts over with the current persona.
    pub fn reset(&mut self) {
        self.conversation = Conversation::with_system(&self.agent.prompt);
    }

    /// Returns a handle that aborts the in-flight request, for wiring up to
    /// a cancel action outside the send call.
    pub fn cancel_handle(&self) -> Arc<Mutex<Option<AbortHandle>>> {
        Arc::clone(&self.abort)
    }

    /// Aborts the in-flight request, if any. The pending `send` returns
    /// `ProviderError::Cancelled`; the user message stays in the
    /// conversation.
    pub fn cancel(&self) {
        if let Some(handle) = self.abort.lock().expect("abort lock poisoned").take() {
            debug!("Cancelling in-flight request");
            handle.abort();
        }
    }

    /// Sends one user message and appends the assistant reply.
    ///
    /// On error the conversation keeps the user message so the caller can
    /// retry or edit; nothing is retried automatically.
    pub async fn send(&mut self, text: &str) -> Result<&ChatMessage, ProviderError> {
        if text.trim().is_empty() {
            return Err(ProviderError::InvalidRequest(
                "message must not be empty".to_string(),
            ));
        }

        self.conversation.add_user_message(text);

        let (handle, registration) = AbortHandle::new_pair();
        *self.abort.lock().expect("abort lock poisoned") = Some(handle);

        let result = {
            let request = ChatRequest {
                messages: &self.conversation.messages,
                model: &self.model,
                max_tokens: self.max_tokens,
                temperature: self.temperature,
            };
            Abortable::new(self.provider.complete(request), registration).await
        };

        self.abort.lock().expect("abort lock poisoned").take();

        let reply = match result {
            Err(_aborted) => return Err(ProviderError::Cancelled),
            Ok(inner) => inner?,
        };

        let mut message = ChatMessage::assistant(reply.content);
        message.provider = Some(self.provider.name().to_string());
        message.model = if reply.model.is_empty() {
            Some(self.model.clone())
        } else {
            Some(reply.model)
        };
        message.usage = reply.usage;

        Ok(self.conversation.push(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::transcript::Role;
    use crate::test_support::{test_client, CannedProvider, FailingProvider, StallingProvider};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_send_appends_user_and_assistant() {
        let mut client = test_client(Arc::new(CannedProvider::new("canned reply")));
        let reply = client.send("hello").await.unwrap();
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.content, "canned reply");
        assert_eq!(reply.provider.as_deref(), Some("canned"));

        // system + user + assistant
        assert_eq!(client.conversation.messages.len(), 3);
        assert!(client.conversation.has_dialogue());
    }

    #[tokio::test]
    async fn test_send_rejects_blank_input() {
        let mut client = test_client(Arc::new(CannedProvider::new("x")));
        assert!(matches!(
            client.send("   ").await,
            Err(ProviderError::InvalidRequest(_))
        ));
        assert_eq!(client.conversation.messages.len(), 1); // system only
    }

    #[tokio::test]
    async fn test_send_error_keeps_user_message() {
        let mut client = test_client(Arc::new(FailingProvider));
        let result = client.send("hello").await;
        assert!(matches!(result, Err(ProviderError::Api { status: 500, .. })));
        assert_eq!(client.conversation.messages.len(), 2); // system + user
    }

    #[tokio::test]
    async fn test_cancel_aborts_in_flight_request() {
        let mut client = test_client(Arc::new(StallingProvider));
        let abort = client.cancel_handle();

        let canceller = tokio::spawn(async move {
            // Wait for the request to register its abort handle, then fire.
            loop {
                if let Some(handle) = abort.lock().unwrap().take() {
                    handle.abort();
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        });

        let result = client.send("hello").await;
        canceller.await.unwrap();

        assert!(matches!(result, Err(ProviderError::Cancelled)));
        assert_eq!(client.conversation.messages.len(), 2); // system + user
    }

    #[tokio::test]
    async fn test_reset_keeps_persona() {
        let mut client = test_client(Arc::new(CannedProvider::new("ok")));
        client.send("hello").await.unwrap();
        client.reset();
        assert_eq!(client.conversation.messages.len(), 1);
        assert_eq!(client.conversation.messages[0].role, Role::System);
    }

    #[tokio::test]
    async fn test_set_agent_swaps_system_prompt() {
        let mut client = test_client(Arc::new(CannedProvider::new("ok")));
        client.set_agent(AgentEntry {
            name: "pirate".to_string(),
            prompt: "Arr.".to_string(),
            description: None,
        });
        assert_eq!(client.agent_name(), "pirate");
        assert_eq!(client.conversation.messages[0].content, "Arr.");
    }
}
