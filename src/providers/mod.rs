//! # Provider Layer
//!
//! One trait, eight vendors. Each provider module owns its vendor's wire
//! schema and the translation to and from the internal conversation shape;
//! the rest of the crate only sees [`ChatProvider`], [`ChatReply`], and
//! [`ProviderError`].

use std::sync::Arc;

pub mod anthropic;
pub mod fal;
pub mod gemini;
pub mod openai;
pub mod provider;
pub mod qwen;

pub use anthropic::AnthropicProvider;
pub use fal::FalProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use provider::{
    ChatProvider, ChatReply, ChatRequest, ProviderError, CHAT_TIMEOUT, MEDIA_TIMEOUT,
    VIDEO_TIMEOUT,
};
pub use qwen::QwenProvider;

use crate::chat::settings::ResolvedSettings;
use crate::ProviderKind;

/// Returns the endpoint's API key or `MissingKey` for vendors that need one.
fn require_key(
    kind: ProviderKind,
    settings: &ResolvedSettings,
) -> Result<String, ProviderError> {
    settings
        .endpoint(kind)
        .api_key
        .clone()
        .ok_or_else(|| ProviderError::MissingKey(kind.as_str().to_string()))
}

/// Create a chat provider instance for the given vendor.
///
/// Returns `MissingKey` when the vendor requires a key and none is
/// configured, and `InvalidRequest` for `Fal`, which has no chat surface.
pub fn create_provider(
    kind: ProviderKind,
    settings: &ResolvedSettings,
) -> Result<Arc<dyn ChatProvider>, ProviderError> {
    let timeout = settings.chat_timeout();
    let base_url = settings.endpoint(kind).base_url.clone();
    let provider: Arc<dyn ChatProvider> = match kind {
        ProviderKind::OpenAi => Arc::new(
            OpenAiProvider::openai(require_key(kind, settings)?, base_url).with_timeout(timeout),
        ),
        ProviderKind::DeepSeek => Arc::new(
            OpenAiProvider::deepseek(require_key(kind, settings)?, base_url)
                .with_timeout(timeout),
        ),
        ProviderKind::Grok => Arc::new(
            OpenAiProvider::grok(require_key(kind, settings)?, base_url).with_timeout(timeout),
        ),
        ProviderKind::Local => Arc::new(OpenAiProvider::local(base_url).with_timeout(timeout)),
        ProviderKind::Anthropic => Arc::new(
            AnthropicProvider::new(require_key(kind, settings)?, base_url)
                .with_timeout(timeout),
        ),
        ProviderKind::Gemini => Arc::new(
            GeminiProvider::new(require_key(kind, settings)?, base_url).with_timeout(timeout),
        ),
        ProviderKind::Qwen => Arc::new(
            QwenProvider::new(require_key(kind, settings)?, base_url).with_timeout(timeout),
        ),
        ProviderKind::Fal => {
            return Err(ProviderError::InvalidRequest(
                "fal is a media-only provider and cannot be used for chat".to_string(),
            ))
        }
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::settings::{resolve, ParleySettings};

    fn settings_with_keys() -> ResolvedSettings {
        let mut resolved = resolve(&ParleySettings::default(), None, None, None);
        for endpoint in [
            &mut resolved.openai,
            &mut resolved.anthropic,
            &mut resolved.deepseek,
            &mut resolved.grok,
            &mut resolved.gemini,
            &mut resolved.qwen,
            &mut resolved.fal,
        ] {
            endpoint.api_key = Some("test-key".to_string());
        }
        resolved
    }

    #[test]
    fn test_factory_builds_every_chat_provider() {
        let settings = settings_with_keys();
        for kind in [
            ProviderKind::OpenAi,
            ProviderKind::Anthropic,
            ProviderKind::DeepSeek,
            ProviderKind::Grok,
            ProviderKind::Gemini,
            ProviderKind::Qwen,
            ProviderKind::Local,
        ] {
            let provider = create_provider(kind, &settings).unwrap();
            assert_eq!(provider.name(), kind.as_str());
        }
    }

    #[test]
    fn test_factory_rejects_missing_key() {
        let mut settings = settings_with_keys();
        settings.anthropic.api_key = None;
        assert!(matches!(
            create_provider(ProviderKind::Anthropic, &settings),
            Err(ProviderError::MissingKey(_))
        ));
    }

    #[test]
    fn test_factory_allows_local_without_key() {
        let mut settings = settings_with_keys();
        settings.local.api_key = None;
        assert!(create_provider(ProviderKind::Local, &settings).is_ok());
    }

    #[test]
    fn test_factory_rejects_fal_for_chat() {
        let settings = settings_with_keys();
        assert!(matches!(
            create_provider(ProviderKind::Fal, &settings),
            Err(ProviderError::InvalidRequest(_))
        ));
    }
}
