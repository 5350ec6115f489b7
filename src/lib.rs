//! Parley library exports

use clap::ValueEnum;
use std::fmt;

pub mod chat;
pub mod gateway;
pub mod providers;

#[cfg(test)]
pub mod test_support;

/// The upstream AI vendors Parley can talk to.
///
/// `Fal` is a media-only vendor (video generation); selecting it for chat is
/// rejected by the provider factory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    #[default]
    #[value(name = "openai")]
    OpenAi,
    #[value(name = "anthropic")]
    Anthropic,
    #[value(name = "deepseek")]
    DeepSeek,
    #[value(name = "grok")]
    Grok,
    #[value(name = "gemini")]
    Gemini,
    #[value(name = "qwen")]
    Qwen,
    #[value(name = "fal")]
    Fal,
    #[value(name = "local")]
    Local,
}

impl ProviderKind {
    /// Canonical lowercase name, as used in config files and route paths.
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::Grok => "grok",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Qwen => "qwen",
            ProviderKind::Fal => "fal",
            ProviderKind::Local => "local",
        }
    }

    /// Parses a config-file provider name. Returns None for unknown names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "openai" => Some(ProviderKind::OpenAi),
            "anthropic" => Some(ProviderKind::Anthropic),
            "deepseek" => Some(ProviderKind::DeepSeek),
            "grok" => Some(ProviderKind::Grok),
            "gemini" => Some(ProviderKind::Gemini),
            "qwen" => Some(ProviderKind::Qwen),
            "fal" => Some(ProviderKind::Fal),
            "local" => Some(ProviderKind::Local),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_round_trip() {
        for kind in [
            ProviderKind::OpenAi,
            ProviderKind::Anthropic,
            ProviderKind::DeepSeek,
            ProviderKind::Grok,
            ProviderKind::Gemini,
            ProviderKind::Qwen,
            ProviderKind::Fal,
            ProviderKind::Local,
        ] {
            assert_eq!(ProviderKind::from_name(kind.as_str()), Some(kind));
        }
        assert_eq!(ProviderKind::from_name("openrouter"), None);
    }
}
