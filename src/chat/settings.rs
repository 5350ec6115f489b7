//! # Settings
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.parley/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::chat::agents::{AgentEntry, DEFAULT_AGENT};
use crate::ProviderKind;

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ParleySettings {
    #[serde(default)]
    pub general: GeneralSettings,
    #[serde(default)]
    pub theme: ThemeSettings,
    #[serde(default)]
    pub openai: ProviderFileSettings,
    #[serde(default)]
    pub anthropic: ProviderFileSettings,
    #[serde(default)]
    pub deepseek: ProviderFileSettings,
    #[serde(default)]
    pub grok: ProviderFileSettings,
    #[serde(default)]
    pub gemini: ProviderFileSettings,
    #[serde(default)]
    pub qwen: ProviderFileSettings,
    #[serde(default)]
    pub fal: ProviderFileSettings,
    #[serde(default)]
    pub local: ProviderFileSettings,
    #[serde(default)]
    pub agents: Vec<AgentEntry>,
    #[serde(default)]
    pub models: Vec<ModelEntry>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralSettings {
    pub default_provider: Option<String>,
    pub default_model: Option<String>,
    pub default_agent: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Overrides the chat-completion timeout (media timeouts are fixed).
    pub request_timeout_secs: Option<u64>,
}

/// Persisted display preference. Parley doesn't render themes itself; the
/// values are stored for whatever front end reads them.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ThemeSettings {
    pub name: Option<String>,
    pub accent: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ProviderFileSettings {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelEntry {
    pub name: String,
    pub provider: String,
    pub description: Option<String>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_CHAT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MEDIA_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_VIDEO_TIMEOUT_SECS: u64 = 180;
pub const DEFAULT_THEME: &str = "dark";
pub const DEFAULT_ACCENT: &str = "#7aa2f7";

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";
pub const DEFAULT_GROK_BASE_URL: &str = "https://api.x.ai/v1";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_QWEN_BASE_URL: &str = "https://dashscope.aliyuncs.com";
pub const DEFAULT_FAL_BASE_URL: &str = "https://fal.run";
pub const DEFAULT_LOCAL_BASE_URL: &str = "http://localhost:1234/v1";

// ============================================================================
// Resolved Settings (concrete values, no Options)
// ============================================================================

/// Where to reach one vendor: key (if it needs one) and base URL.
#[derive(Debug, Clone)]
pub struct ProviderEndpoint {
    pub api_key: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub provider: ProviderKind,
    pub model: String,
    pub agent: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub chat_timeout_secs: u64,
    pub media_timeout_secs: u64,
    pub video_timeout_secs: u64,
    pub theme_name: String,
    pub theme_accent: String,
    pub openai: ProviderEndpoint,
    pub anthropic: ProviderEndpoint,
    pub deepseek: ProviderEndpoint,
    pub grok: ProviderEndpoint,
    pub gemini: ProviderEndpoint,
    pub qwen: ProviderEndpoint,
    pub fal: ProviderEndpoint,
    pub local: ProviderEndpoint,
    pub agents: Vec<AgentEntry>,
    pub models: Vec<ModelEntry>,
}

impl ResolvedSettings {
    pub fn endpoint(&self, kind: ProviderKind) -> &ProviderEndpoint {
        match kind {
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Anthropic => &self.anthropic,
            ProviderKind::DeepSeek => &self.deepseek,
            ProviderKind::Grok => &self.grok,
            ProviderKind::Gemini => &self.gemini,
            ProviderKind::Qwen => &self.qwen,
            ProviderKind::Fal => &self.fal,
            ProviderKind::Local => &self.local,
        }
    }

    pub fn chat_timeout(&self) -> Duration {
        Duration::from_secs(self.chat_timeout_secs)
    }

    pub fn media_timeout(&self) -> Duration {
        Duration::from_secs(self.media_timeout_secs)
    }

    pub fn video_timeout(&self) -> Duration {
        Duration::from_secs(self.video_timeout_secs)
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum SettingsError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Io(e) => write!(f, "config I/O error: {e}"),
            SettingsError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for SettingsError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.parley/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".parley").join("config.toml"))
}

/// Load settings from `~/.parley/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `ParleySettings::default()`. If it exists but is malformed,
/// returns `SettingsError::Parse`.
pub fn load_settings() -> Result<ParleySettings, SettingsError> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default settings");
            return Ok(ParleySettings::default());
        }
    };

    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(&path);
        return Ok(ParleySettings::default());
    }

    let contents = fs::read_to_string(&path).map_err(SettingsError::Io)?;
    let settings: ParleySettings = toml::from_str(&contents).map_err(SettingsError::Parse)?;
    info!("Loaded settings from {}", path.display());
    debug!("Settings: {:?}", settings);
    Ok(settings)
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &PathBuf) {
    let default_content = r##"# Parley Configuration
# All settings are optional — defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [general]
# default_provider = "openai"      # openai | anthropic | deepseek | grok | gemini | qwen | local
# default_model = "gpt-4o-mini"
# default_agent = "assistant"      # assistant | concise | translator | coder | (custom)
# max_tokens = 1024
# temperature = 0.7
# request_timeout_secs = 60

# [theme]
# name = "dark"
# accent = "#7aa2f7"

# Per-provider credentials. Each api_key can also come from its env var:
# OPENAI_API_KEY, ANTHROPIC_API_KEY, DEEPSEEK_API_KEY, GROK_API_KEY,
# GEMINI_API_KEY, DASHSCOPE_API_KEY, FAL_KEY.

# [openai]
# api_key = "sk-..."

# [anthropic]
# api_key = "sk-ant-..."

# [deepseek]
# api_key = "sk-..."

# [grok]
# api_key = "xai-..."

# [gemini]
# api_key = "AIza..."

# [qwen]
# api_key = "sk-..."               # DashScope key

# [fal]
# api_key = "key-id:key-secret"

# [local]
# base_url = "http://localhost:1234/v1"

# [[agents]]
# name = "pirate"
# prompt = "Answer every question like a pirate."
# description = "Arr."

# [[models]]
# name = "claude-sonnet-4-20250514"
# provider = "anthropic"
# description = "Fast, balanced reasoning"
"##;

    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!("Failed to create config directory: {}", e);
            return;
        }
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Builds one provider endpoint: key from env → config, base URL from
/// env → config → default.
fn resolve_endpoint(
    key_env: &str,
    base_env: &str,
    file: &ProviderFileSettings,
    default_base: &str,
) -> ProviderEndpoint {
    let api_key = std::env::var(key_env).ok().or_else(|| file.api_key.clone());
    let base_url = std::env::var(base_env)
        .ok()
        .or_else(|| file.base_url.clone())
        .unwrap_or_else(|| default_base.to_string());
    ProviderEndpoint { api_key, base_url }
}

/// Parses a provider name from config/env, warning on unknown values.
fn parse_provider_name(name: &str, origin: &str) -> Option<ProviderKind> {
    let kind = ProviderKind::from_name(name);
    if kind.is_none() {
        warn!("Unknown provider '{}' in {}, ignoring", name, origin);
    }
    kind
}

/// Resolve the final settings by collapsing: defaults → config file → env
/// vars → CLI flags.
///
/// The `cli_*` arguments are from CLI flags (None = not specified).
pub fn resolve(
    settings: &ParleySettings,
    cli_provider: Option<ProviderKind>,
    cli_model: Option<&str>,
    cli_agent: Option<&str>,
) -> ResolvedSettings {
    // Provider: CLI → env → config → default
    let provider = cli_provider
        .or_else(|| {
            std::env::var("PARLEY_PROVIDER")
                .ok()
                .and_then(|name| parse_provider_name(&name, "PARLEY_PROVIDER"))
        })
        .or_else(|| {
            settings
                .general
                .default_provider
                .as_deref()
                .and_then(|name| parse_provider_name(name, "config file"))
        })
        .unwrap_or_default();

    // Model: CLI → env → config → default
    let model = cli_model
        .map(|s| s.to_string())
        .or_else(|| std::env::var("PARLEY_MODEL").ok())
        .or_else(|| settings.general.default_model.clone())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    // Agent: CLI → config → default
    let agent = cli_agent
        .map(|s| s.to_string())
        .or_else(|| settings.general.default_agent.clone())
        .unwrap_or_else(|| DEFAULT_AGENT.to_string());

    ResolvedSettings {
        provider,
        model,
        agent,
        max_tokens: settings.general.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        temperature: settings
            .general
            .temperature
            .unwrap_or(DEFAULT_TEMPERATURE),
        chat_timeout_secs: settings
            .general
            .request_timeout_secs
            .unwrap_or(DEFAULT_CHAT_TIMEOUT_SECS),
        media_timeout_secs: DEFAULT_MEDIA_TIMEOUT_SECS,
        video_timeout_secs: DEFAULT_VIDEO_TIMEOUT_SECS,
        theme_name: settings
            .theme
            .name
            .clone()
            .unwrap_or_else(|| DEFAULT_THEME.to_string()),
        theme_accent: settings
            .theme
            .accent
            .clone()
            .unwrap_or_else(|| DEFAULT_ACCENT.to_string()),
        openai: resolve_endpoint(
            "OPENAI_API_KEY",
            "PARLEY_OPENAI_BASE_URL",
            &settings.openai,
            DEFAULT_OPENAI_BASE_URL,
        ),
        anthropic: resolve_endpoint(
            "ANTHROPIC_API_KEY",
            "PARLEY_ANTHROPIC_BASE_URL",
            &settings.anthropic,
            DEFAULT_ANTHROPIC_BASE_URL,
        ),
        deepseek: resolve_endpoint(
            "DEEPSEEK_API_KEY",
            "PARLEY_DEEPSEEK_BASE_URL",
            &settings.deepseek,
            DEFAULT_DEEPSEEK_BASE_URL,
        ),
        grok: resolve_endpoint(
            "GROK_API_KEY",
            "PARLEY_GROK_BASE_URL",
            &settings.grok,
            DEFAULT_GROK_BASE_URL,
        ),
        gemini: resolve_endpoint(
            "GEMINI_API_KEY",
            "PARLEY_GEMINI_BASE_URL",
            &settings.gemini,
            DEFAULT_GEMINI_BASE_URL,
        ),
        qwen: resolve_endpoint(
            "DASHSCOPE_API_KEY",
            "PARLEY_QWEN_BASE_URL",
            &settings.qwen,
            DEFAULT_QWEN_BASE_URL,
        ),
        fal: resolve_endpoint(
            "FAL_KEY",
            "PARLEY_FAL_BASE_URL",
            &settings.fal,
            DEFAULT_FAL_BASE_URL,
        ),
        local: resolve_endpoint(
            "LOCAL_API_KEY",
            "PARLEY_LOCAL_BASE_URL",
            &settings.local,
            DEFAULT_LOCAL_BASE_URL,
        ),
        agents: settings.agents.clone(),
        models: settings.models.clone(),
    }
}
