//! # Agent Personas
//!
//! An agent is a named system prompt applied to outgoing chat requests.
//! Built-ins ship in code; `[[agents]]` tables in the config file add more,
//! and a config-defined agent shadows a built-in with the same name.

use log::warn;
use serde::{Deserialize, Serialize};

/// Name of the persona used when none is configured or the requested one
/// doesn't exist.
pub const DEFAULT_AGENT: &str = "assistant";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AgentEntry {
    pub name: String,
    pub prompt: String,
    pub description: Option<String>,
}

fn builtin(name: &str, description: &str, prompt: &str) -> AgentEntry {
    AgentEntry {
        name: name.to_string(),
        prompt: prompt.to_string(),
        description: Some(description.to_string()),
    }
}

fn builtin_agents() -> Vec<AgentEntry> {
    vec![
        builtin(
            DEFAULT_AGENT,
            "General-purpose assistant",
            "You are a helpful assistant. Be direct, be honest about \
             uncertainty, and prefer clarity over hedging. If you don't know \
             the answer, say you don't know.",
        ),
        builtin(
            "concise",
            "Short answers only",
            "You are a helpful assistant. Answer in as few words as the \
             question allows. No preamble, no recap, no filler.",
        ),
        builtin(
            "translator",
            "Translates instead of answering",
            "You are a translator. Detect the language of each user message \
             and translate it to English; translate English messages to the \
             most recently used other language. Output only the translation.",
        ),
        builtin(
            "coder",
            "Programming help with runnable examples",
            "You are a programming assistant. Prefer complete, runnable code \
             over fragments, and state the language and any assumptions \
             before the code block.",
        ),
    ]
}

/// The full set of personas available to a session: built-ins plus
/// config-defined entries, with config shadowing built-ins by name.
#[derive(Debug, Clone)]
pub struct AgentBook {
    agents: Vec<AgentEntry>,
}

impl AgentBook {
    pub fn new(custom: &[AgentEntry]) -> Self {
        let mut agents: Vec<AgentEntry> = builtin_agents()
            .into_iter()
            .filter(|b| !custom.iter().any(|c| c.name == b.name))
            .collect();
        agents.extend(custom.iter().cloned());
        Self { agents }
    }

    pub fn get(&self, name: &str) -> Option<&AgentEntry> {
        self.agents.iter().find(|a| a.name == name)
    }

    /// Resolves a persona by name, falling back to the default assistant.
    /// Unknown names are logged, not silently swallowed.
    pub fn resolve(&self, name: &str) -> &AgentEntry {
        if let Some(agent) = self.get(name) {
            return agent;
        }
        warn!("Unknown agent '{}', falling back to '{}'", name, DEFAULT_AGENT);
        self.get(DEFAULT_AGENT)
            .unwrap_or_else(|| &self.agents[0])
    }

    pub fn names(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn entries(&self) -> &[AgentEntry] {
        &self.agents
    }
}

impl Default for AgentBook {
    fn default() -> Self {
        Self::new(&[])
    }
}
