//! # Chat Core
//!
//! Everything the application knows about a conversation, independent of
//! any front end or transport:
//!
//! - [`transcript`]: the message and conversation model
//! - [`agents`]: named system-prompt personas
//! - [`settings`]: config file + env + CLI resolution
//! - [`history`]: conversation persistence under `~/.parley/history/`
//! - [`usage`]: per-model usage bookkeeping
//! - [`client`]: the provider-agnostic send loop

pub mod agents;
pub mod client;
pub mod history;
pub mod settings;
pub mod transcript;
pub mod usage;
