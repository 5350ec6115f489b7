//! # Model-Usage History
//!
//! `~/.parley/usage.json`: one record per (provider, model) pair with use
//! count, accumulated token totals, and last-used timestamp. Written with
//! the same atomic-rename scheme as conversation history.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::warn;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ModelUsageRecord {
    pub provider: String,
    pub model: String,
    pub uses: u32,
    pub total_tokens: u64,
    pub last_used: i64,
}

#[derive(Serialize, Deserialize, Default, Debug)]
pub struct ModelUsageLog {
    pub records: Vec<ModelUsageRecord>,
}

/// Returns `~/.parley/usage.json`.
pub fn usage_path() -> io::Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no home directory"))?;
    let dir = home.join(".parley");
    fs::create_dir_all(&dir)?;
    Ok(dir.join("usage.json"))
}

/// Load the usage log from `path`. A missing file is an empty log.
pub fn load_usage_from(path: &Path) -> io::Result<ModelUsageLog> {
    if !path.exists() {
        return Ok(ModelUsageLog::default());
    }
    let json = fs::read_to_string(path)?;
    serde_json::from_str(&json).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Upsert a usage record at `path` and reorder most-recent-first.
pub fn record_use_at(
    path: &Path,
    provider: &str,
    model: &str,
    tokens: u64,
) -> io::Result<()> {
    let mut log = load_usage_from(path).unwrap_or_default();
    let now = Utc::now().timestamp();

    match log
        .records
        .iter_mut()
        .find(|r| r.provider == provider && r.model == model)
    {
        Some(record) => {
            record.uses += 1;
            record.total_tokens += tokens;
            record.last_used = now;
        }
        None => log.records.push(ModelUsageRecord {
            provider: provider.to_string(),
            model: model.to_string(),
            uses: 1,
            total_tokens: tokens,
            last_used: now,
        }),
    }

    log.records.sort_by(|a, b| b.last_used.cmp(&a.last_used));

    let tmp = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(&log)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn load_usage() -> io::Result<ModelUsageLog> {
    load_usage_from(&usage_path()?)
}

/// Record one model use, warning instead of failing - usage history is
/// best-effort bookkeeping, never worth aborting a chat turn over.
pub fn record_use(provider: &str, model: &str, tokens: u64) {
    match usage_path() {
        Ok(path) => {
            if let Err(e) = record_use_at(&path, provider, model, tokens) {
                warn!("Failed to record model usage: {}", e);
            }
        }
        Err(e) => warn!("Failed to resolve usage path: {}", e),
    }
}
