//! # Conversation History
//!
//! Save/load conversations to `~/.parley/history/`.
//!
//! Each conversation is a JSON file (`<uuid>.json`) plus a lightweight index
//! (`history.json`) that avoids loading all files just to render a list.
//!
//! All writes use atomic rename (write `.tmp`, then `rename()`) for crash
//! safety. Semantics are last-write-wins; there is no multi-writer
//! coordination.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::chat::transcript::{ChatMessage, Conversation, Role};

/// Summary metadata for a conversation (stored in the index file).
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ConversationMeta {
    pub id: String,
    pub title: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub message_count: usize,
    pub provider: String,
    pub model: String,
}

/// Full conversation data: metadata + messages.
#[derive(Serialize, Deserialize, Debug)]
pub struct ConversationData {
    pub meta: ConversationMeta,
    pub messages: Vec<ChatMessage>,
}

/// Index of all conversations, sorted most recently updated first.
#[derive(Serialize, Deserialize, Default, Debug)]
pub struct HistoryIndex {
    pub conversations: Vec<ConversationMeta>,
}

/// Returns `~/.parley/history/`, creating it if needed.
pub fn history_dir() -> io::Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no home directory"))?;
    let dir = home.join(".parley").join("history");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Generate a new UUID v4 conversation ID.
pub fn new_conversation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Count user + assistant messages (system prompts don't count).
fn count_messages(messages: &[ChatMessage]) -> usize {
    messages
        .iter()
        .filter(|m| matches!(m.role, Role::User | Role::Assistant))
        .count()
}

/// Filter out system messages; the agent persona is reapplied on load.
fn persistable_messages(messages: &[ChatMessage]) -> Vec<ChatMessage> {
    messages
        .iter()
        .filter(|m| m.role != Role::System)
        .cloned()
        .collect()
}

/// Atomically write `data` as JSON to `path` (via `.tmp` + rename).
fn atomic_write_json<T: Serialize>(path: &Path, data: &T) -> io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(&tmp_path, json)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn sort_index(index: &mut HistoryIndex) {
    index
        .conversations
        .sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}

// ============================================================================
// Directory-level operations (explicit dir, used by the public API and tests)
// ============================================================================

/// Save a conversation under `dir` and update the index there.
/// Conversations with no user/assistant messages are skipped.
pub fn save_conversation_in(
    dir: &Path,
    id: &str,
    conversation: &Conversation,
    provider: &str,
    model: &str,
    existing_meta: Option<&ConversationMeta>,
) -> io::Result<()> {
    let now = Utc::now().timestamp();

    let persistable = persistable_messages(&conversation.messages);
    let message_count = count_messages(&conversation.messages);
    if message_count == 0 {
        return Ok(());
    }

    let meta = ConversationMeta {
        id: id.to_string(),
        title: existing_meta
            .map(|m| m.title.clone())
            .unwrap_or_else(|| conversation.derive_title()),
        created_at: existing_meta.map(|m| m.created_at).unwrap_or(now),
        updated_at: now,
        message_count,
        provider: provider.to_string(),
        model: model.to_string(),
    };

    let data = ConversationData {
        meta: meta.clone(),
        messages: persistable,
    };

    let path = dir.join(format!("{}.json", id));
    atomic_write_json(&path, &data)?;

    let mut index = load_index_in(dir).unwrap_or_default();
    index.conversations.retain(|c| c.id != id);
    index.conversations.push(meta);
    sort_index(&mut index);
    atomic_write_json(&dir.join("history.json"), &index)?;

    Ok(())
}

/// Load a conversation from `dir` by ID.
pub fn load_conversation_in(dir: &Path, id: &str) -> io::Result<ConversationData> {
    let path = dir.join(format!("{}.json", id));
    let json = fs::read_to_string(&path)?;
    serde_json::from_str(&json).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Delete a conversation from `dir` and update the index there.
pub fn delete_conversation_in(dir: &Path, id: &str) -> io::Result<()> {
    let path = dir.join(format!("{}.json", id));
    if path.exists() {
        fs::remove_file(path)?;
    }

    let mut index = load_index_in(dir).unwrap_or_default();
    index.conversations.retain(|c| c.id != id);
    atomic_write_json(&dir.join("history.json"), &index)?;

    Ok(())
}

/// Load the index from `dir`. A missing file is an empty index.
pub fn load_index_in(dir: &Path) -> io::Result<HistoryIndex> {
    let path = dir.join("history.json");
    if !path.exists() {
        return Ok(HistoryIndex::default());
    }
    let json = fs::read_to_string(path)?;
    serde_json::from_str(&json).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

// ============================================================================
// Default-directory wrappers
// ============================================================================

pub fn save_conversation(
    id: &str,
    conversation: &Conversation,
    provider: &str,
    model: &str,
    existing_meta: Option<&ConversationMeta>,
) -> io::Result<()> {
    save_conversation_in(&history_dir()?, id, conversation, provider, model, existing_meta)
}

pub fn load_conversation(id: &str) -> io::Result<ConversationData> {
    load_conversation_in(&history_dir()?, id)
}

pub fn delete_conversation(id: &str) -> io::Result<()> {
    delete_conversation_in(&history_dir()?, id)
}

pub fn load_index() -> io::Result<HistoryIndex> {
    load_index_in(&history_dir()?)
}

/// Persist the current conversation, generating an ID on first save.
/// This is the single entry point used after each chat turn and on quit.
pub fn autosave(
    current_id: &mut Option<String>,
    conversation: &Conversation,
    provider: &str,
    model: &str,
) {
    if !conversation.has_dialogue() {
        return;
    }

    let id = current_id.get_or_insert_with(new_conversation_id).clone();

    // Load existing meta to preserve title/created_at
    let existing_meta = load_conversation(&id).ok().map(|d| d.meta);

    if let Err(e) = save_conversation(&id, conversation, provider, model, existing_meta.as_ref()) {
        warn!("Failed to save conversation: {}", e);
    } else {
        debug!("Conversation saved: {}", id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::transcript::ChatMessage;

    fn dialogue() -> Conversation {
        let mut convo = Conversation::with_system("be helpful");
        convo.add_user_message("What is Rust?");
        convo.push(ChatMessage::assistant("A systems language."));
        convo
    }

    #[test]
    fn test_count_messages_skips_system() {
        let convo = dialogue();
        assert_eq!(count_messages(&convo.messages), 2);
    }

    #[test]
    fn test_persistable_messages_drops_system() {
        let convo = dialogue();
        let kept = persistable_messages(&convo.messages);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|m| m.role != Role::System));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let convo = dialogue();
        save_conversation_in(tmp.path(), "abc", &convo, "openai", "gpt-4o-mini", None).unwrap();

        let data = load_conversation_in(tmp.path(), "abc").unwrap();
        assert_eq!(data.meta.id, "abc");
        assert_eq!(data.meta.title, "What is Rust?");
        assert_eq!(data.meta.message_count, 2);
        assert_eq!(data.meta.provider, "openai");
        assert_eq!(data.messages.len(), 2); // system prompt dropped
    }

    #[test]
    fn test_empty_conversation_not_saved() {
        let tmp = tempfile::tempdir().unwrap();
        let convo = Conversation::with_system("sys only");
        save_conversation_in(tmp.path(), "empty", &convo, "openai", "m", None).unwrap();
        assert!(load_conversation_in(tmp.path(), "empty").is_err());
        assert!(load_index_in(tmp.path()).unwrap().conversations.is_empty());
    }

    #[test]
    fn test_save_preserves_existing_title_and_created_at() {
        let tmp = tempfile::tempdir().unwrap();
        let convo = dialogue();
        save_conversation_in(tmp.path(), "x", &convo, "openai", "m", None).unwrap();
        let first = load_conversation_in(tmp.path(), "x").unwrap().meta;

        let mut longer = convo.clone();
        longer.add_user_message("Another question entirely");
        save_conversation_in(tmp.path(), "x", &longer, "openai", "m", Some(&first)).unwrap();

        let second = load_conversation_in(tmp.path(), "x").unwrap().meta;
        assert_eq!(second.title, first.title);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.message_count, 3);
    }

    #[test]
    fn test_index_updated_and_deduped() {
        let tmp = tempfile::tempdir().unwrap();
        let convo = dialogue();
        save_conversation_in(tmp.path(), "a", &convo, "openai", "m", None).unwrap();
        save_conversation_in(tmp.path(), "a", &convo, "openai", "m", None).unwrap();
        save_conversation_in(tmp.path(), "b", &convo, "openai", "m", None).unwrap();

        let index = load_index_in(tmp.path()).unwrap();
        assert_eq!(index.conversations.len(), 2);
    }

    #[test]
    fn test_delete_removes_file_and_index_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let convo = dialogue();
        save_conversation_in(tmp.path(), "gone", &convo, "openai", "m", None).unwrap();
        delete_conversation_in(tmp.path(), "gone").unwrap();

        assert!(load_conversation_in(tmp.path(), "gone").is_err());
        assert!(load_index_in(tmp.path()).unwrap().conversations.is_empty());
    }

    #[test]
    fn test_missing_index_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(load_index_in(tmp.path()).unwrap().conversations.is_empty());
    }
}
