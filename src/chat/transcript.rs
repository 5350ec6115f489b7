use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Who a message came from.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Token counts reported by a provider for one completion.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Reference to a synthesized audio clip attached to a message.
/// The clip itself lives on disk (or at a vendor URL); the transcript only
/// carries the pointer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub location: String,
    pub mime: String,
}

/// One entry in a conversation: role, content, and the metadata the
/// provider layer attaches to assistant replies.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Unix timestamp, stamped when the message is appended.
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioClip>,
}

impl ChatMessage {
    fn stamped(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now().timestamp(),
            provider: None,
            model: None,
            usage: None,
            audio: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::stamped(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::stamped(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::stamped(Role::System, content)
    }
}

/// An ordered, append-only list of messages. The system prompt, when set,
/// occupies index 0 so providers see it first.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    pub messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a conversation seeded with a system prompt.
    pub fn with_system(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(prompt)],
        }
    }

    /// Replaces the leading system message, or inserts one if absent.
    pub fn set_system(&mut self, prompt: impl Into<String>) {
        match self.messages.first_mut() {
            Some(first) if first.role == Role::System => {
                first.content = prompt.into();
            }
            _ => self.messages.insert(0, ChatMessage::system(prompt)),
        }
    }

    pub fn push(&mut self, message: ChatMessage) -> &ChatMessage {
        self.messages.push(message);
        self.messages.last().expect("just pushed")
    }

    pub fn add_user_message(&mut self, content: impl Into<String>) -> &ChatMessage {
        self.push(ChatMessage::user(content))
    }

    /// True if the conversation holds any user or assistant message
    /// (a bare system prompt doesn't count as dialogue).
    pub fn has_dialogue(&self) -> bool {
        self.messages
            .iter()
            .any(|m| matches!(m.role, Role::User | Role::Assistant))
    }

    /// Derives a display title from the first user message:
    /// first line, truncated to 60 chars.
    pub fn derive_title(&self) -> String {
        for message in &self.messages {
            if message.role == Role::User {
                let first_line = message.content.lines().next().unwrap_or("").trim();
                if first_line.chars().count() > 60 {
                    let cut: String = first_line.chars().take(57).collect();
                    return format!("{}...", cut);
                }
                return first_line.to_string();
            }
        }
        "Untitled".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors_stamp_roles() {
        assert_eq!(ChatMessage::user("hi").role, Role::User);
        assert_eq!(ChatMessage::assistant("hi").role, Role::Assistant);
        assert_eq!(ChatMessage::system("hi").role, Role::System);
        assert!(ChatMessage::user("hi").created_at > 0);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = ChatMessage::user("hello");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"role\":\"user\""));
        // None metadata fields are omitted entirely
        assert!(!json.contains("provider"));
        assert!(!json.contains("usage"));
    }

    #[test]
    fn test_token_usage_totals() {
        let usage = TokenUsage::new(120, 30);
        assert_eq!(usage.total_tokens, 150);
    }

    #[test]
    fn test_with_system_seeds_first_message() {
        let convo = Conversation::with_system("Be helpful.");
        assert_eq!(convo.messages.len(), 1);
        assert_eq!(convo.messages[0].role, Role::System);
        assert!(!convo.has_dialogue());
    }

    #[test]
    fn test_set_system_replaces_existing() {
        let mut convo = Conversation::with_system("old");
        convo.add_user_message("hi");
        convo.set_system("new");
        assert_eq!(convo.messages[0].content, "new");
        assert_eq!(convo.messages.len(), 2);
    }

    #[test]
    fn test_set_system_inserts_when_absent() {
        let mut convo = Conversation::new();
        convo.add_user_message("hi");
        convo.set_system("prompt");
        assert_eq!(convo.messages[0].role, Role::System);
        assert_eq!(convo.messages[1].role, Role::User);
    }

    #[test]
    fn test_derive_title_from_first_user_message() {
        let mut convo = Conversation::with_system("sys");
        convo.add_user_message("What is Rust?");
        convo.push(ChatMessage::assistant("A language."));
        assert_eq!(convo.derive_title(), "What is Rust?");
    }

    #[test]
    fn test_derive_title_uses_first_line() {
        let mut convo = Conversation::new();
        convo.add_user_message("First line\nSecond line");
        assert_eq!(convo.derive_title(), "First line");
    }

    #[test]
    fn test_derive_title_truncates_long_messages() {
        let mut convo = Conversation::new();
        convo.add_user_message("a".repeat(80));
        let title = convo.derive_title();
        assert!(title.chars().count() <= 60);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn test_derive_title_no_user_messages() {
        let convo = Conversation::with_system("sys");
        assert_eq!(convo.derive_title(), "Untitled");
    }

    #[test]
    fn test_message_round_trip_with_metadata() {
        let mut msg = ChatMessage::assistant("answer");
        msg.provider = Some("anthropic".to_string());
        msg.model = Some("claude-sonnet-4".to_string());
        msg.usage = Some(TokenUsage::new(10, 5));
        let json = serde_json::to_string(&msg).unwrap();
        let back: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
