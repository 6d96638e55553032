use chatrelay_ai::{Message, Role};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Author of a stored message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

impl From<ChatRole> for Role {
    fn from(role: ChatRole) -> Self {
        match role {
            ChatRole::User => Role::User,
            ChatRole::Assistant => Role::Assistant,
            ChatRole::System => Role::System,
        }
    }
}

/// One entry in a user's history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }
}

impl From<&ChatMessage> for Message {
    fn from(message: &ChatMessage) -> Self {
        Message {
            role: message.role.into(),
            content: message.content.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_converts_to_llm_message() {
        let message = ChatMessage::assistant("hello");
        let llm: Message = (&message).into();
        assert_eq!(llm.role, Role::Assistant);
        assert_eq!(llm.content, "hello");
    }

    #[test]
    fn test_timestamp_is_set() {
        let message = ChatMessage::user("hi");
        assert!(message.timestamp > 0);
    }
}
