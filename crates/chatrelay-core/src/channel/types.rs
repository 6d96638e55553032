use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A text message received from a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InboundMessage {
    /// Transport message id
    pub id: String,
    /// Stable user id; keys the conversation store
    pub sender_id: String,
    pub sender_name: Option<String>,
    /// Used in the `/start` greeting
    pub first_name: Option<String>,
    /// Where replies go (Telegram chat id)
    pub conversation_id: String,
    pub content: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl InboundMessage {
    pub fn new(
        id: impl Into<String>,
        sender_id: impl Into<String>,
        conversation_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            sender_id: sender_id.into(),
            sender_name: None,
            first_name: None,
            conversation_id: conversation_id.into(),
            content: content.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }

    pub fn with_first_name(mut self, name: impl Into<String>) -> Self {
        self.first_name = Some(name.into());
        self
    }

    /// Name to greet the user by.
    pub fn display_name(&self) -> &str {
        self.first_name
            .as_deref()
            .or(self.sender_name.as_deref())
            .unwrap_or("there")
    }
}

/// A reply to send to a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutboundMessage {
    pub conversation_id: String,
    pub content: String,
    /// Telegram `parse_mode`; `None` sends plain text
    pub parse_mode: Option<String>,
}

impl OutboundMessage {
    pub fn new(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            content: content.into(),
            parse_mode: None,
        }
    }

    pub fn markdown(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(conversation_id, content).with_parse_mode("Markdown")
    }

    pub fn with_parse_mode(mut self, mode: impl Into<String>) -> Self {
        self.parse_mode = Some(mode.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_builder() {
        let msg = InboundMessage::new("tg_1", "42", "100", "hello")
            .with_sender_name("alice")
            .with_first_name("Alice");

        assert_eq!(msg.sender_id, "42");
        assert_eq!(msg.conversation_id, "100");
        assert_eq!(msg.display_name(), "Alice");
        assert!(msg.timestamp > 0);
    }

    #[test]
    fn test_display_name_fallbacks() {
        let msg = InboundMessage::new("1", "2", "3", "x").with_sender_name("bob");
        assert_eq!(msg.display_name(), "bob");

        let anonymous = InboundMessage::new("1", "2", "3", "x");
        assert_eq!(anonymous.display_name(), "there");
    }

    #[test]
    fn test_outbound_markdown() {
        let msg = OutboundMessage::markdown("100", "*bold*");
        assert_eq!(msg.parse_mode.as_deref(), Some("Markdown"));
        assert!(OutboundMessage::new("100", "plain").parse_mode.is_none());
    }
}
