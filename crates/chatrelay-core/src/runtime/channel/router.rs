//! Message Router - decides whether an inbound message is a command or chat.

use crate::channel::InboundMessage;

/// Routing decision for an inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteDecision {
    /// Handle as a bot command (`/help`, `/clear`, ...). `command` is
    /// lowercased with the prefix and any `@botname` suffix removed.
    HandleCommand { command: String, args: Vec<String> },
    /// Relay to the completion endpoint.
    DispatchToChat,
    /// Nothing to do (blank message).
    Ignore,
}

pub struct MessageRouter {
    command_prefix: String,
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new("/")
    }
}

impl MessageRouter {
    pub fn new(command_prefix: impl Into<String>) -> Self {
        Self {
            command_prefix: command_prefix.into(),
        }
    }

    pub fn route(&self, message: &InboundMessage) -> RouteDecision {
        let content = message.content.trim();
        if content.is_empty() {
            return RouteDecision::Ignore;
        }

        if let Some((command, args)) = self.parse_command(content) {
            return RouteDecision::HandleCommand { command, args };
        }

        RouteDecision::DispatchToChat
    }

    fn parse_command(&self, content: &str) -> Option<(String, Vec<String>)> {
        let trimmed = content.strip_prefix(&self.command_prefix)?;
        let mut parts = trimmed.split_whitespace();

        let head = parts.next()?;
        // Group chats address commands as `/cmd@BotName`.
        let name = head.split_once('@').map_or(head, |(name, _)| name);
        if name.is_empty() {
            return None;
        }

        let args = parts.map(str::to_string).collect();
        Some((name.to_lowercase(), args))
    }
}
