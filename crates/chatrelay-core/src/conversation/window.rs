//! Sliding window over one user's messages
//!
//! Eviction is strict FIFO regardless of role: once the window is full,
//! every push drops the oldest entry. The window never holds more than
//! `max_messages` entries.
//!
//! ```
//! use chatrelay_core::conversation::{ChatMessage, HistoryWindow};
//!
//! let mut window = HistoryWindow::new(2);
//! window.push(ChatMessage::user("one"));
//! window.push(ChatMessage::assistant("two"));
//! window.push(ChatMessage::user("three"));
//!
//! let contents: Vec<_> = window.messages().into_iter().map(|m| m.content).collect();
//! assert_eq!(contents, vec!["two", "three"]);
//! ```

use std::collections::VecDeque;

use super::types::ChatMessage;

/// Default window length: 10 exchanges.
pub const DEFAULT_MAX_HISTORY: usize = 20;

#[derive(Debug, Clone)]
pub struct HistoryWindow {
    /// Oldest first
    messages: VecDeque<ChatMessage>,
    max_messages: usize,
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl HistoryWindow {
    /// Create a window holding at most `max_messages` entries (minimum 1).
    pub fn new(max_messages: usize) -> Self {
        let max_messages = max_messages.max(1);
        Self {
            messages: VecDeque::with_capacity(max_messages),
            max_messages,
        }
    }

    /// Append a message, evicting from the front until it fits.
    pub fn push(&mut self, message: ChatMessage) {
        while self.messages.len() >= self.max_messages {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
    }

    /// Snapshot of all messages, oldest first.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    pub fn is_full(&self) -> bool {
        self.messages.len() >= self.max_messages
    }

    /// Up to `n` of the most recent messages.
    pub fn last_n(&self, n: usize) -> Vec<ChatMessage> {
        let start = self.messages.len().saturating_sub(n);
        self.messages.iter().skip(start).cloned().collect()
    }
}
