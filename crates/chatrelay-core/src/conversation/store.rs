use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use super::types::{ChatMessage, ChatRole};
use super::window::{DEFAULT_MAX_HISTORY, HistoryWindow};

/// Process-wide map from user id to that user's [`HistoryWindow`].
///
/// A single mutex guards the whole map. Every method takes the lock for a
/// short synchronous critical section, so callers must never hold a
/// snapshot and expect it to track later appends.
#[derive(Debug)]
pub struct ConversationStore {
    histories: Mutex<HashMap<String, HistoryWindow>>,
    max_length: usize,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl ConversationStore {
    pub fn new(max_length: usize) -> Self {
        Self {
            histories: Mutex::new(HashMap::new()),
            max_length: max_length.max(1),
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Append a message, creating the user's history on first use.
    pub fn append(&self, user_id: &str, role: ChatRole, content: impl Into<String>) {
        let message = ChatMessage::new(role, content);
        let mut histories = self.histories.lock();
        let window = histories
            .entry(user_id.to_string())
            .or_insert_with(|| HistoryWindow::new(self.max_length));
        window.push(message);
        debug!(user_id, len = window.len(), "Appended message to history");
    }

    /// Snapshot of a user's history, oldest first. Empty for unseen users.
    pub fn get(&self, user_id: &str) -> Vec<ChatMessage> {
        self.histories
            .lock()
            .get(user_id)
            .map(HistoryWindow::messages)
            .unwrap_or_default()
    }

    /// Reset a user's history. Returns whether the user was known, even if
    /// their history was already empty. Unseen users are not created.
    pub fn clear(&self, user_id: &str) -> bool {
        match self.histories.lock().get_mut(user_id) {
            Some(window) => {
                window.clear();
                true
            }
            None => false,
        }
    }

    /// Start tracking a user with an empty history if not already known.
    pub fn ensure(&self, user_id: &str) {
        self.histories
            .lock()
            .entry(user_id.to_string())
            .or_insert_with(|| HistoryWindow::new(self.max_length));
    }

    pub fn len(&self, user_id: &str) -> usize {
        self.histories
            .lock()
            .get(user_id)
            .map(HistoryWindow::len)
            .unwrap_or(0)
    }

    /// Number of tracked users.
    pub fn user_count(&self) -> usize {
        self.histories.lock().len()
    }

    /// Retained messages across all users.
    pub fn total_messages(&self) -> usize {
        self.histories.lock().values().map(HistoryWindow::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn contents(store: &ConversationStore, user: &str) -> Vec<String> {
        store.get(user).into_iter().map(|m| m.content).collect()
    }

    #[test]
    fn test_unseen_user_is_empty() {
        let store = ConversationStore::default();
        assert!(store.get("nobody").is_empty());
        assert_eq!(store.len("nobody"), 0);
        assert_eq!(store.user_count(), 0);
    }

    #[test]
    fn test_append_and_get_preserve_order() {
        let store = ConversationStore::default();
        store.append("u1", ChatRole::User, "hi");
        store.append("u1", ChatRole::Assistant, "hello");

        let history = store.get("u1");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, ChatRole::User);
        assert_eq!(history[1].role, ChatRole::Assistant);
        assert_eq!(contents(&store, "u1"), vec!["hi", "hello"]);
    }

    #[test]
    fn test_twenty_one_appends_drop_first() {
        let store = ConversationStore::new(20);
        for i in 1..=21 {
            store.append("u1", ChatRole::User, format!("m{i}"));
        }

        let kept = contents(&store, "u1");
        assert_eq!(kept.len(), 20);
        assert_eq!(kept[0], "m2");
        assert_eq!(kept[19], "m21");
    }

    #[test]
    fn test_users_are_isolated() {
        let store = ConversationStore::new(3);
        for i in 0..5 {
            store.append("a", ChatRole::User, format!("a{i}"));
        }
        store.append("b", ChatRole::User, "b0");

        assert_eq!(contents(&store, "a"), vec!["a2", "a3", "a4"]);
        assert_eq!(contents(&store, "b"), vec!["b0"]);
        assert_eq!(store.user_count(), 2);
        assert_eq!(store.total_messages(), 4);
    }

    #[test]
    fn test_clear_then_get_is_empty() {
        let store = ConversationStore::default();
        store.append("u1", ChatRole::User, "hi");

        assert!(store.clear("u1"));
        assert!(store.get("u1").is_empty());
        assert_eq!(store.user_count(), 1);
    }

    #[test]
    fn test_clear_known_user_with_empty_history() {
        let store = ConversationStore::default();
        store.ensure("u1");

        assert!(store.clear("u1"));
        assert!(store.clear("u1"));
        assert!(store.get("u1").is_empty());
    }

    #[test]
    fn test_clear_unseen_user_reports_nothing_cleared() {
        let store = ConversationStore::default();
        assert!(!store.clear("ghost"));
        assert_eq!(store.user_count(), 0);
    }

    #[test]
    fn test_ensure_tracks_user_without_messages() {
        let store = ConversationStore::default();
        store.ensure("u1");
        store.ensure("u1");
        assert_eq!(store.user_count(), 1);
        assert_eq!(store.len("u1"), 0);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let store = ConversationStore::default();
        store.append("u1", ChatRole::User, "one");
        let snapshot = store.get("u1");
        store.append("u1", ChatRole::User, "two");

        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.len("u1"), 2);
    }

    #[test]
    fn test_concurrent_appends_respect_bound() {
        let store = Arc::new(ConversationStore::new(20));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        store.append("shared", ChatRole::User, format!("{t}-{i}"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len("shared"), 20);
    }
}
