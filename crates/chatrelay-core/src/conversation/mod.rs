//! Per-user conversation history
//!
//! [`HistoryWindow`] is the bounded sliding window for one user.
//! [`ConversationStore`] owns one window per user id behind a single lock.

mod store;
mod types;
mod window;

pub use store::ConversationStore;
pub use types::{ChatMessage, ChatRole};
pub use window::{DEFAULT_MAX_HISTORY, HistoryWindow};
