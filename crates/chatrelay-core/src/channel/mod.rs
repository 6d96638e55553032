//! Telegram transport
//!
//! ```text
//! Telegram ──getUpdates──► TelegramChannel::start_receiving ──┐
//!          ──POST /webhook► TelegramChannel::handle_webhook ──┴─► MessageHandler::submit
//!
//! MessageHandler ──► Channel::send ──sendMessage (chunked)──► Telegram
//! ```
//!
//! The [`Channel`] trait is the outbound/polling seam the runtime depends on.
//! [`WebhookReceiver`] is implemented by channels that can also decode pushed
//! updates.

mod chunk;
mod telegram;
mod traits;
mod types;

pub use chunk::{TELEGRAM_MAX_LEN, chunk_text};
pub use telegram::{TelegramBotInfo, TelegramChannel, TelegramConfig};
pub use traits::{Channel, MessageStream, WebhookReceiver};
#[cfg(any(test, feature = "test-utils"))]
pub use traits::mock::RecordingChannel;
pub use types::{InboundMessage, OutboundMessage};
