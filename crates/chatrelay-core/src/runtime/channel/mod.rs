//! Inbound message runtime
//!
//! Routes each inbound message to a bot command or the chat dispatcher, on
//! a per-user worker.

mod chat_dispatcher;
mod commands;
mod handler;
mod router;

pub use chat_dispatcher::{ChatDispatcher, ChatDispatcherConfig};
pub use commands::{CommandContext, handle_command};
pub use handler::{MessageHandler, MessageHandlerConfig, spawn_polling_loop};
pub use router::{MessageRouter, RouteDecision};
