//! Bot command handling
//!
//! `/start`, `/help`, `/clear` and `/status` map to fixed replies or store
//! operations. None of them call the completion endpoint.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::channel::{Channel, InboundMessage, OutboundMessage};
use crate::conversation::ConversationStore;
use crate::error::TransportResult;

/// Everything a command needs to reply.
pub struct CommandContext {
    pub channel: Arc<dyn Channel>,
    pub store: Arc<ConversationStore>,
    /// Model name shown by `/start` and `/status`
    pub model: String,
}

/// Execute `command` (already lowercased, without prefix) for `message`.
pub async fn handle_command(
    ctx: &CommandContext,
    message: &InboundMessage,
    command: &str,
) -> TransportResult<()> {
    debug!(command, sender_id = %message.sender_id, "Handling command");

    match command {
        "start" => cmd_start(ctx, message).await,
        "help" => cmd_help(ctx, message).await,
        "clear" => cmd_clear(ctx, message).await,
        "status" => cmd_status(ctx, message).await,
        _ => cmd_unknown(ctx, message, command).await,
    }
}

async fn cmd_start(ctx: &CommandContext, message: &InboundMessage) -> TransportResult<()> {
    ctx.store.ensure(&message.sender_id);
    info!(
        sender_id = %message.sender_id,
        sender_name = message.sender_name.as_deref().unwrap_or(""),
        "User started the bot"
    );

    let text = format!(
        "Hello {}! 👋\n\n\
         I'm an AI assistant powered by {}. I can help you with:\n\
         • Answering questions\n\
         • Creative writing\n\
         • Problem solving\n\
         • General conversation\n\n\
         Just send me a message and I'll respond with AI-generated answers!\n\n\
         Use /help to see available commands.",
        message.display_name(),
        ctx.model
    );
    ctx.channel.send_text(&message.conversation_id, &text).await
}

async fn cmd_help(ctx: &CommandContext, message: &InboundMessage) -> TransportResult<()> {
    let text = format!(
        "🤖 *ChatRelay Bot Help*\n\n\
         *Available Commands:*\n\
         /start - Start the bot and get welcome message\n\
         /help - Show this help message\n\
         /clear - Clear conversation history\n\
         /status - Show bot status\n\n\
         *How to use:*\n\
         Simply send me any message and I'll reply!\n\n\
         *Note:* The bot remembers your last {} messages for context.",
        ctx.store.max_length()
    );
    ctx.channel
        .send(OutboundMessage::markdown(&message.conversation_id, text))
        .await
}

async fn cmd_clear(ctx: &CommandContext, message: &InboundMessage) -> TransportResult<()> {
    let text = if ctx.store.clear(&message.sender_id) {
        info!(sender_id = %message.sender_id, "Cleared conversation history");
        "✅ Conversation history cleared!"
    } else {
        "📝 No conversation history to clear."
    };
    ctx.channel.send_text(&message.conversation_id, text).await
}

async fn cmd_status(ctx: &CommandContext, message: &InboundMessage) -> TransportResult<()> {
    let text = format!(
        "🤖 *Bot Status*\n\n\
         ✅ Bot is online and operational\n\
         💬 Messages in conversation: {}\n\
         🧠 Model: `{}`\n\
         ⏰ Current time: {}",
        ctx.store.len(&message.sender_id),
        ctx.model,
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );
    ctx.channel
        .send(OutboundMessage::markdown(&message.conversation_id, text))
        .await
}

async fn cmd_unknown(
    ctx: &CommandContext,
    message: &InboundMessage,
    command: &str,
) -> TransportResult<()> {
    let text = format!("Unknown command: /{command}\n\nUse /help to see available commands.");
    ctx.channel.send_text(&message.conversation_id, &text).await
}
