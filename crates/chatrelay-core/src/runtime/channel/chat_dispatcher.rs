//! Chat Dispatcher - relays a user's message to the completion endpoint.
//!
//! Flow for one message:
//! 1. Append the user message to the store
//! 2. Send a typing indicator
//! 3. Snapshot the history and request a completion
//! 4. On success append the reply and send it; on failure send an apology
//!
//! A failed completion leaves the user message in history with no
//! assistant reply after it.

use std::sync::Arc;
use std::time::Instant;

use chatrelay_ai::CompletionError;
use tracing::{debug, error, info, warn};

use crate::channel::{Channel, InboundMessage, OutboundMessage};
use crate::completion::CompletionClient;
use crate::conversation::{ChatRole, ConversationStore};
use crate::error::TransportResult;
use crate::status::StatusRecorder;

#[derive(Debug, Clone)]
pub struct ChatDispatcherConfig {
    pub send_typing_indicator: bool,
}

impl Default for ChatDispatcherConfig {
    fn default() -> Self {
        Self {
            send_typing_indicator: true,
        }
    }
}

pub struct ChatDispatcher {
    store: Arc<ConversationStore>,
    completion: Arc<CompletionClient>,
    channel: Arc<dyn Channel>,
    recorder: StatusRecorder,
    config: ChatDispatcherConfig,
}

impl ChatDispatcher {
    pub fn new(
        store: Arc<ConversationStore>,
        completion: Arc<CompletionClient>,
        channel: Arc<dyn Channel>,
        recorder: StatusRecorder,
        config: ChatDispatcherConfig,
    ) -> Self {
        Self {
            store,
            completion,
            channel,
            recorder,
            config,
        }
    }

    /// Relay one chat message. Only transport failures are returned;
    /// completion failures are answered with an apology.
    pub async fn dispatch(&self, message: &InboundMessage) -> TransportResult<()> {
        let user_id = message.sender_id.as_str();
        self.store.append(user_id, ChatRole::User, &message.content);

        info!(
            sender_id = %user_id,
            conversation_id = %message.conversation_id,
            preview = %preview(&message.content),
            "Dispatching message to completion endpoint"
        );

        if self.config.send_typing_indicator
            && let Err(e) = self.channel.send_typing(&message.conversation_id).await
        {
            warn!(error = %e, "Failed to send typing indicator");
        }

        let history = self.store.get(user_id);
        let started = Instant::now();

        let reply = match self.completion.complete(&history).await {
            Ok(reply) => reply,
            Err(e) => return self.send_error_response(message, e).await,
        };
        let latency = started.elapsed();

        self.store.append(user_id, ChatRole::Assistant, reply.clone());
        debug!(
            sender_id = %user_id,
            latency_ms = latency.as_millis() as u64,
            reply_len = reply.len(),
            "Completion succeeded"
        );

        self.channel
            .send(OutboundMessage::new(&message.conversation_id, reply))
            .await?;
        self.recorder.record_response(latency);
        Ok(())
    }

    async fn send_error_response(
        &self,
        message: &InboundMessage,
        error: CompletionError,
    ) -> TransportResult<()> {
        error!(
            sender_id = %message.sender_id,
            status = ?error.status(),
            error = %error,
            "Completion failed"
        );
        self.recorder.record_failure(&error);

        let text = format!("❌ {}", error.user_message());
        self.channel
            .send(OutboundMessage::new(&message.conversation_id, text))
            .await
    }
}

fn preview(content: &str) -> String {
    const MAX_PREVIEW_CHARS: usize = 50;
    let mut preview: String = content.chars().take(MAX_PREVIEW_CHARS).collect();
    if content.chars().count() > MAX_PREVIEW_CHARS {
        preview.push_str("...");
    }
    preview
}
