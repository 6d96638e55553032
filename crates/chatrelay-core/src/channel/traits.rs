use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use super::types::{InboundMessage, OutboundMessage};
use crate::error::TransportResult;

pub type MessageStream = Pin<Box<dyn Stream<Item = InboundMessage> + Send>>;

/// Outbound side of a chat transport, plus optional long-polling.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    fn is_configured(&self) -> bool;

    /// Send a message, splitting it if the transport requires.
    async fn send(&self, message: OutboundMessage) -> TransportResult<()>;

    async fn send_text(&self, conversation_id: &str, text: &str) -> TransportResult<()> {
        self.send(OutboundMessage::new(conversation_id, text)).await
    }

    /// Show a "typing" indicator. Transports without one do nothing.
    async fn send_typing(&self, conversation_id: &str) -> TransportResult<()> {
        let _ = conversation_id;
        Ok(())
    }

    /// Start long-polling. Returns `None` if unsupported, unconfigured or
    /// already polling. The stream ends when polling stops.
    fn start_receiving(&self) -> Option<MessageStream>;

    fn stop_receiving(&self) {}
}

/// Channel that can decode updates pushed to an HTTP endpoint.
#[async_trait]
pub trait WebhookReceiver: Channel {
    /// Decode a raw webhook body into zero or more inbound messages.
    async fn handle_webhook(&self, payload: &[u8]) -> TransportResult<Vec<InboundMessage>>;

    /// Check the shared-secret header. Must reject calls when no secret is
    /// configured.
    fn verify_secret(&self, provided: Option<&str>) -> bool;
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::error::TransportError;

    /// In-memory channel that records everything sent through it.
    #[derive(Default)]
    pub struct RecordingChannel {
        sent: Mutex<Vec<OutboundMessage>>,
        typing: Mutex<Vec<String>>,
        fail_sends: AtomicBool,
    }

    impl RecordingChannel {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Make every subsequent `send` fail with an API error.
        pub fn fail_sends(&self, fail: bool) {
            self.fail_sends.store(fail, Ordering::SeqCst);
        }

        pub fn sent(&self) -> Vec<OutboundMessage> {
            self.sent.lock().clone()
        }

        pub fn texts(&self) -> Vec<String> {
            self.sent.lock().iter().map(|m| m.content.clone()).collect()
        }

        pub fn sent_to(&self, conversation_id: &str) -> Vec<String> {
            self.sent
                .lock()
                .iter()
                .filter(|m| m.conversation_id == conversation_id)
                .map(|m| m.content.clone())
                .collect()
        }

        pub fn typing_count(&self) -> usize {
            self.typing.lock().len()
        }
    }

    #[async_trait]
    impl Channel for RecordingChannel {
        fn name(&self) -> &str {
            "recording"
        }

        fn is_configured(&self) -> bool {
            true
        }

        async fn send(&self, message: OutboundMessage) -> TransportResult<()> {
            if self.fail_sends.load(Ordering::SeqCst) {
                return Err(TransportError::Api("Forbidden: bot was blocked by the user".into()));
            }
            self.sent.lock().push(message);
            Ok(())
        }

        async fn send_typing(&self, conversation_id: &str) -> TransportResult<()> {
            self.typing.lock().push(conversation_id.to_string());
            Ok(())
        }

        fn start_receiving(&self) -> Option<MessageStream> {
            None
        }
    }
}
