pub mod channel;
pub mod completion;
pub mod config;
pub mod conversation;
pub mod error;
pub mod runtime;
pub mod status;

use std::sync::Arc;

use chatrelay_ai::LlmClient;
use tracing::info;

use channel::Channel;
use completion::CompletionClient;
use config::RelayConfig;
use conversation::ConversationStore;
use runtime::channel::{MessageHandler, MessageHandlerConfig};
use status::{StatusRecorder, StatusReporter, status_channel};

pub use error::{TransportError, TransportResult};

/// Shared relay state wired from a [`RelayConfig`].
///
/// The server builds one of these at startup and hands the handler to the
/// polling loop or the webhook route, and the reporter to the dashboard.
pub struct RelayCore {
    pub store: Arc<ConversationStore>,
    pub completion: Arc<CompletionClient>,
    pub handler: Arc<MessageHandler>,
    pub recorder: StatusRecorder,
    pub reporter: StatusReporter,
}

impl RelayCore {
    pub fn new(config: &RelayConfig, llm: Arc<dyn LlmClient>, channel: Arc<dyn Channel>) -> Self {
        let store = Arc::new(ConversationStore::new(config.history.max_length));
        let completion = Arc::new(CompletionClient::from_settings(llm, &config.completion));
        let (recorder, reporter) = status_channel(
            store.clone(),
            completion.model().to_string(),
            config.transport_mode(),
        );

        let handler = Arc::new(MessageHandler::new(
            channel,
            store.clone(),
            completion.clone(),
            recorder.clone(),
            MessageHandlerConfig::default(),
        ));

        info!(
            model = %completion.model(),
            max_history = store.max_length(),
            transport = %config.transport_mode(),
            "Relay core initialized"
        );

        Self {
            store,
            completion,
            handler,
            recorder,
            reporter,
        }
    }
}
