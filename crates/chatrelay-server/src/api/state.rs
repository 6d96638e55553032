use std::sync::Arc;

use chatrelay_core::channel::WebhookReceiver;
use chatrelay_core::runtime::channel::MessageHandler;
use chatrelay_core::status::StatusReporter;

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub reporter: StatusReporter,
    pub handler: Arc<MessageHandler>,
    /// Set only in webhook mode. `POST /webhook` is a 404 without it.
    pub webhook: Option<Arc<dyn WebhookReceiver>>,
}

impl AppState {
    pub fn new(
        reporter: StatusReporter,
        handler: Arc<MessageHandler>,
        webhook: Option<Arc<dyn WebhookReceiver>>,
    ) -> Self {
        Self {
            reporter,
            handler,
            webhook,
        }
    }
}
