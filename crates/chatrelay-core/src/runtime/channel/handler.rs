//! Channel Message Handler
//!
//! Every inbound message, from polling or the webhook, goes through
//! [`MessageHandler::submit`]. The handler keeps one worker task per user,
//! fed by an unbounded queue, so a user's messages are handled strictly in
//! arrival order while different users proceed concurrently. Workers exit
//! after sitting idle and are recreated on the next message.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::channel::{Channel, InboundMessage};
use crate::completion::CompletionClient;
use crate::conversation::ConversationStore;
use crate::status::StatusRecorder;

use super::chat_dispatcher::{ChatDispatcher, ChatDispatcherConfig};
use super::commands::{CommandContext, handle_command};
use super::router::{MessageRouter, RouteDecision};

#[cfg(test)]
const STREAM_RECONNECT_DELAY: Duration = Duration::from_millis(20);
#[cfg(not(test))]
const STREAM_RECONNECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct MessageHandlerConfig {
    /// Command prefix (default: "/")
    pub command_prefix: String,
    /// How long a per-user worker waits for new messages before exiting
    pub worker_idle_timeout: Duration,
    pub dispatcher: ChatDispatcherConfig,
}

impl Default for MessageHandlerConfig {
    fn default() -> Self {
        Self {
            command_prefix: "/".to_string(),
            worker_idle_timeout: Duration::from_secs(300),
            dispatcher: ChatDispatcherConfig::default(),
        }
    }
}

pub struct MessageHandler {
    channel: Arc<dyn Channel>,
    msg_router: MessageRouter,
    commands: CommandContext,
    dispatcher: ChatDispatcher,
    recorder: StatusRecorder,
    workers: Mutex<HashMap<String, UnboundedSender<InboundMessage>>>,
    idle_timeout: Duration,
}

impl MessageHandler {
    pub fn new(
        channel: Arc<dyn Channel>,
        store: Arc<ConversationStore>,
        completion: Arc<CompletionClient>,
        recorder: StatusRecorder,
        config: MessageHandlerConfig,
    ) -> Self {
        let commands = CommandContext {
            channel: channel.clone(),
            store: store.clone(),
            model: completion.model().to_string(),
        };
        let dispatcher = ChatDispatcher::new(
            store,
            completion,
            channel.clone(),
            recorder.clone(),
            config.dispatcher,
        );

        Self {
            channel,
            msg_router: MessageRouter::new(config.command_prefix),
            commands,
            dispatcher,
            recorder,
            workers: Mutex::new(HashMap::new()),
            idle_timeout: config.worker_idle_timeout,
        }
    }

    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    pub fn recorder(&self) -> &StatusRecorder {
        &self.recorder
    }

    /// Number of live per-user workers.
    pub fn active_workers(&self) -> usize {
        self.workers.lock().len()
    }

    /// Queue a message on its sender's worker, starting one if needed.
    pub fn submit(self: &Arc<Self>, message: InboundMessage) {
        let user_id = message.sender_id.clone();
        let mut workers = self.workers.lock();

        let message = match workers.get(&user_id) {
            Some(tx) => match tx.send(message) {
                Ok(()) => return,
                // Worker died without deregistering; replace it.
                Err(mpsc::error::SendError(message)) => message,
            },
            None => message,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(message);
        workers.insert(user_id.clone(), tx.clone());
        debug!(user_id = %user_id, "Started worker");

        let handler = Arc::clone(self);
        tokio::spawn(async move { handler.run_worker(user_id, tx, rx).await });
    }

    async fn run_worker(
        self: Arc<Self>,
        user_id: String,
        tx: UnboundedSender<InboundMessage>,
        mut rx: UnboundedReceiver<InboundMessage>,
    ) {
        loop {
            match tokio::time::timeout(self.idle_timeout, rx.recv()).await {
                Ok(Some(message)) => self.process(&message).await,
                Ok(None) => break,
                Err(_) => {
                    if self.retire_worker(&user_id, &tx, &rx) {
                        break;
                    }
                }
            }
        }
        debug!(user_id = %user_id, "Worker exited");
    }

    /// Deregister an idle worker unless a message raced in.
    fn retire_worker(
        &self,
        user_id: &str,
        tx: &UnboundedSender<InboundMessage>,
        rx: &UnboundedReceiver<InboundMessage>,
    ) -> bool {
        let mut workers = self.workers.lock();
        if !rx.is_empty() {
            return false;
        }
        if workers
            .get(user_id)
            .is_some_and(|current| current.same_channel(tx))
        {
            workers.remove(user_id);
        }
        true
    }

    /// Route and handle one message. Errors are logged, never propagated.
    pub async fn process(&self, message: &InboundMessage) {
        let decision = self.msg_router.route(message);
        if decision == RouteDecision::Ignore {
            debug!(message_id = %message.id, "Ignoring empty message");
            return;
        }
        self.recorder.record_inbound();

        let result = match decision {
            RouteDecision::HandleCommand { command, .. } => {
                handle_command(&self.commands, message, &command).await
            }
            RouteDecision::DispatchToChat => self.dispatcher.dispatch(message).await,
            RouteDecision::Ignore => Ok(()),
        };

        if let Err(e) = result {
            error!(
                message_id = %message.id,
                conversation_id = %message.conversation_id,
                error = %e,
                "Failed to deliver reply"
            );
            self.recorder.record_error(&e);
        }
    }
}

/// Drive long-polling until `shutdown` fires, feeding every message to
/// [`MessageHandler::submit`].
pub fn spawn_polling_loop(
    handler: Arc<MessageHandler>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let channel = handler.channel().clone();
        info!(channel = channel.name(), "Listening for messages");
        handler.recorder().set_online(true);

        'outer: loop {
            let Some(mut stream) = channel.start_receiving() else {
                warn!(
                    channel = channel.name(),
                    "Failed to start message stream, retrying in {:?}", STREAM_RECONNECT_DELAY
                );
                tokio::select! {
                    _ = shutdown.cancelled() => break 'outer,
                    _ = sleep(STREAM_RECONNECT_DELAY) => continue 'outer,
                }
            };

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break 'outer,
                    next = stream.next() => match next {
                        Some(message) => {
                            debug!(
                                message_id = %message.id,
                                conversation_id = %message.conversation_id,
                                "Handler received message"
                            );
                            handler.submit(message);
                        }
                        None => {
                            warn!(
                                channel = channel.name(),
                                "Message stream ended, restarting in {:?}", STREAM_RECONNECT_DELAY
                            );
                            break;
                        }
                    },
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => break 'outer,
                _ = sleep(STREAM_RECONNECT_DELAY) => {}
            }
        }

        channel.stop_receiving();
        handler.recorder().set_online(false);
        info!(channel = channel.name(), "Message handler stopped");
    })
}
