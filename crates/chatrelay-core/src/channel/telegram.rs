//! Telegram Channel Implementation
//!
//! Talks to the Bot API over plain HTTPS. Inbound updates arrive either by
//! long-polling `getUpdates` or through a webhook registered with
//! `setWebhook`; only text messages are relayed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chatrelay_ai::build_http_client;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::chunk::{TELEGRAM_MAX_LEN, chunk_text};
use super::traits::{Channel, MessageStream, WebhookReceiver};
use super::types::{InboundMessage, OutboundMessage};
use crate::config::{DEFAULT_POLLING_TIMEOUT_SECS, TelegramSettings};
use crate::error::{TransportError, TransportResult};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
/// Timeout for non-polling Bot API calls
const API_TIMEOUT: Duration = Duration::from_secs(30);
/// Pause between consecutive chunks of one long reply
const CHUNK_DELAY: Duration = Duration::from_millis(100);
/// Pause after a failed `getUpdates`
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Long-poll timeout in seconds
    pub polling_timeout: u32,
    /// Expected `X-Telegram-Bot-Api-Secret-Token` on webhook calls
    pub webhook_secret: Option<String>,
    /// Bot API root, overridable for tests
    pub api_base: String,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            polling_timeout: DEFAULT_POLLING_TIMEOUT_SECS,
            webhook_secret: None,
            api_base: TELEGRAM_API_BASE.to_string(),
        }
    }

    pub fn with_polling_timeout(mut self, timeout: u32) -> Self {
        self.polling_timeout = timeout;
        self
    }

    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(secret.into());
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }
}

impl From<&TelegramSettings> for TelegramConfig {
    fn from(settings: &TelegramSettings) -> Self {
        let config = Self::new(settings.bot_token.clone())
            .with_polling_timeout(settings.polling_timeout);
        match &settings.webhook_secret {
            Some(secret) => config.with_webhook_secret(secret.clone()),
            None => config,
        }
    }
}

/// Bot identity returned by `getMe`.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramBotInfo {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Clone)]
pub struct TelegramChannel {
    config: TelegramConfig,
    client: Client,
    polling_active: Arc<AtomicBool>,
    /// Highest update id seen so far
    last_update_id: Arc<AtomicI64>,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: build_http_client(API_TIMEOUT),
            polling_active: Arc::new(AtomicBool::new(false)),
            last_update_id: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn with_token(bot_token: impl Into<String>) -> Self {
        Self::new(TelegramConfig::new(bot_token))
    }

    pub fn last_update_id(&self) -> i64 {
        self.last_update_id.load(Ordering::SeqCst)
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base, self.config.bot_token, method
        )
    }

    /// Call a Bot API method and unwrap the `{ok, result, description}` envelope.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
        timeout: Duration,
    ) -> TransportResult<T> {
        let response = self
            .client
            .post(self.api_url(method))
            .json(&params)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        let envelope: TelegramResponse<T> = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(TransportError::Api(format!("{method} returned HTTP {status}")));
            }
            Err(err) => return Err(err.into()),
        };

        if !envelope.ok {
            return Err(TransportError::Api(format!(
                "{method}: {}",
                envelope.description.unwrap_or_else(|| status.to_string())
            )));
        }
        envelope
            .result
            .ok_or_else(|| TransportError::Api(format!("{method} returned ok but no result")))
    }

    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        parse_mode: Option<&str>,
    ) -> TransportResult<()> {
        let mut params = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(mode) = parse_mode {
            params["parse_mode"] = serde_json::Value::String(mode.to_string());
        }

        let _: serde_json::Value = self.call("sendMessage", params, API_TIMEOUT).await?;
        Ok(())
    }

    async fn poll_updates(&self) -> TransportResult<Vec<TelegramUpdate>> {
        let offset = self.last_update_id.load(Ordering::SeqCst);
        let params = serde_json::json!({
            "offset": if offset > 0 { offset + 1 } else { 0 },
            "timeout": self.config.polling_timeout,
            "allowed_updates": ["message"],
        });
        let timeout = Duration::from_secs(u64::from(self.config.polling_timeout) + 10);

        let updates: Vec<TelegramUpdate> = self.call("getUpdates", params, timeout).await?;
        if let Some(last) = updates.last() {
            self.last_update_id.fetch_max(last.update_id, Ordering::SeqCst);
        }
        Ok(updates)
    }

    /// Keep only text messages from human senders.
    fn convert_update(update: TelegramUpdate) -> Option<InboundMessage> {
        let message = update.message?;
        let from = message.from?;
        if from.is_bot {
            return None;
        }
        let text = message.text?;

        let full_name = match (&from.first_name, &from.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => String::new(),
        };
        let sender_name = from.username.clone().unwrap_or(full_name);

        let mut inbound = InboundMessage::new(
            format!("tg_{}", message.message_id),
            from.id.to_string(),
            message.chat.id.to_string(),
            text,
        );
        if !sender_name.is_empty() {
            inbound = inbound.with_sender_name(sender_name);
        }
        if let Some(first_name) = from.first_name {
            inbound = inbound.with_first_name(first_name);
        }
        if let Some(date) = message.date {
            inbound.timestamp = date * 1000;
        }
        Some(inbound)
    }

    /// Verify the token by calling `getMe`.
    pub async fn test_connection(&self) -> TransportResult<TelegramBotInfo> {
        self.call("getMe", serde_json::json!({}), API_TIMEOUT).await
    }

    /// Register `url` as the webhook endpoint for this bot.
    pub async fn set_webhook(&self, url: &str) -> TransportResult<()> {
        let mut params = serde_json::json!({
            "url": url,
            "allowed_updates": ["message"],
        });
        if let Some(secret) = &self.config.webhook_secret {
            params["secret_token"] = serde_json::Value::String(secret.clone());
        }

        let _: bool = self.call("setWebhook", params, API_TIMEOUT).await?;
        info!(url, "Telegram webhook registered");
        Ok(())
    }

    /// Remove any registered webhook so `getUpdates` can be used.
    pub async fn delete_webhook(&self) -> TransportResult<()> {
        let _: bool = self
            .call("deleteWebhook", serde_json::json!({}), API_TIMEOUT)
            .await?;
        debug!("Telegram webhook cleared");
        Ok(())
    }

    async fn send_typing_action(&self, chat_id: &str) -> TransportResult<()> {
        let params = serde_json::json!({
            "chat_id": chat_id,
            "action": "typing",
        });
        let _: bool = self.call("sendChatAction", params, API_TIMEOUT).await?;
        debug!(chat_id, "Sent typing indicator");
        Ok(())
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "Telegram"
    }

    fn is_configured(&self) -> bool {
        !self.config.bot_token.is_empty()
    }

    async fn send(&self, message: OutboundMessage) -> TransportResult<()> {
        let parse_mode = message.parse_mode.as_deref();
        let chunks = chunk_text(&message.content, TELEGRAM_MAX_LEN);

        for (index, chunk) in chunks.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(CHUNK_DELAY).await;
            }
            self.send_message(&message.conversation_id, chunk, parse_mode)
                .await?;
        }
        Ok(())
    }

    async fn send_typing(&self, conversation_id: &str) -> TransportResult<()> {
        self.send_typing_action(conversation_id).await
    }

    fn start_receiving(&self) -> Option<MessageStream> {
        if !self.is_configured() {
            return None;
        }
        if self
            .polling_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Telegram polling already active");
            return None;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let channel = self.clone();

        tokio::spawn(async move {
            info!("Starting Telegram polling");

            while channel.polling_active.load(Ordering::SeqCst) {
                match channel.poll_updates().await {
                    Ok(updates) => {
                        for update in updates {
                            let Some(message) = Self::convert_update(update) else {
                                continue;
                            };
                            debug!(
                                message_id = %message.id,
                                sender_id = %message.sender_id,
                                "Received Telegram message"
                            );
                            if tx.send(message).is_err() {
                                warn!("Message receiver dropped, stopping polling");
                                channel.polling_active.store(false, Ordering::SeqCst);
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Telegram polling error");
                        tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                    }
                }
            }

            channel.polling_active.store(false, Ordering::SeqCst);
            info!("Telegram polling stopped");
        });

        Some(Box::pin(
            tokio_stream::wrappers::UnboundedReceiverStream::new(rx),
        ))
    }

    fn stop_receiving(&self) {
        self.polling_active.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl WebhookReceiver for TelegramChannel {
    async fn handle_webhook(&self, payload: &[u8]) -> TransportResult<Vec<InboundMessage>> {
        let update: TelegramUpdate = serde_json::from_slice(payload)?;
        self.last_update_id
            .fetch_max(update.update_id, Ordering::SeqCst);
        Ok(Self::convert_update(update).into_iter().collect())
    }

    fn verify_secret(&self, provided: Option<&str>) -> bool {
        match &self.config.webhook_secret {
            Some(expected) => provided == Some(expected.as_str()),
            None => false,
        }
    }
}

// ============================================================================
// Telegram API Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    message_id: i64,
    from: Option<TelegramUser>,
    chat: TelegramChat,
    /// Unix seconds
    date: Option<i64>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    id: i64,
    #[serde(default)]
    is_bot: bool,
    first_name: Option<String>,
    last_name: Option<String>,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

// ============================================================================
// Tests
// ============================================================================
