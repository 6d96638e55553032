//! Telegram webhook endpoint

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use chatrelay_core::TransportError;
use serde::Serialize;
use tracing::{debug, warn};

use super::error::ApiError;
use super::state::AppState;

pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
}

/// Accept one Telegram update and queue any text message it carries.
///
/// Only answers in webhook mode, and only when the secret token matches.
pub async fn receive_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let Some(webhook) = state.webhook.as_ref() else {
        debug!("Webhook call while polling, ignoring");
        return Err(ApiError::not_found("Webhook is not enabled"));
    };

    let provided = headers
        .get(SECRET_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());
    if !webhook.verify_secret(provided) {
        warn!("Rejected webhook call with bad secret token");
        return Err(ApiError::unauthorized("Invalid secret token"));
    }

    let messages = webhook.handle_webhook(&body).await.map_err(|e| match e {
        TransportError::InvalidPayload(err) => {
            ApiError::bad_request(format!("Invalid update: {err}"))
        }
        other => ApiError::internal(other.to_string()),
    })?;

    if messages.is_empty() {
        debug!("Webhook update carried no text message");
        return Ok(Json(WebhookAck {
            status: "no_message",
        }));
    }

    for message in messages {
        state.handler.submit(message);
    }
    Ok(Json(WebhookAck { status: "ok" }))
}
