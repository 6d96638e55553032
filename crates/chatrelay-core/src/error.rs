//! Transport error types

use thiserror::Error;

/// Failure talking to the Telegram Bot API or decoding its payloads.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Telegram HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram API error: {0}")]
    Api(String),

    #[error("Invalid update payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("{0} channel is not configured")]
    NotConfigured(String),
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;
