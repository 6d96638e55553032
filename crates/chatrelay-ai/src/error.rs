//! Error types for completion calls

use std::time::Duration;

use reqwest::Response;
use thiserror::Error;

/// Upper bound on how much of a provider error body is kept.
const MAX_ERROR_BODY: usize = 512;

/// Failure of a single completion call
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} API error ({status}): {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Completion timed out after {0:?}")]
    Timeout(Duration),

    #[error("Empty response from {0}")]
    EmptyResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CompletionError {
    /// Text that is safe to show to a chat user.
    ///
    /// Never includes provider response bodies.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Timeout(_) => {
                "The AI took too long to respond. Please try again in a moment."
            }
            Self::Api { status: 429, .. } => {
                "The AI service is busy right now. Please wait a moment and try again."
            }
            Self::Http(_)
            | Self::Api { .. }
            | Self::EmptyResponse(_)
            | Self::Json(_) => {
                "I'm sorry, I encountered an error while processing your message. Please try again in a moment."
            }
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Http(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// HTTP status of a remote rejection, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Convert a non-success response into a [`CompletionError::Api`].
pub(crate) async fn response_to_error(response: Response, provider: &str) -> CompletionError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    // Truncate error body to prevent leaking large or sensitive responses.
    let message = if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while cut > 0 && !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}... [truncated]", &body[..cut])
    } else {
        body
    };

    CompletionError::Api {
        provider: provider.to_string(),
        status,
        message,
    }
}

/// Result type alias for completion operations
pub type Result<T> = std::result::Result<T, CompletionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_hides_provider_body() {
        let error = CompletionError::Api {
            provider: "OpenRouter".to_string(),
            status: 500,
            message: "internal stack trace: secret-key-123".to_string(),
        };
        assert!(!error.user_message().contains("secret-key-123"));
        assert!(error.to_string().contains("secret-key-123"));
    }

    #[test]
    fn test_rate_limit_has_specific_message() {
        let error = CompletionError::Api {
            provider: "OpenRouter".to_string(),
            status: 429,
            message: "slow down".to_string(),
        };
        assert!(error.user_message().contains("busy"));
        assert_eq!(error.status(), Some(429));
    }

    #[test]
    fn test_timeout_detection() {
        let error = CompletionError::Timeout(Duration::from_secs(5));
        assert!(error.is_timeout());
        assert!(error.user_message().contains("too long"));
        assert!(!CompletionError::EmptyResponse("x".to_string()).is_timeout());
    }
}
