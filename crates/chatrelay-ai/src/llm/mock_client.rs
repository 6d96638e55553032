//! Deterministic mock LLM client for dispatcher and handler tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{Duration, sleep};

use crate::error::{CompletionError, Result};

use super::{CompletionRequest, CompletionResponse, FinishReason, LlmClient, Role, TokenUsage};

/// Deterministic step for scripted mock completions.
#[derive(Debug, Clone)]
pub enum MockStepKind {
    /// Return a plain assistant message.
    Text(String),
    /// Return a provider rejection with the given status.
    Error { status: u16, message: String },
    /// Return an empty choice list.
    Empty,
    /// Return a timeout error after the step delay.
    Timeout,
}

/// Scripted completion step with optional delay.
#[derive(Debug, Clone)]
pub struct MockStep {
    pub delay_ms: u64,
    pub kind: MockStepKind,
}

impl MockStep {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Text(content.into()),
        }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Error {
                status,
                message: message.into(),
            },
        }
    }

    pub fn empty() -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Empty,
        }
    }

    pub fn timeout(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            kind: MockStepKind::Timeout,
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

/// A deterministic mock LLM client driven by scripted steps.
///
/// Every request is recorded so tests can inspect the history that was sent.
/// When the script runs out, the client echoes the last user message.
#[derive(Debug, Clone, Default)]
pub struct MockLlmClient {
    model: String,
    script: Arc<Mutex<VecDeque<MockStep>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockLlmClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            script: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn from_steps(model: impl Into<String>, steps: Vec<MockStep>) -> Self {
        let client = Self::new(model);
        Self {
            script: Arc::new(Mutex::new(VecDeque::from(steps))),
            ..client
        }
    }

    /// All requests received so far, oldest first.
    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    async fn next_step(&self) -> Option<MockStep> {
        self.script.lock().await.pop_front()
    }

    fn usage_for(content_len: usize) -> TokenUsage {
        let completion_tokens = content_len as u32;
        TokenUsage {
            prompt_tokens: 1,
            completion_tokens,
            total_tokens: 1 + completion_tokens,
        }
    }

    fn fallback_response(request: &CompletionRequest) -> CompletionResponse {
        let text = request
            .messages
            .iter()
            .rev()
            .find(|msg| msg.role == Role::User)
            .map(|msg| format!("mock-echo: {}", msg.content))
            .unwrap_or_else(|| "mock-ok".to_string());

        CompletionResponse {
            usage: Some(Self::usage_for(text.len())),
            content: Some(text),
            finish_reason: FinishReason::Stop,
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn provider(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.requests.lock().await.push(request.clone());

        let Some(step) = self.next_step().await else {
            return Ok(Self::fallback_response(&request));
        };

        if step.delay_ms > 0 {
            sleep(Duration::from_millis(step.delay_ms)).await;
        }

        match step.kind {
            MockStepKind::Text(content) => Ok(CompletionResponse {
                usage: Some(Self::usage_for(content.len())),
                content: Some(content),
                finish_reason: FinishReason::Stop,
            }),
            MockStepKind::Error { status, message } => Err(CompletionError::Api {
                provider: "mock".to_string(),
                status,
                message,
            }),
            MockStepKind::Empty => Err(CompletionError::EmptyResponse("mock".to_string())),
            MockStepKind::Timeout => Err(CompletionError::Timeout(Duration::from_millis(
                step.delay_ms,
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Message;

    #[tokio::test]
    async fn mock_client_returns_scripted_text() {
        let client = MockLlmClient::from_steps("mock-model", vec![MockStep::text("hello")]);

        let response = client
            .complete(CompletionRequest::new(vec![Message::user("ping")]))
            .await
            .expect("mock response should succeed");

        assert_eq!(response.content.as_deref(), Some("hello"));
        assert_eq!(response.finish_reason, FinishReason::Stop);
    }

    #[tokio::test]
    async fn mock_client_returns_scripted_error() {
        let client =
            MockLlmClient::from_steps("mock-model", vec![MockStep::error(503, "unavailable")]);

        let err = client
            .complete(CompletionRequest::new(vec![Message::user("ping")]))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(503));
    }

    #[tokio::test]
    async fn mock_client_scripted_empty_and_timeout() {
        let client = MockLlmClient::from_steps(
            "mock-model",
            vec![MockStep::empty(), MockStep::timeout(5)],
        );
        let request = CompletionRequest::new(vec![Message::user("ping")]);

        let empty = client.complete(request.clone()).await.unwrap_err();
        assert!(matches!(empty, CompletionError::EmptyResponse(_)));

        let timeout = client.complete(request).await.unwrap_err();
        assert!(timeout.is_timeout());
        assert_eq!(client.request_count().await, 2);
    }

    #[tokio::test]
    async fn mock_client_echoes_when_script_is_exhausted() {
        let client = MockLlmClient::new("mock-model");

        let response = client
            .complete(CompletionRequest::new(vec![
                Message::system("sys"),
                Message::user("first"),
                Message::assistant("reply"),
                Message::user("second"),
            ]))
            .await
            .unwrap();

        assert_eq!(response.content.as_deref(), Some("mock-echo: second"));
    }

    #[tokio::test]
    async fn mock_client_records_requests() {
        let client = MockLlmClient::new("mock-model");
        client
            .complete(CompletionRequest::new(vec![Message::user("a")]))
            .await
            .unwrap();
        client
            .complete(CompletionRequest::new(vec![Message::user("b")]))
            .await
            .unwrap();

        let requests = client.requests().await;
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].messages[0].content, "b");
    }
}
