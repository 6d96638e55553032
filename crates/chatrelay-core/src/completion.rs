//! Completion client
//!
//! Turns a user's stored history into a chat-completion request and returns
//! the trimmed reply text. The system prompt is prepended on every call and
//! never stored.

use std::sync::Arc;
use std::time::Duration;

use chatrelay_ai::{CompletionError, CompletionRequest, LlmClient, Message, OpenAIClient};
use tracing::{debug, warn};

use crate::config::CompletionSettings;
use crate::conversation::ChatMessage;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant integrated into a Telegram bot. \
Provide clear, concise, and helpful responses. \
You can use emojis when appropriate to make conversations more engaging. \
Keep responses conversational and friendly.";

/// Build the OpenAI-compatible HTTP client for the configured endpoint.
pub fn llm_client_from_settings(settings: &CompletionSettings) -> Arc<dyn LlmClient> {
    let client = OpenAIClient::new(settings.api_key.clone())
        .with_base_url(settings.base_url.clone())
        .with_model(settings.model.clone())
        .with_request_timeout(settings.timeout)
        .with_attribution(settings.app_referer.clone(), settings.app_title.clone());
    debug!(
        base_url = client.base_url(),
        model = %settings.model,
        "Built completion client"
    );
    Arc::new(client)
}

pub struct CompletionClient {
    llm: Arc<dyn LlmClient>,
    system_prompt: Option<String>,
    max_tokens: u32,
    temperature: f32,
    presence_penalty: f32,
    frequency_penalty: f32,
    timeout: Duration,
}

impl CompletionClient {
    pub fn from_settings(llm: Arc<dyn LlmClient>, settings: &CompletionSettings) -> Self {
        let system_prompt = Some(settings.system_prompt.clone()).filter(|p| !p.trim().is_empty());
        Self {
            llm,
            system_prompt,
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            presence_penalty: settings.presence_penalty,
            frequency_penalty: settings.frequency_penalty,
            timeout: settings.timeout,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    fn build_request(&self, history: &[ChatMessage]) -> CompletionRequest {
        let mut messages = Vec::with_capacity(history.len() + 1);
        if let Some(prompt) = &self.system_prompt {
            messages.push(Message::system(prompt.clone()));
        }
        messages.extend(history.iter().map(Message::from));

        CompletionRequest::new(messages)
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
            .with_presence_penalty(self.presence_penalty)
            .with_frequency_penalty(self.frequency_penalty)
    }

    /// Request a reply for `history`.
    ///
    /// Fails on transport errors, non-success statuses, an elapsed timeout,
    /// or a reply that is empty after trimming.
    pub async fn complete(&self, history: &[ChatMessage]) -> Result<String, CompletionError> {
        let request = self.build_request(history);
        debug!(
            provider = %self.llm.provider(),
            messages = request.messages.len(),
            "Requesting completion"
        );

        let response = match tokio::time::timeout(self.timeout, self.llm.complete(request)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(timeout = ?self.timeout, "Completion timed out");
                return Err(CompletionError::Timeout(self.timeout));
            }
        };

        let text = response
            .content
            .map(|content| content.trim().to_string())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(CompletionError::EmptyResponse(self.llm.provider().to_string()));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatrelay_ai::{MockLlmClient, MockStep, Role};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings() -> CompletionSettings {
        CompletionSettings::with_api_key("test-key")
    }

    #[tokio::test]
    async fn test_request_prepends_system_prompt() {
        let mock = MockLlmClient::from_steps("mock", vec![MockStep::text("  hi there \n")]);
        let client = CompletionClient::from_settings(Arc::new(mock.clone()), &settings());

        let reply = client
            .complete(&[ChatMessage::user("hello")])
            .await
            .unwrap();
        assert_eq!(reply, "hi there");

        let requests = mock.requests().await;
        let sent = &requests[0];
        assert_eq!(sent.messages.len(), 2);
        assert_eq!(sent.messages[0].role, Role::System);
        assert_eq!(sent.messages[0].content, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(sent.messages[1].role, Role::User);
        assert_eq!(sent.max_tokens, Some(1000));
        assert_eq!(sent.temperature, Some(0.7));
        assert_eq!(sent.presence_penalty, Some(0.1));
        assert_eq!(sent.frequency_penalty, Some(0.1));
    }

    #[tokio::test]
    async fn test_blank_system_prompt_is_omitted() {
        let mock = MockLlmClient::new("mock");
        let mut settings = settings();
        settings.system_prompt = "   ".to_string();
        let client = CompletionClient::from_settings(Arc::new(mock.clone()), &settings);

        client.complete(&[ChatMessage::user("x")]).await.unwrap();
        let requests = mock.requests().await;
        assert_eq!(requests[0].messages.len(), 1);
    }

    #[tokio::test]
    async fn test_whitespace_reply_is_empty_response() {
        let mock = MockLlmClient::from_steps("mock", vec![MockStep::text("   ")]);
        let client = CompletionClient::from_settings(Arc::new(mock), &settings());

        let err = client.complete(&[ChatMessage::user("x")]).await.unwrap_err();
        assert!(matches!(err, CompletionError::EmptyResponse(_)));
    }

    #[tokio::test]
    async fn test_slow_completion_times_out() {
        let mock = MockLlmClient::from_steps("mock", vec![MockStep::text("late").with_delay(500)]);
        let client = CompletionClient::from_settings(Arc::new(mock), &settings())
            .with_timeout(Duration::from_millis(20));

        let err = client.complete(&[ChatMessage::user("x")]).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_provider_empty_reply_is_propagated() {
        let mock = MockLlmClient::from_steps("mock", vec![MockStep::empty()]);
        let client = CompletionClient::from_settings(Arc::new(mock), &settings());

        let err = client.complete(&[ChatMessage::user("x")]).await.unwrap_err();
        assert!(matches!(err, CompletionError::EmptyResponse(_)));
    }

    #[tokio::test]
    async fn test_provider_timeout_is_propagated() {
        let mock = MockLlmClient::from_steps("mock", vec![MockStep::timeout(5)]);
        let client = CompletionClient::from_settings(Arc::new(mock), &settings());

        let err = client.complete(&[ChatMessage::user("x")]).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_provider_error_is_propagated() {
        let mock = MockLlmClient::from_steps("mock", vec![MockStep::error(502, "bad gateway")]);
        let client = CompletionClient::from_settings(Arc::new(mock), &settings());

        let err = client.complete(&[ChatMessage::user("x")]).await.unwrap_err();
        assert_eq!(err.status(), Some(502));
    }

    #[tokio::test]
    async fn test_openrouter_client_from_settings() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({
                "model": "openai/gpt-4o-mini",
                "max_tokens": 1000,
                "messages": [
                    {"role": "system"},
                    {"role": "user", "content": "ping"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "pong"}, "finish_reason": "stop"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut settings = settings();
        settings.base_url = server.uri();
        settings.model = "openai/gpt-4o-mini".to_string();
        let client = CompletionClient::from_settings(llm_client_from_settings(&settings), &settings);

        assert_eq!(client.model(), "openai/gpt-4o-mini");
        let reply = client.complete(&[ChatMessage::user("ping")]).await.unwrap();
        assert_eq!(reply, "pong");
    }
}
