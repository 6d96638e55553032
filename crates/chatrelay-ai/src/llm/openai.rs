//! OpenAI-compatible chat-completion provider (OpenRouter by default)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CompletionError, Result, response_to_error};
use crate::http_client::build_http_client;
use crate::llm::client::{
    CompletionRequest, CompletionResponse, FinishReason, LlmClient, TokenUsage,
};

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const OPENROUTER_DEFAULT_MODEL: &str = "openai/gpt-4o";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// OpenAI-compatible client
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    provider_name: String,
    referer: Option<String>,
    title: Option<String>,
}

impl OpenAIClient {
    /// Create a client pointed at OpenRouter with the default model
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: build_http_client(DEFAULT_REQUEST_TIMEOUT),
            api_key: api_key.into(),
            model: OPENROUTER_DEFAULT_MODEL.to_string(),
            base_url: OPENROUTER_BASE_URL.to_string(),
            provider_name: "OpenRouter".to_string(),
            referer: None,
            title: None,
        }
    }

    /// Set the model to use
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set custom base URL (for API-compatible services)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Per-request HTTP timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_http_client(timeout);
        self
    }

    /// OpenRouter app attribution (`HTTP-Referer` / `X-Title`)
    pub fn with_attribution(
        mut self,
        referer: Option<String>,
        title: Option<String>,
    ) -> Self {
        self.referer = referer;
        self.title = title;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_body(&self, request: &CompletionRequest) -> OpenAIRequest {
        let messages = request
            .messages
            .iter()
            .map(|m| OpenAIMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect();

        OpenAIRequest {
            model: self.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            presence_penalty: request.presence_penalty,
            frequency_penalty: request.frequency_penalty,
        }
    }
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
}

#[derive(Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[async_trait]
impl LlmClient for OpenAIClient {
    fn provider(&self) -> &str {
        &self.provider_name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let body = self.build_body(&request);

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        if let Some(referer) = &self.referer {
            builder = builder.header("HTTP-Referer", referer);
        }
        if let Some(title) = &self.title {
            builder = builder.header("X-Title", title);
        }

        debug!(
            provider = %self.provider_name,
            model = %self.model,
            messages = body.messages.len(),
            "Sending completion request"
        );

        let response = builder.json(&body).send().await?;

        if !response.status().is_success() {
            return Err(response_to_error(response, &self.provider_name).await);
        }

        let data: OpenAIResponse = response.json().await?;
        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CompletionError::EmptyResponse(self.provider_name.clone()))?;

        let usage = data.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(CompletionResponse {
            content: choice.message.content,
            finish_reason: FinishReason::from_api(choice.finish_reason.as_deref()),
            usage,
        })
    }
}
