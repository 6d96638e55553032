//! LLM module - chat-completion client abstraction

mod client;
mod mock_client;
mod openai;

pub use client::{
    CompletionRequest, CompletionResponse, FinishReason, LlmClient, Message, Role, TokenUsage,
};
pub use mock_client::{MockLlmClient, MockStep, MockStepKind};
pub use openai::{OPENROUTER_BASE_URL, OPENROUTER_DEFAULT_MODEL, OpenAIClient};
