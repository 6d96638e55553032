//! ChatRelay AI - chat-completion client
//!
//! This crate provides:
//! - The `LlmClient` trait and request/response types
//! - An OpenAI-compatible client (OpenRouter by default)
//! - A scripted mock client for tests
//! - The shared `reqwest` client builder

pub mod error;
mod http_client;
pub mod llm;

// Re-export commonly used types
pub use error::{CompletionError, Result};
pub use http_client::build_http_client;
pub use llm::{
    CompletionRequest, CompletionResponse, FinishReason, LlmClient, Message, MockLlmClient,
    MockStep, OpenAIClient, Role, TokenUsage,
};
