//! LLM module - completion gateway abstraction

mod client;
#[cfg(any(test, feature = "test-utils"))]
mod mock_client;
mod ollama;

pub use client::{CompletionGateway, CompletionRequest, CompletionResponse, ContinuationToken};
#[cfg(any(test, feature = "test-utils"))]
pub use mock_client::{MockCompletionClient, MockStep, MockStepKind};
pub use ollama::OllamaClient;
