//! RelayBot AI - gateways to the completion and image-synthesis services
//!
//! This crate provides:
//! - A completion gateway (prompt + continuation token + images → text + token)
//! - An image synthesis gateway (prompt → image bytes)
//! - HTTP clients for Ollama and Stable Diffusion WebUI with retry/backoff
//! - Scripted mock gateways behind the `test-utils` feature

pub mod error;
mod http_client;
pub mod image;
pub mod llm;
pub mod retry;

// Re-export commonly used types
pub use error::{AiError, Result};
pub use image::{ImageSynthesizer, SamplingParams, StableDiffusionClient};
pub use llm::{
    CompletionGateway, CompletionRequest, CompletionResponse, ContinuationToken, OllamaClient,
};
pub use retry::RetryConfig;
