//! Completion gateway trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Opaque dialogue state returned by the completion service.
///
/// Tokens are never edited; each successful completion hands back a new one
/// that replaces the previous token wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(Vec<i64>);

impl ContinuationToken {
    /// Token used for the first turn of a conversation.
    pub fn seed() -> Self {
        Self(vec![0])
    }

    /// Token for stateless one-off calls (summaries, verification).
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn from_values(values: Vec<i64>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Completion request
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    /// Model override; the gateway's default model is used when unset.
    pub model: Option<String>,
    pub context: ContinuationToken,
    /// Base64-encoded images attached to the prompt.
    pub images: Vec<String>,
}

impl CompletionRequest {
    /// Create a new stateless request
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
            context: ContinuationToken::empty(),
            images: Vec::new(),
        }
    }

    /// Override the model for this request
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Thread a continuation token through the call
    pub fn with_context(mut self, context: ContinuationToken) -> Self {
        self.context = context;
        self
    }

    /// Attach base64-encoded images
    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }
}

/// Completion response
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub text: String,
    pub context: ContinuationToken,
}

/// Completion gateway trait
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// Get provider name
    fn provider(&self) -> &str;

    /// Get default model name
    fn model(&self) -> &str;

    /// Run a single completion
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}
