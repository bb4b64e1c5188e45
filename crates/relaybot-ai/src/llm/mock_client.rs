//! Deterministic mock completion gateway for tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{Duration, sleep};

use crate::error::{AiError, Result};

use super::{CompletionGateway, CompletionRequest, CompletionResponse, ContinuationToken};

/// Deterministic step for scripted mock completions.
#[derive(Debug, Clone)]
pub enum MockStepKind {
    /// Return a reply with the given continuation token.
    Text {
        text: String,
        context: ContinuationToken,
    },
    /// Fail with a transport-level error.
    TransportError(String),
    /// Fail because the payload could not be understood.
    Malformed(String),
}

/// Scripted completion step with optional delay.
#[derive(Debug, Clone)]
pub struct MockStep {
    pub delay_ms: u64,
    pub kind: MockStepKind,
}

impl MockStep {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Text {
                text: text.into(),
                context: ContinuationToken::empty(),
            },
        }
    }

    pub fn text_with_context(text: impl Into<String>, context: Vec<i64>) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Text {
                text: text.into(),
                context: ContinuationToken::from_values(context),
            },
        }
    }

    pub fn transport_error(message: impl Into<String>) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::TransportError(message.into()),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Malformed(message.into()),
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

/// A deterministic mock completion gateway driven by scripted steps.
///
/// Every request is recorded so tests can assert on prompts, models and
/// continuation tokens after the fact.
#[derive(Debug, Clone, Default)]
pub struct MockCompletionClient {
    model: String,
    script: Arc<Mutex<VecDeque<MockStep>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockCompletionClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self::from_steps(model, Vec::new())
    }

    pub fn from_steps(model: impl Into<String>, steps: Vec<MockStep>) -> Self {
        Self {
            model: model.into(),
            script: Arc::new(Mutex::new(VecDeque::from(steps))),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn push_step(&self, step: MockStep) {
        self.script.lock().await.push_back(step);
    }

    /// All requests received so far, in order.
    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    async fn next_step(&self) -> Option<MockStep> {
        self.script.lock().await.pop_front()
    }
}

#[async_trait]
impl CompletionGateway for MockCompletionClient {
    fn provider(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.requests.lock().await.push(request.clone());

        let Some(step) = self.next_step().await else {
            return Ok(CompletionResponse {
                text: format!("mock-echo: {}", request.prompt),
                context: request.context,
            });
        };

        if step.delay_ms > 0 {
            sleep(Duration::from_millis(step.delay_ms)).await;
        }

        match step.kind {
            MockStepKind::Text { text, context } => Ok(CompletionResponse { text, context }),
            MockStepKind::TransportError(message) => Err(AiError::Transport(message)),
            MockStepKind::Malformed(message) => Err(AiError::MalformedResponse(message)),
        }
    }
}
