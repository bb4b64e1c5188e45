//! Scripted image synthesizer for tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{AiError, Result};

use super::ImageSynthesizer;

/// Outcome of one scripted synthesis call.
#[derive(Debug, Clone)]
pub enum MockImageStep {
    Image(Vec<u8>),
    Empty,
    Error(String),
}

/// A mock synthesizer that replays scripted outcomes and records prompts.
///
/// Once the script is exhausted every call yields a small placeholder image.
#[derive(Debug, Clone, Default)]
pub struct MockImageSynthesizer {
    script: Arc<Mutex<VecDeque<MockImageStep>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockImageSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_steps(steps: Vec<MockImageStep>) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::from(steps))),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn push_step(&self, step: MockImageStep) {
        self.script.lock().await.push_back(step);
    }

    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.prompts.lock().await.len()
    }
}

#[async_trait]
impl ImageSynthesizer for MockImageSynthesizer {
    fn provider(&self) -> &str {
        "mock"
    }

    async fn synthesize(&self, prompt: &str) -> Result<Vec<u8>> {
        let call = {
            let mut prompts = self.prompts.lock().await;
            prompts.push(prompt.to_string());
            prompts.len()
        };

        match self.script.lock().await.pop_front() {
            Some(MockImageStep::Image(bytes)) => Ok(bytes),
            Some(MockImageStep::Empty) => Err(AiError::EmptyResult("mock: no images".to_string())),
            Some(MockImageStep::Error(message)) => Err(AiError::Transport(message)),
            None => Ok(format!("mock-image-{call}").into_bytes()),
        }
    }
}
