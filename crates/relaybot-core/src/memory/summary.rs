//! Rolling summary generation for participant logs.

use std::sync::Arc;

use relaybot_ai::{AiError, CompletionGateway, CompletionRequest, ContinuationToken};

use super::participant::MemoryEntry;

pub const SUMMARY_PROMPT: &str = include_str!("templates/summary_prompt.md");

const NO_PREVIOUS_SUMMARY: &str = "(none yet)";

/// Folds new log entries into an existing summary with a dedicated model.
#[derive(Clone)]
pub struct Summarizer {
    gateway: Arc<dyn CompletionGateway>,
    model: String,
}

impl Summarizer {
    pub fn new(gateway: Arc<dyn CompletionGateway>, model: impl Into<String>) -> Self {
        Self {
            gateway,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Produce the next summary. Each call is stateless (empty continuation).
    pub async fn summarize(
        &self,
        previous: &str,
        entries: &[MemoryEntry],
    ) -> relaybot_ai::Result<String> {
        let prompt = build_summary_prompt(previous, entries);
        let request = CompletionRequest::new(prompt)
            .with_model(self.model.clone())
            .with_context(ContinuationToken::empty());

        let response = self.gateway.complete(request).await?;
        let summary = response.text.trim();
        if summary.is_empty() {
            return Err(AiError::EmptyResult("summarizer returned no text".to_string()));
        }
        Ok(summary.to_string())
    }
}

/// Render entries as `name: text` lines.
pub fn render_entries(entries: &[MemoryEntry]) -> String {
    entries
        .iter()
        .map(|entry| format!("{}: {}", entry.speaker, entry.text))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_summary_prompt(previous: &str, entries: &[MemoryEntry]) -> String {
    let previous = if previous.trim().is_empty() {
        NO_PREVIOUS_SUMMARY
    } else {
        previous
    };
    SUMMARY_PROMPT
        .replace("{previous_summary}", previous)
        .replace("{new_messages}", &render_entries(entries))
}
