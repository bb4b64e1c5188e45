//! Classification of completion text into a reply directive.

use crate::config::DirectiveConfig;

/// What the model asked us to do with its reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// The model declined to engage; send nothing.
    Suppressed,
    /// Send the text as-is.
    PlainReply(String),
    /// Send `leading_text` with an image rendered from `image_prompt`.
    ImageReply {
        leading_text: String,
        image_prompt: String,
    },
}

/// Splits completion text on the configured decline token and image marker.
#[derive(Debug, Clone)]
pub struct DirectiveParser {
    decline_token: String,
    image_marker: String,
}

impl Default for DirectiveParser {
    fn default() -> Self {
        Self::new(&DirectiveConfig::default())
    }
}

impl DirectiveParser {
    pub fn new(config: &DirectiveConfig) -> Self {
        Self {
            decline_token: config.decline_token.clone(),
            image_marker: config.image_marker.clone(),
        }
    }

    /// Classify raw completion text. Pure; no side effects.
    pub fn classify(&self, text: &str) -> Directive {
        if !self.decline_token.is_empty() && text.starts_with(&self.decline_token) {
            return Directive::Suppressed;
        }

        if !self.image_marker.is_empty()
            && let Some((before, after)) = text.split_once(&self.image_marker)
        {
            let leading_text = before.trim().to_string();
            let image_prompt = after.trim();
            if image_prompt.is_empty() {
                return Directive::PlainReply(leading_text);
            }
            return Directive::ImageReply {
                leading_text,
                image_prompt: image_prompt.to_string(),
            };
        }

        Directive::PlainReply(text.to_string())
    }
}
