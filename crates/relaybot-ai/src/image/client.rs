//! Image synthesis gateway trait and sampling parameters

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Fixed sampling parameters sent with every synthesis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
    pub steps: u32,
    pub sampler_name: String,
    pub scheduler: String,
    pub cfg_scale: f32,
    pub width: u32,
    pub height: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            steps: 6,
            sampler_name: "DPM++ SDE".to_string(),
            scheduler: "Karras".to_string(),
            cfg_scale: 2.0,
            width: 768,
            height: 768,
        }
    }
}

/// Image synthesis gateway trait
#[async_trait]
pub trait ImageSynthesizer: Send + Sync {
    /// Get provider name
    fn provider(&self) -> &str;

    /// Render `prompt` and return the raw bytes of the first image.
    ///
    /// An empty image list is reported as [`crate::AiError::EmptyResult`].
    async fn synthesize(&self, prompt: &str) -> Result<Vec<u8>>;
}
