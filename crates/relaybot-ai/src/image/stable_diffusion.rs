//! Stable Diffusion WebUI provider (`/sdapi/v1/txt2img`)

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AiError, Result};
use crate::http_client::build_http_client;
use crate::image::client::{ImageSynthesizer, SamplingParams};
use crate::retry::{RetryConfig, send_with_retry};

const TXT2IMG_TIMEOUT: Duration = Duration::from_secs(600);

/// Stable Diffusion client
pub struct StableDiffusionClient {
    client: Client,
    endpoint: String,
    params: SamplingParams,
    retry_config: RetryConfig,
}

impl StableDiffusionClient {
    /// Create a new client posting to the full txt2img endpoint URL
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: build_http_client(TXT2IMG_TIMEOUT),
            endpoint: endpoint.into(),
            params: SamplingParams::default(),
            retry_config: RetryConfig::default(),
        }
    }

    pub fn with_params(mut self, params: SamplingParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Serialize)]
struct Txt2ImgRequest<'a> {
    prompt: &'a str,
    #[serde(flatten)]
    params: &'a SamplingParams,
}

#[derive(Deserialize)]
struct Txt2ImgResponse {
    images: Option<Vec<String>>,
}

#[async_trait]
impl ImageSynthesizer for StableDiffusionClient {
    fn provider(&self) -> &str {
        "stable-diffusion"
    }

    async fn synthesize(&self, prompt: &str) -> Result<Vec<u8>> {
        let body = Txt2ImgRequest {
            prompt,
            params: &self.params,
        };

        tracing::debug!(steps = self.params.steps, "Requesting image synthesis");

        let response = send_with_retry(&self.retry_config, "stable-diffusion", || {
            self.client.post(&self.endpoint).json(&body)
        })
        .await?;

        let raw = response.text().await?;
        let data: Txt2ImgResponse = serde_json::from_str(&raw).map_err(|err| {
            AiError::MalformedResponse(format!("txt2img body: {}", err))
        })?;

        let Some(first) = data.images.and_then(|images| images.into_iter().next()) else {
            return Err(AiError::EmptyResult(
                "no images received from Stable Diffusion".to_string(),
            ));
        };

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(first.trim())
            .map_err(|err| AiError::MalformedResponse(format!("image is not base64: {}", err)))?;

        if bytes.is_empty() {
            return Err(AiError::EmptyResult("first image is empty".to_string()));
        }

        Ok(bytes)
    }
}
