//! Download of inbound image attachments.

use std::time::Duration;

use anyhow::{Result, bail};
use base64::Engine;
use reqwest::Client;
use tracing::{debug, warn};

use crate::channel::InboundAttachment;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches image attachments so they can be passed to the completion service.
#[derive(Debug, Clone)]
pub struct AttachmentFetcher {
    client: Client,
}

impl Default for AttachmentFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl AttachmentFetcher {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }

    /// Download every image attachment and base64-encode it.
    ///
    /// Non-image attachments are ignored. A failed download is logged and
    /// skipped; it never fails the whole message.
    pub async fn fetch_images(&self, attachments: &[InboundAttachment]) -> Vec<String> {
        let mut images = Vec::new();
        for attachment in attachments.iter().filter(|a| a.is_image()) {
            match self.download(&attachment.url).await {
                Ok(bytes) => {
                    debug!(
                        name = attachment.name.as_str(),
                        size = bytes.len(),
                        "Downloaded image attachment"
                    );
                    images.push(base64::engine::general_purpose::STANDARD.encode(bytes));
                }
                Err(err) => {
                    warn!("Skipping attachment {}: {}", attachment.url, err);
                }
            }
        }
        images
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            bail!("download returned HTTP {}", status);
        }
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            bail!("attachment is empty");
        }
        Ok(bytes.to_vec())
    }
}
