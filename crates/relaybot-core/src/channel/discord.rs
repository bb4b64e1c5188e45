//! Discord delivery implementation.
//!
//! Uses the Discord REST API to post, edit and delete messages. Receiving
//! (Gateway WebSocket) is handled by the hosting process.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::traits::{ChatDelivery, DeliveryError};
use super::types::{MessageHandle, OutboundMessage};

const DISCORD_API_BASE: &str = "https://discord.com/api/v10";
const DISCORD_MAX_MESSAGE_LEN: usize = 2000;

/// Discord delivery configuration.
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub bot_token: String,
    pub api_base: String,
}

/// Discord delivery over the REST API.
pub struct DiscordDelivery {
    config: DiscordConfig,
    client: Client,
}

#[derive(Deserialize)]
struct DiscordMessage {
    id: String,
}

impl DiscordDelivery {
    pub fn new(config: DiscordConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    pub fn with_token(token: &str) -> Self {
        Self::new(DiscordConfig {
            bot_token: token.to_string(),
            api_base: DISCORD_API_BASE.to_string(),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.config.api_base = api_base.into();
        self
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.config.bot_token)
    }

    fn messages_url(&self, channel_id: &str) -> String {
        format!("{}/channels/{}/messages", self.config.api_base, channel_id)
    }

    fn message_url(&self, handle: &MessageHandle) -> String {
        format!(
            "{}/{}",
            self.messages_url(&handle.conversation_id),
            handle.message_id
        )
    }

    fn payload(message: &OutboundMessage) -> serde_json::Value {
        let mut payload = json!({
            "content": message
                .content
                .as_deref()
                .map(truncate_content)
                .unwrap_or_default(),
        });
        if let Some(reply_to) = &message.reply_to {
            payload["message_reference"] = json!({ "message_id": reply_to });
        }
        if let Some(image) = &message.image {
            payload["attachments"] = json!([{ "id": 0, "filename": image.file_name }]);
        }
        payload
    }
}

/// Clamp content to Discord's message length limit on a char boundary.
fn truncate_content(text: &str) -> String {
    if text.chars().count() <= DISCORD_MAX_MESSAGE_LEN {
        return text.to_string();
    }
    text.chars().take(DISCORD_MAX_MESSAGE_LEN).collect()
}

async fn failure_reason(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    format!("HTTP {}: {}", status, body)
}

#[async_trait]
impl ChatDelivery for DiscordDelivery {
    fn name(&self) -> &str {
        "Discord"
    }

    async fn send(&self, message: OutboundMessage) -> Result<MessageHandle, DeliveryError> {
        let payload = Self::payload(&message);
        let request = self
            .client
            .post(self.messages_url(&message.conversation_id))
            .header("Authorization", self.auth_header());

        let request = match &message.image {
            Some(image) => {
                let part = Part::bytes(image.bytes.clone())
                    .file_name(image.file_name.clone())
                    .mime_str("image/png")?;
                let form = Form::new()
                    .text("payload_json", payload.to_string())
                    .part("files[0]", part);
                request.multipart(form)
            }
            None => request.json(&payload),
        };

        let response = request.send().await?;
        if !response.status().is_success() {
            let reason = failure_reason(response).await;
            warn!("Discord send failed ({})", reason);
            return Err(DeliveryError::Send(reason));
        }

        let posted: DiscordMessage = response.json().await?;
        debug!(
            "Posted Discord message {} in {}",
            posted.id, message.conversation_id
        );
        Ok(MessageHandle::new(message.conversation_id, posted.id))
    }

    async fn edit(
        &self,
        handle: &MessageHandle,
        text: &str,
    ) -> Result<MessageHandle, DeliveryError> {
        let response = self
            .client
            .patch(self.message_url(handle))
            .header("Authorization", self.auth_header())
            .json(&json!({ "content": truncate_content(text) }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DeliveryError::Edit {
                handle: handle.clone(),
                reason: failure_reason(response).await,
            });
        }

        let edited: DiscordMessage = response.json().await?;
        Ok(MessageHandle::new(&handle.conversation_id, edited.id))
    }

    async fn delete(&self, handle: &MessageHandle) -> Result<(), DeliveryError> {
        let response = self
            .client
            .delete(self.message_url(handle))
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DeliveryError::Delete {
                handle: handle.clone(),
                reason: failure_reason(response).await,
            });
        }
        Ok(())
    }
}
