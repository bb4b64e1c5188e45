//! Chat Channel Types
//!
//! Core types shared by the delivery adapters and the runtime.

use serde::{Deserialize, Serialize};

/// File name used for posted images.
pub const IMAGE_FILE_NAME: &str = "output.png";

/// Attachment carried by an inbound message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundAttachment {
    pub url: String,
    pub content_type: Option<String>,
    pub name: String,
}

impl InboundAttachment {
    /// Whether the platform labelled this attachment as an image
    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|content_type| content_type.starts_with("image/"))
    }
}

/// Inbound message from a channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Unique message ID
    pub id: String,
    /// Sender identifier (user ID in the channel)
    pub sender_id: String,
    /// Sender display name
    pub sender_name: String,
    /// Whether the sender is an automated account
    pub sender_is_bot: bool,
    /// Conversation identifier (channel id)
    pub conversation_id: String,
    /// Message content
    pub content: String,
    /// Timestamp (milliseconds since epoch)
    pub timestamp: i64,
    pub attachments: Vec<InboundAttachment>,
}

impl InboundMessage {
    /// Create a new inbound message
    pub fn new(
        id: impl Into<String>,
        sender_id: impl Into<String>,
        conversation_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let sender_id = sender_id.into();
        Self {
            id: id.into(),
            sender_name: sender_id.clone(),
            sender_id,
            sender_is_bot: false,
            conversation_id: conversation_id.into(),
            content: content.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            attachments: Vec::new(),
        }
    }

    /// Set sender name
    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = name.into();
        self
    }

    /// Mark the sender as a bot
    pub fn from_bot(mut self) -> Self {
        self.sender_is_bot = true;
        self
    }

    /// Set timestamp
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_attachment(mut self, attachment: InboundAttachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// Image attached to an outbound message
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAttachment {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ImageAttachment {
    pub fn png(bytes: Vec<u8>) -> Self {
        Self {
            file_name: IMAGE_FILE_NAME.to_string(),
            bytes,
        }
    }
}

/// Outbound message to a channel
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    /// Conversation identifier
    pub conversation_id: String,
    /// Message text, if any
    pub content: Option<String>,
    pub image: Option<ImageAttachment>,
    /// Reply to specific message
    pub reply_to: Option<String>,
}

impl OutboundMessage {
    /// Create a text message
    pub fn text(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            content: Some(content.into()),
            image: None,
            reply_to: None,
        }
    }

    /// Create a message carrying an image and optional caption.
    ///
    /// A blank caption is dropped so the platform shows the image alone.
    pub fn image(conversation_id: impl Into<String>, caption: &str, bytes: Vec<u8>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            content: (!caption.trim().is_empty()).then(|| caption.to_string()),
            image: Some(ImageAttachment::png(bytes)),
            reply_to: None,
        }
    }

    /// Set reply_to
    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    /// Text as it will be displayed (empty when only an image is sent)
    pub fn display_text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

/// Handle to a message that has been posted
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageHandle {
    pub conversation_id: String,
    pub message_id: String,
}

impl MessageHandle {
    pub fn new(conversation_id: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            message_id: message_id.into(),
        }
    }
}

impl std::fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.conversation_id, self.message_id)
    }
}
