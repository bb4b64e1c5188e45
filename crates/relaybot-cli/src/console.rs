//! Console harness: stdin lines in, printed replies and image files out.

use async_trait::async_trait;
use relaybot_core::channel::{ChatDelivery, DeliveryError, MessageHandle, OutboundMessage};
use relaybot_core::InboundMessage;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncBufRead;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::{Stream, StreamExt};
use tracing::warn;

/// Turn each non-blank line of `reader` into an inbound message from `user`.
pub fn inbound_stream<R>(
    reader: R,
    channel: &str,
    user: &str,
) -> impl Stream<Item = InboundMessage> + Send + Unpin + 'static
where
    R: AsyncBufRead + Send + Unpin + 'static,
{
    use tokio::io::AsyncBufReadExt;

    let channel = channel.to_string();
    let user = user.to_string();
    let mut next_id = 0u64;

    LinesStream::new(reader.lines()).filter_map(move |line| {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!("Failed to read input line: {}", err);
                return None;
            }
        };
        if line.trim().is_empty() {
            return None;
        }
        next_id += 1;
        Some(
            InboundMessage::new(format!("line-{next_id}"), &user, &channel, line)
                .with_sender_name(&user),
        )
    })
}

/// Prints delivered messages and saves posted images to a directory.
pub struct ConsoleDelivery<W: Write + Send> {
    out: Mutex<W>,
    output_dir: PathBuf,
    next_id: AtomicU64,
}

impl<W: Write + Send> ConsoleDelivery<W> {
    pub fn new(out: W, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            out: Mutex::new(out),
            output_dir: output_dir.into(),
            next_id: AtomicU64::new(1),
        }
    }

    fn print(&self, line: &str) -> std::io::Result<()> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| std::io::Error::other("console writer poisoned"))?;
        writeln!(out, "{}", line)?;
        out.flush()
    }

    fn image_path(&self, handle: &MessageHandle, file_name: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}-{}", handle.message_id, file_name))
    }
}

#[async_trait]
impl<W: Write + Send> ChatDelivery for ConsoleDelivery<W> {
    fn name(&self) -> &str {
        "console"
    }

    async fn send(&self, message: OutboundMessage) -> Result<MessageHandle, DeliveryError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let handle = MessageHandle::new(&message.conversation_id, format!("console-{id}"));

        let mut line = format!("[{}] {}", handle.message_id, message.display_text());
        if let Some(image) = &message.image {
            let path = self.image_path(&handle, &image.file_name);
            tokio::fs::write(&path, &image.bytes)
                .await
                .map_err(|err| DeliveryError::Send(format!("{}: {}", path.display(), err)))?;
            line.push_str(&format!(" <image: {}>", path.display()));
        }

        self.print(line.trim_end())
            .map_err(|err| DeliveryError::Send(err.to_string()))?;
        Ok(handle)
    }

    async fn edit(
        &self,
        handle: &MessageHandle,
        text: &str,
    ) -> Result<MessageHandle, DeliveryError> {
        self.print(&format!("[{}] (edited) {}", handle.message_id, text))
            .map_err(|err| DeliveryError::Edit {
                handle: handle.clone(),
                reason: err.to_string(),
            })?;
        Ok(handle.clone())
    }

    async fn delete(&self, handle: &MessageHandle) -> Result<(), DeliveryError> {
        let mut removed = false;
        let mut entries = tokio::fs::read_dir(&self.output_dir).await.map_err(|err| {
            DeliveryError::Delete {
                handle: handle.clone(),
                reason: err.to_string(),
            }
        })?;
        let prefix = format!("{}-", handle.message_id);
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                removed |= tokio::fs::remove_file(entry.path()).await.is_ok();
            }
        }

        let suffix = if removed { " (image removed)" } else { "" };
        self.print(&format!("[{}] (deleted){}", handle.message_id, suffix))
            .map_err(|err| DeliveryError::Delete {
                handle: handle.clone(),
                reason: err.to_string(),
            })
    }
}
