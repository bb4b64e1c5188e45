//! Chat Delivery Trait Definitions
//!
//! Defines the outbound contract the runtime uses to post, edit and delete
//! messages on a chat platform.

use async_trait::async_trait;
use thiserror::Error;

use super::types::{MessageHandle, OutboundMessage};

/// Chat platform delivery failure
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("send failed: {0}")]
    Send(String),

    #[error("edit of {handle} failed: {reason}")]
    Edit {
        handle: MessageHandle,
        reason: String,
    },

    #[error("delete of {handle} failed: {reason}")]
    Delete {
        handle: MessageHandle,
        reason: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Outbound chat delivery
///
/// Every call is independently fallible; callers decide which failures abort
/// their work and which are only logged.
///
/// # Example
///
/// ```ignore
/// struct MyDelivery { /* ... */ }
///
/// #[async_trait]
/// impl ChatDelivery for MyDelivery {
///     fn name(&self) -> &str {
///         "my-platform"
///     }
///
///     async fn send(&self, message: OutboundMessage) -> Result<MessageHandle, DeliveryError> {
///         // Post via API and return the new message id
///     }
///
///     async fn edit(&self, handle: &MessageHandle, text: &str) -> Result<MessageHandle, DeliveryError> {
///         // Replace the text of an existing message
///     }
///
///     async fn delete(&self, handle: &MessageHandle) -> Result<(), DeliveryError> {
///         // Remove the message
///     }
/// }
/// ```
#[async_trait]
pub trait ChatDelivery: Send + Sync {
    /// Platform display name
    fn name(&self) -> &str;

    /// Post a new message, returning its handle
    async fn send(&self, message: OutboundMessage) -> Result<MessageHandle, DeliveryError>;

    /// Replace the text of a posted message
    async fn edit(&self, handle: &MessageHandle, text: &str)
    -> Result<MessageHandle, DeliveryError>;

    /// Remove a posted message
    async fn delete(&self, handle: &MessageHandle) -> Result<(), DeliveryError>;

    /// Send a simple text message
    async fn send_text(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<MessageHandle, DeliveryError> {
        self.send(OutboundMessage::text(conversation_id, text)).await
    }
}

/// Recording delivery for tests
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// One recorded delivery call
    #[derive(Debug, Clone, PartialEq)]
    pub enum DeliveryEvent {
        Sent {
            handle: MessageHandle,
            message: OutboundMessage,
        },
        SendFailed {
            message: OutboundMessage,
        },
        Edited {
            handle: MessageHandle,
            text: String,
        },
        Deleted {
            handle: MessageHandle,
        },
        DeleteFailed {
            handle: MessageHandle,
        },
    }

    /// A delivery that records every call and can be told to fail
    #[derive(Default)]
    pub struct MockDelivery {
        events: Arc<Mutex<Vec<DeliveryEvent>>>,
        send_calls: AtomicUsize,
        failing_sends: std::sync::Mutex<HashSet<usize>>,
        fail_deletes: AtomicBool,
        fail_edits: AtomicBool,
    }

    impl MockDelivery {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make the `n`-th send call (1-based) fail
        pub fn fail_send_number(self, n: usize) -> Self {
            if let Ok(mut failing) = self.failing_sends.lock() {
                failing.insert(n);
            }
            self
        }

        pub fn fail_deletes(self) -> Self {
            self.fail_deletes.store(true, Ordering::SeqCst);
            self
        }

        pub fn fail_edits(self) -> Self {
            self.fail_edits.store(true, Ordering::SeqCst);
            self
        }

        pub async fn events(&self) -> Vec<DeliveryEvent> {
            self.events.lock().await.clone()
        }

        /// Messages that were posted successfully
        pub async fn sent(&self) -> Vec<OutboundMessage> {
            self.events
                .lock()
                .await
                .iter()
                .filter_map(|event| match event {
                    DeliveryEvent::Sent { message, .. } => Some(message.clone()),
                    _ => None,
                })
                .collect()
        }

        /// Texts written by edits, in order
        pub async fn edits(&self) -> Vec<String> {
            self.events
                .lock()
                .await
                .iter()
                .filter_map(|event| match event {
                    DeliveryEvent::Edited { text, .. } => Some(text.clone()),
                    _ => None,
                })
                .collect()
        }

        /// Handles that were deleted successfully
        pub async fn deleted(&self) -> Vec<MessageHandle> {
            self.events
                .lock()
                .await
                .iter()
                .filter_map(|event| match event {
                    DeliveryEvent::Deleted { handle } => Some(handle.clone()),
                    _ => None,
                })
                .collect()
        }

        pub async fn image_posts(&self) -> usize {
            self.sent()
                .await
                .iter()
                .filter(|message| message.image.is_some())
                .count()
        }
    }

    #[async_trait]
    impl ChatDelivery for MockDelivery {
        fn name(&self) -> &str {
            "mock"
        }

        async fn send(&self, message: OutboundMessage) -> Result<MessageHandle, DeliveryError> {
            let number = self.send_calls.fetch_add(1, Ordering::SeqCst) + 1;
            let should_fail = self
                .failing_sends
                .lock()
                .map(|failing| failing.contains(&number))
                .unwrap_or(false);

            if should_fail {
                self.events
                    .lock()
                    .await
                    .push(DeliveryEvent::SendFailed { message });
                return Err(DeliveryError::Send(format!("mock send #{number} failed")));
            }

            let handle = MessageHandle::new(&message.conversation_id, format!("msg-{number}"));
            self.events.lock().await.push(DeliveryEvent::Sent {
                handle: handle.clone(),
                message,
            });
            Ok(handle)
        }

        async fn edit(
            &self,
            handle: &MessageHandle,
            text: &str,
        ) -> Result<MessageHandle, DeliveryError> {
            if self.fail_edits.load(Ordering::SeqCst) {
                return Err(DeliveryError::Edit {
                    handle: handle.clone(),
                    reason: "mock edit failure".to_string(),
                });
            }
            self.events.lock().await.push(DeliveryEvent::Edited {
                handle: handle.clone(),
                text: text.to_string(),
            });
            Ok(handle.clone())
        }

        async fn delete(&self, handle: &MessageHandle) -> Result<(), DeliveryError> {
            if self.fail_deletes.load(Ordering::SeqCst) {
                self.events.lock().await.push(DeliveryEvent::DeleteFailed {
                    handle: handle.clone(),
                });
                return Err(DeliveryError::Delete {
                    handle: handle.clone(),
                    reason: "mock delete failure".to_string(),
                });
            }
            self.events.lock().await.push(DeliveryEvent::Deleted {
                handle: handle.clone(),
            });
            Ok(())
        }
    }
}
