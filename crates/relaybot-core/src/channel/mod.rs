//! Chat Channel Layer
//!
//! Platform-agnostic outbound delivery for RelayBot. The runtime only sees
//! the [`ChatDelivery`] trait; adapters translate it to a platform API.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │     ChatDispatcher / DeliveryMachine    │
//! └─────────────────────────────────────────┘
//!              │
//!              ▼
//! ┌─────────────────────────────────────────┐
//! │         trait ChatDelivery              │
//! │  - send(message) -> MessageHandle       │
//! │  - edit(handle, text)                   │
//! │  - delete(handle)                       │
//! └─────────────────────────────────────────┘
//!              │
//!       ┌──────┴──────┐
//!       ▼             ▼
//!   Discord       (console, mock)
//! ```

pub mod discord;
mod traits;
mod types;

pub use discord::{DiscordConfig, DiscordDelivery};
pub use traits::{ChatDelivery, DeliveryError};
pub use types::{
    IMAGE_FILE_NAME, ImageAttachment, InboundAttachment, InboundMessage, MessageHandle,
    OutboundMessage,
};

#[cfg(any(test, feature = "test-utils"))]
pub use traits::mock;
