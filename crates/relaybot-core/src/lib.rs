//! RelayBot Core - conversational relay between a chat platform and local
//! completion and image-synthesis services.
//!
//! This crate provides:
//! - Chat delivery contract, message types and a Discord REST adapter
//! - Conversation memory (continuation tokens and participant summaries)
//! - Reply directive parsing and verified image delivery
//! - The per-message dispatcher and message loop
//! - TOML + environment configuration

pub mod channel;
pub mod config;
pub mod memory;
pub mod runtime;

pub use channel::{
    ChatDelivery, DeliveryError, InboundAttachment, InboundMessage, MessageHandle,
    OutboundMessage,
};
pub use config::RelayConfig;
pub use memory::ConversationMemory;
pub use runtime::{ChatDispatcher, DispatchOutcome, ImageDeliveryMachine};
