//! Memory system for chat conversations
//!
//! - **Short-term**: one continuation token per channel, threaded through
//!   every completion call and swapped after each successful turn.
//! - **Long-term**: one rolling log per participant; once more than
//!   `summary_threshold` entries sit behind the watermark, they are folded
//!   into a free-text summary by a dedicated summarizer model.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   ConversationMemory                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  channels:     KeyedStore<ChannelState>                      │
//! │                └ token: [0] seed → replaced each turn        │
//! │                                                              │
//! │  participants: KeyedStore<ParticipantMemory>                 │
//! │                └ log ─────────────┬──────────── pending      │
//! │                        watermark ─┘   > threshold → summary  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each key has its own async lock, so updates to one channel or one
//! participant are serialized while unrelated keys proceed concurrently.

mod conversation;
mod keyed;
mod participant;
mod summary;

pub use conversation::{ChannelLease, ConversationMemory, DEFAULT_SUMMARY_THRESHOLD};
pub use keyed::KeyedStore;
pub use participant::{MemoryEntry, ParticipantMemory};
pub use summary::{SUMMARY_PROMPT, Summarizer, build_summary_prompt, render_entries};
