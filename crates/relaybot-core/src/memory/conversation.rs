//! Conversation memory: per-channel continuation tokens and per-participant
//! rolling logs.

use chrono::{DateTime, Utc};
use relaybot_ai::ContinuationToken;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use super::keyed::KeyedStore;
use super::participant::{MemoryEntry, ParticipantMemory};
use super::summary::Summarizer;

/// Default number of unsummarized entries tolerated per participant.
pub const DEFAULT_SUMMARY_THRESHOLD: usize = 20;

#[derive(Debug, Clone, Default)]
struct ChannelState {
    token: Option<ContinuationToken>,
}

/// Exclusive access to one channel's continuation token.
///
/// Hold the lease across read → completion → write so concurrent messages in
/// the same channel cannot overwrite each other's token.
pub struct ChannelLease {
    guard: OwnedMutexGuard<ChannelState>,
}

impl ChannelLease {
    /// Current token, or the seed if the channel has never completed a turn
    pub fn token(&self) -> ContinuationToken {
        self.guard
            .token
            .clone()
            .unwrap_or_else(ContinuationToken::seed)
    }

    pub fn set_token(&mut self, token: ContinuationToken) {
        self.guard.token = Some(token);
    }
}

/// Short-term and long-term conversational memory.
pub struct ConversationMemory {
    channels: KeyedStore<ChannelState>,
    participants: KeyedStore<ParticipantMemory>,
    summarizer: Summarizer,
    summary_threshold: usize,
}

impl ConversationMemory {
    pub fn new(summarizer: Summarizer) -> Self {
        Self {
            channels: KeyedStore::new(),
            participants: KeyedStore::new(),
            summarizer,
            summary_threshold: DEFAULT_SUMMARY_THRESHOLD,
        }
    }

    pub fn with_summary_threshold(mut self, threshold: usize) -> Self {
        self.summary_threshold = threshold;
        self
    }

    pub fn summary_threshold(&self) -> usize {
        self.summary_threshold
    }

    /// Stored token for `channel_id`, or the seed if unseen
    pub async fn get_channel_token(&self, channel_id: &str) -> ContinuationToken {
        self.channels
            .get_cloned(channel_id)
            .await
            .and_then(|state| state.token)
            .unwrap_or_else(ContinuationToken::seed)
    }

    /// Replace the stored token unconditionally
    pub async fn set_channel_token(&self, channel_id: &str, token: ContinuationToken) {
        self.lease_channel(channel_id).await.set_token(token);
    }

    /// Take exclusive access to a channel's token
    pub async fn lease_channel(&self, channel_id: &str) -> ChannelLease {
        ChannelLease {
            guard: self.channels.lock(channel_id).await,
        }
    }

    /// Append a message to the participant's log, summarizing when the
    /// unsummarized backlog exceeds the threshold.
    ///
    /// Summarization failures are logged and leave the record untouched.
    pub async fn record_participant_message(
        &self,
        participant_id: &str,
        display_name: &str,
        text: &str,
        timestamp: DateTime<Utc>,
    ) {
        let mut memory = self.participants.lock(participant_id).await;
        memory.push(MemoryEntry {
            speaker: display_name.to_string(),
            text: text.to_string(),
            timestamp,
        });

        let pending = memory.pending().len();
        if pending <= self.summary_threshold {
            return;
        }

        let folded = memory.len();
        debug!(
            participant_id,
            pending,
            model = self.summarizer.model(),
            "Summarizing participant memory"
        );

        let result = self
            .summarizer
            .summarize(memory.summary(), memory.pending())
            .await;
        match result {
            Ok(summary) => {
                memory.apply_summary(summary, folded);
                info!(participant_id, watermark = folded, "Participant summary updated");
            }
            Err(err) => {
                warn!(
                    participant_id,
                    pending, "Summarization failed, will retry on next message: {}", err
                );
            }
        }
    }

    /// Current summary, or empty if none
    pub async fn get_participant_summary(&self, participant_id: &str) -> String {
        self.participants
            .get_cloned(participant_id)
            .await
            .map(|memory| memory.summary().to_string())
            .unwrap_or_default()
    }

    /// Copy of a participant's record
    pub async fn participant_snapshot(&self, participant_id: &str) -> Option<ParticipantMemory> {
        self.participants.get_cloned(participant_id).await
    }
}
