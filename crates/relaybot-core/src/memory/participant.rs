//! Per-participant long-term memory record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observed message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub speaker: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Rolling log plus summary for one participant.
///
/// `watermark` counts the leading log entries already folded into `summary`
/// and never exceeds the log length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticipantMemory {
    entries: Vec<MemoryEntry>,
    summary: String,
    watermark: usize,
}

impl ParticipantMemory {
    pub fn push(&mut self, entry: MemoryEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[MemoryEntry] {
        &self.entries
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn watermark(&self) -> usize {
        self.watermark
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries not yet folded into the summary
    pub fn pending(&self) -> &[MemoryEntry] {
        &self.entries[self.watermark..]
    }

    /// Replace the summary and mark `folded` entries as covered by it.
    pub(crate) fn apply_summary(&mut self, summary: String, folded: usize) {
        self.summary = summary;
        self.watermark = folded.min(self.entries.len());
    }
}
