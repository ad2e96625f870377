use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewAction {
    Approved,
    Rejected,
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewAction::Approved => f.write_str("approved"),
            ReviewAction::Rejected => f.write_str("rejected"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewEntry {
    pub reviewed_at: DateTime<Utc>,
    pub action: ReviewAction,
    pub comments: String,
    pub reviewer_id: String,
    pub reviewer_name: String,
}

/// Append-only review history in chronological order.
///
/// There is deliberately no way to edit or remove an entry once appended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewLedger {
    entries: Vec<ReviewEntry>,
}

impl ReviewLedger {
    pub fn append(&mut self, entry: ReviewEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ReviewEntry] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&ReviewEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, action: ReviewAction) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.action == action)
            .count()
    }
}
