//! Per-room change detection between consecutive polls.
//!
//! Each poll re-fetches the trailing window of a room. Comparing it against
//! the previous window is what surfaces edits and moderator deletions, which
//! a cursor over new ids alone would never see. Anything that scrolls out of
//! the window is forgotten.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ChatMessage;

/// How a record differs from the previous poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Not in the previous window
    Added,
    /// Some field changed (flag count, content, deleted flag)
    Updated,
    /// Deletion observed for the first time in this poll
    Deleted,
}

/// A record to emit, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub kind: ChangeKind,
    pub message: ChatMessage,
}

/// Outcome of one poll, changes in chronological order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffResult {
    pub changes: Vec<Change>,
    /// Records identical to the previous poll
    pub unchanged: usize,
}

impl DiffResult {
    /// Check if there are any changes.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Get the total number of changes.
    pub fn change_count(&self) -> usize {
        self.changes.len()
    }

    /// Number of changes of one kind.
    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind == kind).count()
    }

    /// The changed records, oldest first.
    pub fn into_messages(self) -> Vec<ChatMessage> {
        self.changes.into_iter().map(|c| c.message).collect()
    }
}

/// Last-seen window of one room, owned by a single scraper.
///
/// Two maps are kept and swapped each poll: one holds the previous window
/// while the other is refilled with the current one.
#[derive(Debug, Default)]
pub struct RoomScrapeState {
    windows: [HashMap<String, ChatMessage>; 2],
    current: usize,
}

impl RoomScrapeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records from the most recent poll, by id.
    pub fn last(&self) -> &HashMap<String, ChatMessage> {
        &self.windows[self.current]
    }

    pub fn get(&self, id: &str) -> Option<&ChatMessage> {
        self.last().get(id)
    }

    pub fn len(&self) -> usize {
        self.last().len()
    }

    pub fn is_empty(&self) -> bool {
        self.last().is_empty()
    }

    /// Diff a freshly parsed batch (newest first, as served) against the
    /// previous window, stamp deletions with `now`, and make the batch the
    /// new window.
    pub fn apply(&mut self, batch: Vec<ChatMessage>, now: DateTime<Utc>) -> DiffResult {
        let [first, second] = &mut self.windows;
        let (last, next) = if self.current == 0 {
            (&*first, second)
        } else {
            (&*second, first)
        };
        next.clear();

        let mut result = DiffResult::default();
        for mut message in batch.into_iter().rev() {
            let kind = match last.get(&message.id) {
                None => Some(ChangeKind::Added),
                Some(old) => {
                    let mut kind = ChangeKind::Updated;
                    if let Some(deleted_at) = old.deleted_at {
                        message.deleted_at = Some(deleted_at);
                    } else if !old.deleted && message.deleted {
                        message.deleted_at = Some(now);
                        kind = ChangeKind::Deleted;
                    }
                    (message != *old).then_some(kind)
                }
            };

            match kind {
                Some(kind) => result.changes.push(Change {
                    kind,
                    message: message.clone(),
                }),
                None => result.unchanged += 1,
            }
            next.insert(message.id.clone(), message);
        }

        self.current = 1 - self.current;
        result
    }
}
