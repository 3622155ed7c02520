//! Mailbox data structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single in-game mail, immutable once parsed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MailMessage {
    pub id: u64,
    /// Sender
    pub username: String,
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    pub subject: String,
    /// Body as HTML
    pub content: String,
}

/// One row of the mailbox listing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MailboxRow {
    pub id: u64,
    pub unread: bool,
}
