//! Chat message data structure.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat line scraped from a room, either from the live chat or the flags view.
///
/// Serialized names follow the persisted `message` table columns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// Room name
    pub room: String,

    /// Room-scoped id (synthetic for the flags view)
    pub id: String,

    /// When the line was posted
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,

    /// Emblem image file name (empty in the flags view)
    pub emblem: String,

    pub username: String,

    /// Raw HTML fragment
    pub content: String,

    #[serde(rename = "flags", default)]
    pub flag_count: u32,

    #[serde(default)]
    pub deleted: bool,

    /// First poll that saw this message deleted
    #[serde(rename = "deleted_ts", default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ChatMessage {
    /// Create a live, unflagged message.
    pub fn new(
        room: impl Into<String>,
        id: impl Into<String>,
        timestamp: DateTime<Utc>,
        username: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            room: room.into(),
            id: id.into(),
            timestamp,
            emblem: String::new(),
            username: username.into(),
            content: content.into(),
            flag_count: 0,
            deleted: false,
            deleted_at: None,
        }
    }
}

impl fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.deleted {
            write!(f, "{} | DELETED {}: {}", self.room, self.username, self.content)
        } else {
            write!(f, "{} | {}: {}", self.room, self.username, self.content)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> ChatMessage {
        ChatMessage::new(
            "help",
            "5364278",
            Utc.with_ymd_and_hms(2022, 4, 17, 1, 44, 56).unwrap(),
            "Nubishi",
            "hello",
        )
    }

    #[test]
    fn test_display() {
        let mut msg = sample();
        assert_eq!(msg.to_string(), "help | Nubishi: hello");
        msg.deleted = true;
        assert_eq!(msg.to_string(), "help | DELETED Nubishi: hello");
    }

    #[test]
    fn test_serialized_column_names() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["ts"], "2022-04-17T01:44:56Z");
        assert_eq!(value["flags"], 0);
        assert!(value["deleted_ts"].is_null());
        assert!(value.get("timestamp").is_none());
    }
}
