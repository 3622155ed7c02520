//! Flags view parser (`log.php?type=chat&flag=1`).
//!
//! The report list carries no message id, so one is synthesized from the
//! visible text. It only correlates records between consecutive polls and
//! changes if the site changes how it renders any of those fields.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::Selector;
use sha2::{Digest, Sha256};

use super::{ParseResult, document, selector, stripped_strings, text_of};
use crate::error::ParseError;
use crate::models::ChatMessage;
use crate::utils::time::parse_log_time;

static ROW: LazyLock<Selector> = LazyLock::new(|| selector("li"));
static ITEM_TITLE: LazyLock<Selector> = LazyLock::new(|| selector(".item-title"));
static ITEM_AFTER: LazyLock<Selector> = LazyLock::new(|| selector(".item-after"));

static FLAGS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+) flags?$").expect("valid regex"));

const ID_HEX_LEN: usize = 16;
const FIELD_SEPARATOR: &str = "\u{1f}";

/// Build the correlation id for a flags row from its visible text fields.
pub fn flags_message_id(parts: &[String]) -> String {
    let digest = Sha256::digest(parts.join(FIELD_SEPARATOR).as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(ID_HEX_LEN);
    id
}

/// Parse the flagged-message report list, in page order.
pub fn parse_flags(room: &str, content: &[u8], now: DateTime<Utc>) -> ParseResult<Vec<ChatMessage>> {
    let html = document(content);
    let fail = |message: String| ParseError::new(message, content);

    let mut messages = Vec::new();
    for row in html.select(&ROW) {
        let title = row
            .select(&ITEM_TITLE)
            .next()
            .ok_or_else(|| fail("Unable to find item title".into()))?;
        let after = row
            .select(&ITEM_AFTER)
            .next()
            .ok_or_else(|| fail("Unable to find item after".into()))?;

        // timestamp, username, ": message..."
        let parts = stripped_strings(title);
        if parts.len() < 3 {
            return Err(fail(format!("Expected 3 title fields, found {parts:?}")));
        }
        let timestamp = parse_log_time(&parts[0], now)
            .ok_or_else(|| fail(format!("Unable to parse timestamp: {:?}", parts[0])))?;

        let flag_count = FLAGS_RE
            .captures(&text_of(after))
            .and_then(|caps| caps[1].parse().ok())
            .unwrap_or(0);

        // Drop the ": " separator in front of the message text.
        let content: String = parts[2..].join(" ").chars().skip(2).collect();

        messages.push(ChatMessage {
            room: room.to_string(),
            id: flags_message_id(&parts),
            timestamp,
            emblem: String::new(),
            username: parts[1].clone(),
            content,
            flag_count,
            deleted: false,
            deleted_at: None,
        });
    }
    Ok(messages)
}
