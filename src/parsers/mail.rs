//! Mailbox (`messages.php`) and message (`message.php`) parsers.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::Selector;

use super::{ParseResult, document, next_sibling_text, selector, text_of};
use crate::error::ParseError;
use crate::models::{MailMessage, MailboxRow};
use crate::utils::query_param;
use crate::utils::time::parse_log_time;

static CARD_HEADER: LazyLock<Selector> = LazyLock::new(|| selector("div.card-header"));
static CARD_INNER: LazyLock<Selector> = LazyLock::new(|| selector("div.card-content-inner"));
static LINK: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));
static INBOX: LazyLock<Selector> = LazyLock::new(|| selector("#inbox"));
static INBOX_ROW: LazyLock<Selector> = LazyLock::new(|| selector("a.item-link"));
static ITEM_TITLE: LazyLock<Selector> = LazyLock::new(|| selector(".item-title"));

static PROFILE_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^profile\.php\?").expect("valid regex"));
static TIMESTAMP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"on (.+? [AP]M)(\s|$)").expect("valid regex"));

/// Parse a single mail page. `id` comes from the mailbox row it was opened from.
pub fn parse_message(id: u64, content: &[u8], now: DateTime<Utc>) -> ParseResult<MailMessage> {
    let html = document(content);
    let fail = |message: String| ParseError::new(message, content);

    let title = html
        .select(&CARD_HEADER)
        .next()
        .ok_or_else(|| fail("Unable to find title element".into()))?;

    let inners: Vec<_> = html.select(&CARD_INNER).collect();
    let [body, meta] = inners[..] else {
        return Err(fail(format!("Wrong number of card inners: {}", inners.len())));
    };

    let profile_link = meta
        .select(&LINK)
        .find(|a| {
            a.value()
                .attr("href")
                .is_some_and(|href| PROFILE_LINK_RE.is_match(href))
        })
        .ok_or_else(|| fail("Unable to find profile link".into()))?;
    let href = profile_link.value().attr("href").unwrap_or_default();
    let username = query_param(href, "user_name")
        .ok_or_else(|| fail(format!("Profile link has no user_name: {href:?}")))?;

    let ts_text =
        next_sibling_text(profile_link).ok_or_else(|| fail("Unable to find timestamp".into()))?;
    let ts_match = TIMESTAMP_RE
        .captures(&ts_text)
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| fail(format!("Unable to parse timestamp: {ts_text:?}")))?;
    let timestamp = parse_log_time(ts_match.as_str(), now)
        .ok_or_else(|| fail(format!("Invalid timestamp: {:?}", ts_match.as_str())))?;

    Ok(MailMessage {
        id,
        username,
        timestamp,
        subject: text_of(title),
        content: body.inner_html(),
    })
}

/// Parse the mailbox listing. Bold titles mark unread mail.
pub fn parse_mailbox(content: &[u8]) -> ParseResult<Vec<MailboxRow>> {
    let html = document(content);
    let fail = |message: String| ParseError::new(message, content);

    let inbox = html
        .select(&INBOX)
        .next()
        .ok_or_else(|| fail("Unable to find inbox".into()))?;

    inbox
        .select(&INBOX_ROW)
        .map(|row| {
            let title = row
                .select(&ITEM_TITLE)
                .next()
                .ok_or_else(|| fail("Unable to find title element".into()))?;
            let href = row.value().attr("href").unwrap_or_default();
            let id = query_param(href, "id")
                .and_then(|id| id.parse().ok())
                .ok_or_else(|| fail(format!("Unable to parse message id from {href:?}")))?;
            let unread = title
                .value()
                .attr("style")
                .is_some_and(|style| style.contains("bold"));
            Ok(MailboxRow { id, unread })
        })
        .collect()
}
