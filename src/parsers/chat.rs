//! Live chat parser (`worker.php?go=getchat`).

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::Selector;

use super::{ParseResult, document, next_in_scope, next_sibling_named, selector, text_of};
use crate::error::ParseError;
use crate::models::ChatMessage;
use crate::utils::time::parse_chat_time;

static CHAT_LINE: LazyLock<Selector> = LazyLock::new(|| selector("div.chat-txt"));
static SPAN: LazyLock<Selector> = LazyLock::new(|| selector("span"));
static CHIP: LazyLock<Selector> = LazyLock::new(|| selector("div.chip"));
static EMBLEM: LazyLock<Selector> = LazyLock::new(|| selector("div.chip-media img"));
static ICONS: LazyLock<Selector> = LazyLock::new(|| selector("i.f7-icons"));

static MESSAGE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^javascript:(?:un)?delChat\((\d+)\)$").expect("valid regex"));
static FORCEPATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<strong>\w+path</strong>").expect("valid regex"));
static AT_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"<a class="close-panel" href="profile\.php\?user_name=[^">]+" style="color:teal">(@[^">]+)</a>"#,
    )
    .expect("valid regex")
});

/// Class marking a line the moderators removed.
const DELETED_CLASS: &str = "redstripes";

/// Parse a chat page into messages, newest first as served.
pub fn parse_chat(room: &str, content: &[u8], now: DateTime<Utc>) -> ParseResult<Vec<ChatMessage>> {
    let html = document(content);
    let fail = |message: String| ParseError::new(message, content);

    let mut messages = Vec::new();
    for line in html.select(&CHAT_LINE) {
        let ts_elem = line
            .select(&SPAN)
            .next()
            .ok_or_else(|| fail("Unable to find timestamp".into()))?;
        let ts_text = text_of(ts_elem);
        let timestamp = parse_chat_time(&ts_text, now)
            .ok_or_else(|| fail(format!("Unable to parse timestamp: {ts_text:?}")))?;

        let chip = line
            .select(&CHIP)
            .next()
            .ok_or_else(|| fail("Unable to find chip".into()))?;
        let id_link = next_sibling_named(chip, "a")
            .ok_or_else(|| fail("Unable to find message ID link".into()))?;
        let href = id_link.value().attr("href").unwrap_or_default();
        let id = MESSAGE_ID_RE
            .captures(href)
            .and_then(|caps| caps.get(1))
            .ok_or_else(|| fail(format!("Unable to parse message ID: {href:?}")))?
            .as_str()
            .to_string();

        let emblem_img = line
            .select(&EMBLEM)
            .next()
            .ok_or_else(|| fail("Unable to find emblem".into()))?;
        let emblem_src = emblem_img
            .value()
            .attr("src")
            .ok_or_else(|| fail("Emblem has no src".into()))?;
        let username = emblem_img
            .value()
            .attr("data-username")
            .ok_or_else(|| fail("Emblem has no data-username".into()))?;

        let icons = line
            .select(&ICONS)
            .next()
            .ok_or_else(|| fail("Unable to find icons".into()))?;
        let content_elem = next_in_scope(line, icons, "span")
            .ok_or_else(|| fail("Unable to find content span".into()))?;

        messages.push(ChatMessage {
            room: room.to_string(),
            id,
            timestamp,
            emblem: emblem_src.rsplit('/').next().unwrap_or_default().to_string(),
            username: username.to_string(),
            content: clean_content(&content_elem.inner_html()),
            flag_count: 0,
            deleted: line.value().classes().any(|c| c == DELETED_CLASS),
            deleted_at: None,
        });
    }
    Ok(messages)
}

/// Rewrite rendering artifacts: path-ability placeholders and mention links.
fn clean_content(html: &str) -> String {
    let html = FORCEPATH_RE.replace_all(html, "<strong>Forcepath</strong>");
    AT_LINK_RE.replace_all(&html, "$1:").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn frozen_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 4, 17, 23, 59, 59).unwrap()
    }

    fn chat_line(class: &str, time: &str, id: &str, emblem: &str, user: &str, body: &str) -> String {
        format!(
            r#"<div class="{class}" style="padding:5px">
  <span style="font-size:11px;color:#999">{time}</span><br>
  <div class="chip"><div class="chip-media"><img src="/img/emblems/{emblem}" data-username="{user}" class="emblem"></div><div class="chip-label">{user}</div></div>
  <a href="javascript:delChat({id})" class="delchat">x</a>
  <i class="f7-icons" style="font-size:12px">chat_bubble</i>
  <span>{body}</span>
</div>"#
        )
    }

    fn page(lines: &[String]) -> Vec<u8> {
        format!("<html><body>{}</body></html>", lines.join("\n")).into_bytes()
    }

    const TESTING_BODY: &str = r#"Testing some chat things, <a class="close-panel" href="item.php?id=48"><img class="itemimgsm" src="/img/items/potato.png"></a>"#;

    fn complex_chat() -> Vec<u8> {
        page(&[
            chat_line(
                "chat-txt",
                "8:28:15 PM",
                "5363775",
                "Octopus96.png",
                "coderanger",
                r#"<i style="color:teal">coderanger also testing this</i>"#,
            ),
            chat_line(
                "chat-txt",
                "8:27:32 PM",
                "5363757",
                "Octopus96.png",
                "coderanger",
                TESTING_BODY,
            ),
        ])
    }

    #[test]
    fn test_parse_complex_chat() {
        let chats = parse_chat("global", &complex_chat(), frozen_now()).unwrap();
        assert_eq!(chats.len(), 2);

        assert_eq!(chats[0].room, "global");
        assert_eq!(chats[0].id, "5363775");
        assert_eq!(chats[0].timestamp, Utc.with_ymd_and_hms(2022, 4, 17, 1, 28, 15).unwrap());
        assert_eq!(chats[0].username, "coderanger");
        assert_eq!(chats[0].emblem, "Octopus96.png");
        assert_eq!(chats[0].content, r#"<i style="color:teal">coderanger also testing this</i>"#);
        assert!(!chats[0].deleted);

        assert_eq!(chats[1].id, "5363757");
        assert_eq!(chats[1].timestamp, Utc.with_ymd_and_hms(2022, 4, 17, 1, 27, 32).unwrap());
        assert_eq!(chats[1].content, TESTING_BODY);
        assert!(!chats[1].deleted);
        assert!(chats.iter().all(|m| m.deleted_at.is_none() && m.flag_count == 0));
    }

    #[test]
    fn test_parse_keeps_document_order() {
        let lines: Vec<String> = (0..5)
            .map(|i| {
                chat_line(
                    "chat-txt",
                    &format!("6:{:02}:00 PM", 50 - i),
                    &format!("{}", 100 - i),
                    "def.png",
                    "Nubishi",
                    &format!("line {i}"),
                )
            })
            .collect();
        let chats = parse_chat("help", &page(&lines), frozen_now()).unwrap();
        let ids: Vec<&str> = chats.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["100", "99", "98", "97", "96"]);
        assert_eq!(chats[4].content, "line 4");
    }

    #[test]
    fn test_parse_deleted() {
        let body = page(&[chat_line(
            "chat-txt redstripes",
            "9:08:22 PM",
            "5365014",
            "Octopus96.png",
            "coderanger",
            "A message so I can delete it.",
        )]);
        let chats = parse_chat("", &body, frozen_now()).unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].timestamp, Utc.with_ymd_and_hms(2022, 4, 17, 2, 8, 22).unwrap());
        assert!(chats[0].deleted);
        assert!(chats[0].deleted_at.is_none());
    }

    #[test]
    fn test_undelete_link_id() {
        let line = chat_line("chat-txt redstripes", "1:00:00 PM", "42", "def.png", "a", "x")
            .replace("javascript:delChat(42)", "javascript:undelChat(42)");
        let chats = parse_chat("", &page(&[line]), frozen_now()).unwrap();
        assert_eq!(chats[0].id, "42");
    }

    #[test]
    fn test_rewrites_mentions_and_forcepath() {
        let body = page(&[chat_line(
            "chat-txt",
            "9:13:50 PM",
            "5365182",
            "StrangeEgg96.png",
            "Ffff",
            r#"<a class="close-panel" href="profile.php?user_name=coderanger" style="color:teal">@coderanger</a> Parse this! <strong>Xpath</strong>"#,
        )]);
        let chats = parse_chat("", &body, frozen_now()).unwrap();
        assert_eq!(
            chats[0].content,
            "@coderanger: Parse this! <strong>Forcepath</strong>"
        );
        assert_eq!(chats[0].emblem, "StrangeEgg96.png");
        assert_eq!(chats[0].username, "Ffff");
    }

    #[test]
    fn test_empty_page_has_no_messages() {
        let chats = parse_chat("help", b"<html><body></body></html>", frozen_now()).unwrap();
        assert!(chats.is_empty());
    }

    #[test]
    fn test_missing_chip_is_error() {
        let line = chat_line("chat-txt", "1:00:00 PM", "42", "def.png", "a", "x")
            .replace(r#"class="chip""#, r#"class="nochip""#);
        let err = parse_chat("", &page(&[line]), frozen_now()).unwrap_err();
        assert!(err.message.contains("chip"));
        assert!(err.content.contains("delChat(42)"));
    }

    #[test]
    fn test_bad_message_link_is_error() {
        let line = chat_line("chat-txt", "1:00:00 PM", "42", "def.png", "a", "x")
            .replace("javascript:delChat(42)", "profile.php");
        let err = parse_chat("", &page(&[line]), frozen_now()).unwrap_err();
        assert!(err.message.contains("message ID"));
    }

    #[test]
    fn test_bad_timestamp_is_error() {
        let line = chat_line("chat-txt", "teatime", "42", "def.png", "a", "x");
        assert!(parse_chat("", &page(&[line]), frozen_now()).is_err());
    }
}
