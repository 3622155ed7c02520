// src/services/chat.rs

//! Chat room scraper.
//!
//! One instance per room and view. It owns the room's last-seen window, so
//! each instance must be driven by a single task.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::events::{Event, EventHub, Topic};
use crate::models::ChatMessage;
use crate::parsers::{parse_chat, parse_flags};
use crate::pipeline::diff::{DiffResult, RoomScrapeState};
use crate::pipeline::schedule::Job;
use crate::utils::http::Fetcher;

/// Body the site serves instead of a page when the session may not read a room.
const NO_ACCESS: &[u8] = b"no access";

/// Which page of a room to scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatView {
    /// Live chat (`worker.php?go=getchat`)
    Messages,
    /// Moderation report of flagged lines (`log.php?type=chat&flag=1`)
    Flags,
}

impl ChatView {
    pub fn topic(&self, room: &str) -> Topic {
        match self {
            Self::Messages => Topic::chat(room),
            Self::Flags => Topic::flags(room),
        }
    }

    fn event(&self, message: ChatMessage) -> Event {
        match self {
            Self::Messages => Event::Chat(message),
            Self::Flags => Event::Flags(message),
        }
    }
}

impl fmt::Display for ChatView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Messages => f.write_str("chat"),
            Self::Flags => f.write_str("flags"),
        }
    }
}

/// Polls one view of one room and emits new or changed lines.
pub struct ChatScraper {
    room: String,
    view: ChatView,
    fetcher: Arc<dyn Fetcher>,
    hub: EventHub,
    state: RoomScrapeState,
}

impl ChatScraper {
    pub fn new(
        room: impl Into<String>,
        view: ChatView,
        fetcher: Arc<dyn Fetcher>,
        hub: EventHub,
    ) -> Self {
        Self {
            room: room.into(),
            view,
            fetcher,
            hub,
            state: RoomScrapeState::new(),
        }
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn view(&self) -> ChatView {
        self.view
    }

    pub fn state(&self) -> &RoomScrapeState {
        &self.state
    }

    /// Fetch the page. `None` means a transient refusal that should skip
    /// this cycle.
    async fn fetch(&self, now: DateTime<Utc>) -> Result<Option<Vec<u8>>> {
        let response = match self.view {
            ChatView::Messages => {
                let query = [
                    ("go", "getchat".to_string()),
                    ("room", self.room.clone()),
                    ("cachebuster", now.timestamp_millis().to_string()),
                ];
                self.fetcher.get("worker.php", &query).await?
            }
            ChatView::Flags => {
                let query = [
                    ("type", "chat".to_string()),
                    ("room", self.room.clone()),
                    ("flag", "1".to_string()),
                ];
                self.fetcher.get("log.php", &query).await?
            }
        };

        if !response.is_success() {
            log::warn!(
                "Got status {} scraping {} view of room {}",
                response.status,
                self.view,
                self.room
            );
            return Ok(None);
        }
        if response.body == NO_ACCESS {
            log::warn!("Got 'no access' scraping {} view of room {}", self.view, self.room);
            return Ok(None);
        }
        Ok(Some(response.body))
    }

    /// Run one fetch, parse, diff and emit cycle.
    ///
    /// A skipped cycle returns an empty result and leaves the window as it
    /// was. A parse error also leaves it untouched and emits nothing.
    pub async fn scrape_once(&mut self, now: DateTime<Utc>) -> Result<DiffResult> {
        log::debug!("Starting {} scrape of room {}", self.view, self.room);
        let Some(body) = self.fetch(now).await? else {
            return Ok(DiffResult::default());
        };

        let messages = match self.view {
            ChatView::Messages => parse_chat(&self.room, &body, now)?,
            ChatView::Flags => parse_flags(&self.room, &body, now)?,
        };

        let result = self.state.apply(messages, now);
        let topic = self.view.topic(&self.room);
        for change in &result.changes {
            log::debug!(
                "Emitting {:?} {} message {} in room {}",
                change.kind,
                self.view,
                change.message.id,
                self.room
            );
            self.hub.emit(&topic, self.view.event(change.message.clone()));
        }

        log::debug!(
            "Finished {} scrape of room {}: {} changed, {} unchanged",
            self.view,
            self.room,
            result.change_count(),
            result.unchanged
        );
        Ok(result)
    }
}

#[async_trait]
impl Job for ChatScraper {
    async fn run(&mut self) -> Result<()> {
        self.scrape_once(Utc::now()).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::TimeZone;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use crate::error::AppError;
    use crate::pipeline::diff::ChangeKind;
    use crate::utils::http::Response;
    use crate::utils::http::stub::StubFetcher;

    fn line(id: u32, time: &str, class: &str) -> String {
        format!(
            r#"<div class="{class}"><span>{time}</span><br>
<div class="chip"><div class="chip-media"><img src="/img/emblems/def.png" data-username="Ffff"></div></div>
<a href="javascript:delChat({id})">x</a><i class="f7-icons">chat_bubble</i><span>line {id}</span></div>"#
        )
    }

    fn page(deleted: bool) -> Response {
        let second = if deleted { "chat-txt redstripes" } else { "chat-txt" };
        Response::ok(format!(
            "{}{}",
            line(2, "8:28:15 PM", "chat-txt"),
            line(1, "8:27:32 PM", second)
        ))
    }

    fn frozen_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 4, 17, 23, 59, 59).unwrap()
    }

    fn listen(hub: &EventHub, pattern: Topic) -> mpsc::UnboundedReceiver<ChatMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        hub.on(&pattern, move |_, event| {
            let tx = tx.clone();
            async move {
                if let Some(msg) = event.chat_message() {
                    let _ = tx.send(msg.clone());
                }
                Ok(())
            }
        });
        rx
    }

    async fn received(rx: &mut mpsc::UnboundedReceiver<ChatMessage>) -> Vec<String> {
        let mut ids = Vec::new();
        while let Ok(Some(msg)) = timeout(Duration::from_millis(50), rx.recv()).await {
            ids.push(msg.id);
        }
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn test_scrape_emits_changes_only() {
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.push("worker.php", page(false)).push("worker.php", page(true));
        let hub = EventHub::new(4);
        let mut rx = listen(&hub, Topic::chat("help"));

        let mut scraper = ChatScraper::new("help", ChatView::Messages, fetcher.clone(), hub);
        let first = scraper.scrape_once(frozen_now()).await.unwrap();
        assert_eq!(first.count(ChangeKind::Added), 2);
        assert_eq!(received(&mut rx).await, vec!["1", "2"]);

        let second = scraper.scrape_once(frozen_now()).await.unwrap();
        assert_eq!(second.change_count(), 1);
        assert_eq!(second.changes[0].kind, ChangeKind::Deleted);
        assert_eq!(second.changes[0].message.deleted_at, Some(frozen_now()));
        assert_eq!(received(&mut rx).await, vec!["1"]);

        // The stub repeats the last page: nothing new.
        let third = scraper.scrape_once(frozen_now()).await.unwrap();
        assert!(!third.has_changes());
        assert!(received(&mut rx).await.is_empty());

        let request = &fetcher.requests()[0];
        assert_eq!(request.param("go"), Some("getchat"));
        assert_eq!(request.param("room"), Some("help"));
        assert!(request.param("cachebuster").is_some());
    }

    #[tokio::test]
    async fn test_transient_failures_skip_cycle() {
        let fetcher = Arc::new(StubFetcher::new());
        fetcher
            .push("worker.php", page(false))
            .push("worker.php", Response { status: 502, body: Vec::new() })
            .push("worker.php", Response::ok("no access"));
        let hub = EventHub::new(4);
        let mut scraper = ChatScraper::new("global", ChatView::Messages, fetcher, hub);

        scraper.scrape_once(frozen_now()).await.unwrap();
        assert_eq!(scraper.state().len(), 2);

        for _ in 0..2 {
            let result = scraper.scrape_once(frozen_now()).await.unwrap();
            assert!(!result.has_changes());
            assert_eq!(scraper.state().len(), 2);
        }
    }

    #[tokio::test]
    async fn test_parse_error_leaves_state() {
        let fetcher = Arc::new(StubFetcher::new());
        fetcher
            .push("worker.php", page(false))
            .push("worker.php", Response::ok(r#"<div class="chat-txt"><span>noon</span></div>"#));
        let hub = EventHub::new(4);
        let mut rx = listen(&hub, Topic::chat_all());
        let mut scraper = ChatScraper::new("global", ChatView::Messages, fetcher, hub);

        scraper.scrape_once(frozen_now()).await.unwrap();
        assert_eq!(received(&mut rx).await.len(), 2);

        let err = scraper.scrape_once(frozen_now()).await.unwrap_err();
        assert!(matches!(err, AppError::Parse(_)));
        assert_eq!(scraper.state().len(), 2);
        assert!(received(&mut rx).await.is_empty());
    }

    #[tokio::test]
    async fn test_flags_view() {
        let flags = r#"<ul><li><div class="item-title"><strong>Apr 16, 5:37:04 PM</strong><br>
<a href="profile.php?user_name=Katiepie">Katiepie</a>: Plz have straw</div>
<div class="item-after">1 flag</div></li></ul>"#;
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.push("log.php", Response::ok(flags));
        let hub = EventHub::new(4);
        let mut chat_rx = listen(&hub, Topic::chat_all());
        let mut flags_rx = listen(&hub, Topic::flags("trade"));

        let mut scraper = ChatScraper::new("trade", ChatView::Flags, fetcher.clone(), hub);
        let result = scraper.scrape_once(frozen_now()).await.unwrap();
        assert_eq!(result.change_count(), 1);
        assert_eq!(result.changes[0].message.flag_count, 1);
        assert_eq!(received(&mut flags_rx).await.len(), 1);
        assert!(received(&mut chat_rx).await.is_empty());

        let request = &fetcher.requests()[0];
        assert_eq!(request.path, "log.php");
        assert_eq!(request.param("type"), Some("chat"));
        assert_eq!(request.param("flag"), Some("1"));
    }
}
