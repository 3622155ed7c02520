// src/services/mailbox.rs

//! Bot mailbox polling.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::Result;
use crate::events::{Event, EventHub, Topic};
use crate::models::MailMessage;
use crate::parsers::{parse_mailbox, parse_message};
use crate::pipeline::schedule::Job;
use crate::utils::cache::FixedSizeCache;
use crate::utils::http::Fetcher;

/// Fetches one mail and emits it on `dm`.
pub struct MessageScraper {
    id: u64,
    fetcher: Arc<dyn Fetcher>,
    hub: EventHub,
}

impl MessageScraper {
    pub fn new(id: u64, fetcher: Arc<dyn Fetcher>, hub: EventHub) -> Self {
        Self { id, fetcher, hub }
    }

    pub async fn run(&self) -> Result<MailMessage> {
        let response = self
            .fetcher
            .get("message.php", &[("id", self.id.to_string())])
            .await?
            .error_for_status("message.php")?;
        let message = parse_message(self.id, &response.body, Utc::now())?;
        log::info!(
            "Received message {} from {}: {}",
            message.id,
            message.username,
            message.subject
        );
        self.hub.emit(&Topic::dm(), Event::Dm(message.clone()));
        Ok(message)
    }
}

/// Polls the mailbox listing and spawns a [`MessageScraper`] for each unread
/// mail not handled recently.
pub struct MailboxScraper {
    fetcher: Arc<dyn Fetcher>,
    hub: EventHub,
    recent: FixedSizeCache<u64, ()>,
}

impl MailboxScraper {
    pub fn new(fetcher: Arc<dyn Fetcher>, hub: EventHub, recent_capacity: usize) -> Self {
        Self {
            fetcher,
            hub,
            recent: FixedSizeCache::new(recent_capacity),
        }
    }

    /// Poll once. Returns the ids of the mails handed to a message scraper.
    pub async fn scrape_once(&mut self) -> Result<Vec<u64>> {
        let response = self
            .fetcher
            .get("messages.php", &[])
            .await?
            .error_for_status("messages.php")?;

        let mut spawned = Vec::new();
        for row in parse_mailbox(&response.body)? {
            log::debug!("Found message {} (unread: {})", row.id, row.unread);
            if !row.unread || self.recent.contains_key(&row.id) {
                continue;
            }
            log::info!("Scraping message {}", row.id);
            self.recent.insert(row.id, ());

            let scraper = MessageScraper::new(row.id, Arc::clone(&self.fetcher), self.hub.clone());
            tokio::spawn(async move {
                if let Err(e) = scraper.run().await {
                    log::error!("Failed to scrape message {}: {e:?}", scraper.id);
                }
            });
            spawned.push(row.id);
        }
        Ok(spawned)
    }
}

#[async_trait]
impl Job for MailboxScraper {
    async fn run(&mut self) -> Result<()> {
        self.scrape_once().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use crate::error::AppError;
    use crate::utils::http::Response;
    use crate::utils::http::stub::StubFetcher;

    fn mailbox(rows: &[(u64, bool)]) -> Response {
        let rows: String = rows
            .iter()
            .map(|(id, unread)| {
                let style = if *unread { "font-weight:bold" } else { "" };
                format!(
                    r#"<a href="message.php?id={id}" class="item-link"><div class="item-title" style="{style}">mail</div></a>"#
                )
            })
            .collect();
        Response::ok(format!(r#"<div id="inbox">{rows}</div>"#))
    }

    fn message() -> Response {
        Response::ok(
            r#"<div class="card-header">ping</div>
<div class="card-content-inner">ping</div>
<div class="card-content-inner">Sent by <a href="profile.php?user_name=Ffff">Ffff</a> on Jan 1, 12:00:00 AM</div>"#,
        )
    }

    #[tokio::test]
    async fn test_unread_mail_is_scraped_once() {
        let fetcher = Arc::new(StubFetcher::new());
        fetcher
            .push("messages.php", mailbox(&[(12, true), (11, false), (10, true)]))
            .push("message.php", message());
        let hub = EventHub::new(4);
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.on(&Topic::dm(), move |_, event| {
            let tx = tx.clone();
            async move {
                if let Event::Dm(mail) = &*event {
                    let _ = tx.send(mail.id);
                }
                Ok(())
            }
        });

        let mut scraper = MailboxScraper::new(fetcher.clone(), hub, 100);
        assert_eq!(scraper.scrape_once().await.unwrap(), vec![12, 10]);
        // Still unread on the next poll, but recently handled.
        assert!(scraper.scrape_once().await.unwrap().is_empty());

        let mut ids = Vec::new();
        while let Ok(Some(id)) = timeout(Duration::from_millis(100), rx.recv()).await {
            ids.push(id);
        }
        ids.sort();
        assert_eq!(ids, vec![10, 12]);

        let message_requests: Vec<_> = fetcher
            .requests()
            .into_iter()
            .filter(|r| r.path == "message.php")
            .filter_map(|r| r.param("id").map(String::from))
            .collect();
        assert_eq!(message_requests.len(), 2);
    }

    #[tokio::test]
    async fn test_cache_eviction_allows_rescrape() {
        let fetcher = Arc::new(StubFetcher::new());
        fetcher
            .push("messages.php", mailbox(&[(1, true)]))
            .push("messages.php", mailbox(&[(2, true), (1, true)]))
            .push("messages.php", mailbox(&[(3, true), (1, true)]))
            .push("message.php", message());
        let mut scraper = MailboxScraper::new(fetcher, EventHub::new(4), 2);

        assert_eq!(scraper.scrape_once().await.unwrap(), vec![1]);
        assert_eq!(scraper.scrape_once().await.unwrap(), vec![2]);
        // Remembering 3 pushes 1 out of the cache.
        assert_eq!(scraper.scrape_once().await.unwrap(), vec![3, 1]);
    }

    #[tokio::test]
    async fn test_mailbox_error_status() {
        let fetcher = Arc::new(StubFetcher::new());
        let mut scraper = MailboxScraper::new(fetcher, EventHub::new(4), 10);
        let err = scraper.scrape_once().await.unwrap_err();
        assert!(matches!(err, AppError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_message_scraper_emits_dm() {
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.push("message.php", message());
        let mail = MessageScraper::new(7, fetcher.clone(), EventHub::new(4))
            .run()
            .await
            .unwrap();
        assert_eq!(mail.id, 7);
        assert_eq!(mail.username, "Ffff");
        assert_eq!(mail.subject, "ping");
        assert_eq!(fetcher.requests()[0].param("id"), Some("7"));
    }
}
