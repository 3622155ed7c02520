// src/pipeline/etl.rs

//! Scraping pipeline startup.

use std::sync::Arc;
use std::time::Duration;

use crate::events::{Event, EventHub, Topic};
use crate::models::Config;
use crate::pipeline::schedule::Scheduler;
use crate::services::{ChatScraper, ChatView, MailboxScraper, OnlineScraper, StaffListScraper};
use crate::utils::http::Fetcher;

/// Sessions the scrapers run under.
#[derive(Clone)]
pub struct Sessions {
    /// Scraper account: chat, logs, profiles
    pub site: Arc<dyn Fetcher>,
    /// Bot account: mailbox and replies
    pub bot: Arc<dyn Fetcher>,
}

/// Emit `startup` and schedule every scraper the config enables.
///
/// Flags scrapers start after `chat.flags_start_delay_secs` so the live chat
/// windows are filled before flags rows are correlated. Dropping the returned
/// scheduler stops everything.
pub fn run_etl(config: &Config, hub: &EventHub, sessions: &Sessions) -> Scheduler {
    log::info!("Starting ETL processing");
    hub.emit(&Topic::startup(), Event::Startup);

    let mut scheduler = Scheduler::new();

    if config.users.enabled {
        let delay = Duration::from_millis(config.users.request_delay_ms);
        scheduler.schedule(
            "online-scraper",
            Duration::from_secs(config.users.online_interval_secs),
            OnlineScraper::new(Arc::clone(&sessions.site), hub.clone(), delay),
        );
        scheduler.schedule(
            "staff-scraper",
            Duration::from_secs(config.users.staff_interval_secs),
            StaffListScraper::new(Arc::clone(&sessions.site), hub.clone(), delay),
        );
    }

    if config.mail.enabled {
        scheduler.schedule(
            "mailbox-scraper",
            Duration::from_secs(config.mail.interval_secs),
            MailboxScraper::new(
                Arc::clone(&sessions.bot),
                hub.clone(),
                config.mail.recent_cache_size,
            ),
        );
    }

    let chat_interval = Duration::from_secs(config.chat.interval_secs);
    for room in &config.chat.rooms {
        scheduler.schedule(
            format!("chat-scraper-{room}"),
            chat_interval,
            ChatScraper::new(room, ChatView::Messages, Arc::clone(&sessions.site), hub.clone()),
        );
    }

    let flags_delay = Duration::from_secs(config.chat.flags_start_delay_secs);
    let flags_interval = Duration::from_secs(config.chat.flags_interval_secs);
    for room in &config.chat.rooms {
        scheduler.schedule_after(
            format!("flags-scraper-{room}"),
            flags_delay,
            flags_interval,
            ChatScraper::new(room, ChatView::Flags, Arc::clone(&sessions.site), hub.clone()),
        );
    }

    log::info!("ETL processing started with {} tasks", scheduler.len());
    scheduler
}
