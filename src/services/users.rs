// src/services/users.rs

//! Profile scraping, driven by the online and staff listings.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::Result;
use crate::events::{Event, EventHub, Topic};
use crate::models::UserSnapshot;
use crate::parsers::{parse_online, parse_profile};
use crate::pipeline::schedule::Job;
use crate::utils::http::Fetcher;

/// Scrapes one user's profile.
pub struct UserScraper {
    username: String,
    fetcher: Arc<dyn Fetcher>,
    hub: EventHub,
}

impl UserScraper {
    pub fn new(username: impl Into<String>, fetcher: Arc<dyn Fetcher>, hub: EventHub) -> Self {
        Self {
            username: username.into(),
            fetcher,
            hub,
        }
    }

    /// Fetch and parse the profile without emitting anything.
    pub async fn scrape(&self) -> Result<UserSnapshot> {
        let response = self
            .fetcher
            .get("profile.php", &[("user_name", self.username.clone())])
            .await?
            .error_for_status("profile.php")?;
        Ok(parse_profile(&self.username, &response.body, Utc::now())?)
    }

    /// Scrape and emit `user_snapshot`.
    pub async fn run(&self) -> Result<UserSnapshot> {
        log::debug!("Starting user scrape of {}", self.username);
        let snapshot = self.scrape().await?;
        self.hub
            .emit(&Topic::user_snapshot(), Event::UserSnapshot(snapshot.clone()));
        log::debug!(
            "Finished user scrape of {} ({})",
            self.username,
            snapshot.user_id
        );
        Ok(snapshot)
    }
}

/// Fetch a user listing and spawn a profile scrape per name, pausing
/// `delay` between spawns. Returns the names found.
async fn scrape_listing(
    path: &str,
    query: &[(&str, String)],
    fetcher: &Arc<dyn Fetcher>,
    hub: &EventHub,
    delay: Duration,
) -> Result<Vec<String>> {
    let response = fetcher.get(path, query).await?.error_for_status(path)?;
    let usernames = parse_online(&response.body)?;

    for username in &usernames {
        let scraper = UserScraper::new(username.clone(), Arc::clone(fetcher), hub.clone());
        tokio::spawn(async move {
            if let Err(e) = scraper.run().await {
                log::error!("Failed to scrape user {}: {e:?}", scraper.username);
            }
        });
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
    Ok(usernames)
}

/// Scrapes everyone on `online.php`.
pub struct OnlineScraper {
    fetcher: Arc<dyn Fetcher>,
    hub: EventHub,
    delay: Duration,
}

impl OnlineScraper {
    pub fn new(fetcher: Arc<dyn Fetcher>, hub: EventHub, delay: Duration) -> Self {
        Self {
            fetcher,
            hub,
            delay,
        }
    }

    pub async fn scrape_once(&self) -> Result<Vec<String>> {
        log::debug!("Starting online scrape");
        let online = scrape_listing("online.php", &[], &self.fetcher, &self.hub, self.delay).await?;
        log::debug!("Finished online scrape: {} users", online.len());
        Ok(online)
    }
}

#[async_trait]
impl Job for OnlineScraper {
    async fn run(&mut self) -> Result<()> {
        self.scrape_once().await.map(|_| ())
    }
}

/// Keeps staff tracked even when they are not online.
pub struct StaffListScraper {
    fetcher: Arc<dyn Fetcher>,
    hub: EventHub,
    delay: Duration,
}

impl StaffListScraper {
    pub fn new(fetcher: Arc<dyn Fetcher>, hub: EventHub, delay: Duration) -> Self {
        Self {
            fetcher,
            hub,
            delay,
        }
    }

    pub async fn scrape_once(&self) -> Result<Vec<String>> {
        log::debug!("Starting staff scrape");
        let query = [("type", "staff".to_string())];
        let staff = scrape_listing("members.php", &query, &self.fetcher, &self.hub, self.delay).await?;
        log::debug!("Finished staff scrape: {} users", staff.len());
        Ok(staff)
    }
}

#[async_trait]
impl Job for StaffListScraper {
    async fn run(&mut self) -> Result<()> {
        self.scrape_once().await.map(|_| ())
    }
}
