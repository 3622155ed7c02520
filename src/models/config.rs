//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Target site and session settings
    #[serde(default)]
    pub site: SiteConfig,

    /// Chat room polling
    #[serde(default)]
    pub chat: ChatConfig,

    /// Online/staff list and profile scraping
    #[serde(default)]
    pub users: UsersConfig,

    /// Bot mailbox polling
    #[serde(default)]
    pub mail: MailConfig,

    /// Event hub dispatch
    #[serde(default)]
    pub events: EventsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.site.base_url)?;
        if self.site.user_agent.trim().is_empty() {
            return Err(AppError::validation("site.user_agent is empty"));
        }
        if self.site.timeout_secs == 0 {
            return Err(AppError::validation("site.timeout_secs must be > 0"));
        }
        if self.site.auth_cookie_name.trim().is_empty() {
            return Err(AppError::validation("site.auth_cookie_name is empty"));
        }
        if self.chat.rooms.iter().any(|r| r.trim().is_empty() || r.contains('.')) {
            return Err(AppError::validation(
                "chat.rooms must be non-empty names without '.'",
            ));
        }
        if self.chat.interval_secs == 0 || self.chat.flags_interval_secs == 0 {
            return Err(AppError::validation("chat intervals must be > 0"));
        }
        if self.users.online_interval_secs == 0 || self.users.staff_interval_secs == 0 {
            return Err(AppError::validation("users intervals must be > 0"));
        }
        if self.mail.interval_secs == 0 {
            return Err(AppError::validation("mail.interval_secs must be > 0"));
        }
        if self.mail.recent_cache_size == 0 {
            return Err(AppError::validation("mail.recent_cache_size must be > 0"));
        }
        if self.events.max_concurrent_listeners == 0 {
            return Err(AppError::validation(
                "events.max_concurrent_listeners must be > 0",
            ));
        }
        Ok(())
    }
}

/// Target site and session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Base URL every request path is joined onto
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Name of the session cookie
    #[serde(default = "defaults::auth_cookie_name")]
    pub auth_cookie_name: String,

    /// Environment variable holding the scraper session cookie
    #[serde(default = "defaults::auth_cookie_env")]
    pub auth_cookie_env: String,

    /// Environment variable holding the bot account's session cookie
    #[serde(default = "defaults::bot_cookie_env")]
    pub bot_cookie_env: String,
}

impl SiteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Read the scraper session cookie from the environment.
    pub fn auth_cookie(&self) -> Result<String> {
        std::env::var(&self.auth_cookie_env).map_err(|_| {
            AppError::config(format!(
                "Session cookie variable {} is not set",
                self.auth_cookie_env
            ))
        })
    }

    /// Read the bot session cookie, if one is configured.
    pub fn bot_cookie(&self) -> Option<String> {
        std::env::var(&self.bot_cookie_env)
            .ok()
            .filter(|v| !v.trim().is_empty())
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            auth_cookie_name: defaults::auth_cookie_name(),
            auth_cookie_env: defaults::auth_cookie_env(),
            bot_cookie_env: defaults::bot_cookie_env(),
        }
    }
}

/// Chat room polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Rooms to scrape
    #[serde(default = "defaults::rooms")]
    pub rooms: Vec<String>,

    /// Delay between live chat polls per room
    #[serde(default = "defaults::chat_interval")]
    pub interval_secs: u64,

    /// Delay between flags view polls per room
    #[serde(default = "defaults::flags_interval")]
    pub flags_interval_secs: u64,

    /// Wait before starting the flags scrapers so chat windows fill first
    #[serde(default = "defaults::flags_start_delay")]
    pub flags_start_delay_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            rooms: defaults::rooms(),
            interval_secs: defaults::chat_interval(),
            flags_interval_secs: defaults::flags_interval(),
            flags_start_delay_secs: defaults::flags_start_delay(),
        }
    }
}

/// User scraping settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsersConfig {
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    #[serde(default = "defaults::online_interval")]
    pub online_interval_secs: u64,

    #[serde(default = "defaults::staff_interval")]
    pub staff_interval_secs: u64,

    /// Pause between profile scrapes spawned from one listing
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,
}

impl Default for UsersConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::enabled(),
            online_interval_secs: defaults::online_interval(),
            staff_interval_secs: defaults::staff_interval(),
            request_delay_ms: defaults::request_delay(),
        }
    }
}

/// Bot mailbox settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    #[serde(default = "defaults::mail_interval")]
    pub interval_secs: u64,

    /// How many handled message ids to remember
    #[serde(default = "defaults::recent_cache_size")]
    pub recent_cache_size: usize,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::enabled(),
            interval_secs: defaults::mail_interval(),
            recent_cache_size: defaults::recent_cache_size(),
        }
    }
}

/// Event hub settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Listener invocations allowed to run at once
    #[serde(default = "defaults::max_concurrent_listeners")]
    pub max_concurrent_listeners: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_listeners: defaults::max_concurrent_listeners(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    // Site defaults
    pub fn base_url() -> String {
        "https://farmrpg.com/".into()
    }
    pub fn user_agent() -> String {
        "farmrpg-etl (contact coderanger)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn auth_cookie_name() -> String {
        "HighwindFRPG".into()
    }
    pub fn auth_cookie_env() -> String {
        "AUTH_COOKIE".into()
    }
    pub fn bot_cookie_env() -> String {
        "BOT_AUTH_COOKIE".into()
    }

    // Chat defaults
    pub fn rooms() -> Vec<String> {
        ["help", "global", "spoilers", "trade", "giveaways", "trivia", "staff"]
            .into_iter()
            .map(String::from)
            .collect()
    }
    pub fn chat_interval() -> u64 {
        1
    }
    pub fn flags_interval() -> u64 {
        30
    }
    pub fn flags_start_delay() -> u64 {
        30
    }

    // User defaults
    pub fn enabled() -> bool {
        true
    }
    pub fn online_interval() -> u64 {
        600
    }
    pub fn staff_interval() -> u64 {
        3600
    }
    pub fn request_delay() -> u64 {
        100
    }

    // Mail defaults
    pub fn mail_interval() -> u64 {
        10
    }
    pub fn recent_cache_size() -> usize {
        100
    }

    pub fn max_concurrent_listeners() -> usize {
        64
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
