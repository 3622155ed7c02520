// src/models/mod.rs

//! Domain models for the scraping pipeline.
//!
//! Records produced by the parsers and carried by the event hub, plus the
//! application configuration.

mod chat;
mod config;
mod mail;
mod user;

// Re-export all public types
pub use chat::ChatMessage;
pub use config::{
    ChatConfig, Config, EventsConfig, LoggingConfig, MailConfig, SiteConfig, UsersConfig,
};
pub use mail::{MailMessage, MailboxRow};
pub use user::{Role, UserSnapshot};
