//! Scraper orchestrators.
//!
//! Each scraper fetches a page through a [`Fetcher`](crate::utils::http::Fetcher),
//! parses it and emits the records on the event hub:
//! - Chat rooms, live and flags views (`ChatScraper`)
//! - Bot mailbox and single mails (`MailboxScraper`, `MessageScraper`)
//! - Profiles and user listings (`UserScraper`, `OnlineScraper`, `StaffListScraper`)

mod chat;
mod mailbox;
mod users;

pub use chat::{ChatScraper, ChatView};
pub use mailbox::{MailboxScraper, MessageScraper};
pub use users::{OnlineScraper, StaffListScraper, UserScraper};
