// src/sinks/bots.rs

//! Command dispatch for mail sent to the bot account.
//!
//! The first line of a mail (or, failing that, its subject) is read as
//! `<command> [args]` and emitted on `bot_dm.<command>`. Commands are plain
//! listeners, so new ones only need a subscription.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::error::Result;
use crate::events::{Event, EventHub, Topic};
use crate::models::MailMessage;
use crate::services::UserScraper;
use crate::utils::http::Fetcher;

static BR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<br\s*/?>").expect("valid regex"));

/// A mail read as a bot command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotMessage {
    pub mail: MailMessage,
    /// Lower-cased first word
    pub command: String,
    pub args: Option<String>,
}

impl BotMessage {
    /// Split `line` into a command word and the rest.
    pub fn parse(mail: MailMessage, line: &str) -> Self {
        let line = line.trim();
        let (command, args) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, Some(rest.trim().to_string())),
            None => (line, None),
        };
        Self {
            mail,
            // Mobile keyboards capitalize the first letter.
            command: command.to_lowercase(),
            args: args.filter(|a| !a.is_empty()),
        }
    }
}

/// Emit `line` as a command. Returns whether any listener took it, along
/// with the parsed message.
pub fn try_dispatch(hub: &EventHub, mail: &MailMessage, line: &str) -> (bool, BotMessage) {
    let message = BotMessage::parse(mail.clone(), line);
    if message.command.is_empty() {
        return (false, message);
    }
    let handled = hub.emit(
        &Topic::bot_dm(&message.command),
        Event::BotDm(message.clone()),
    );
    (handled, message)
}

/// The bot's outbound side plus its built-in commands.
#[derive(Clone)]
pub struct Bot {
    /// Session of the bot account, used for replies
    mailer: Arc<dyn Fetcher>,
    /// Session used for profile lookups
    site: Arc<dyn Fetcher>,
}

impl Bot {
    pub fn new(mailer: Arc<dyn Fetcher>, site: Arc<dyn Fetcher>) -> Self {
        Self { mailer, site }
    }

    /// Subscribe the `dm` dispatcher and the built-in commands.
    pub fn register(&self, hub: &EventHub) {
        let bot = self.clone();
        hub.on(&Topic::dm(), move |hub, event| {
            let bot = bot.clone();
            async move { bot.on_dm(hub, event).await }
        });

        let bot = self.clone();
        hub.on(&Topic::bot_dm("ping"), move |_, event| {
            let bot = bot.clone();
            async move { bot.on_ping(event).await }
        });

        let bot = self.clone();
        hub.on(&Topic::bot_dm("userinfo"), move |hub, event| {
            let bot = bot.clone();
            async move { bot.on_userinfo(hub, event).await }
        });
    }

    /// Post a reply to the mail behind `message`. The subject defaults to
    /// `RE: <original subject>`.
    pub async fn reply(&self, message: &BotMessage, body: &str, subject: Option<&str>) -> Result<()> {
        let subject = subject
            .map(String::from)
            .unwrap_or_else(|| format!("RE: {}", message.mail.subject));
        let form = [
            ("in_reply_to", message.mail.id.to_string()),
            ("to", message.mail.username.clone()),
            ("subject", subject),
            ("body", body.to_string()),
        ];
        self.mailer
            .post_form("worker.php", &[("go", "sendmessage".to_string())], &form)
            .await?
            .error_for_status("worker.php")?;
        log::info!("Replied to message {} from {}", message.mail.id, message.mail.username);
        Ok(())
    }

    /// Look up the sender's numeric user id.
    pub async fn user_id(&self, hub: &EventHub, message: &BotMessage) -> Result<u64> {
        let scraper = UserScraper::new(message.mail.username.clone(), Arc::clone(&self.site), hub.clone());
        Ok(scraper.scrape().await?.user_id)
    }

    async fn on_dm(&self, hub: EventHub, event: Arc<Event>) -> Result<()> {
        let Event::Dm(mail) = &*event else {
            return Ok(());
        };
        let body = BR_RE.replace_all(&mail.content, "\n");
        let first_line = body.lines().next().unwrap_or_default();

        let (handled, message) = try_dispatch(&hub, mail, first_line);
        if handled {
            return Ok(());
        }
        let (handled, _) = try_dispatch(&hub, mail, &mail.subject);
        if handled {
            return Ok(());
        }

        log::info!("No command in message {} from {}", mail.id, mail.username);
        let help = format!(
            "Sorry, I didn't understand your request. Known commands: ping, userinfo.\n\nDebug info:\nmsg.id={}\n",
            mail.id
        );
        self.reply(&message, &help, None).await
    }

    async fn on_ping(&self, event: Arc<Event>) -> Result<()> {
        match &*event {
            Event::BotDm(message) => self.reply(message, "pong", None).await,
            _ => Ok(()),
        }
    }

    async fn on_userinfo(&self, hub: EventHub, event: Arc<Event>) -> Result<()> {
        let Event::BotDm(message) = &*event else {
            return Ok(());
        };
        let user_id = self.user_id(&hub, message).await?;
        self.reply(message, &format!("Your user ID is {user_id}"), None)
            .await
    }
}
