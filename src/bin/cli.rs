//! FarmRPG ETL CLI
//!
//! Runs the scraping pipeline, or parses saved pages for inspection.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use farmrpg_etl::{
    error::Result,
    events::EventHub,
    models::Config,
    parsers,
    pipeline::{self, Sessions},
    sinks::{Bot, ConsoleEcho, SnapshotTracker},
    utils::http::{Fetcher, HttpFetcher},
};

/// FarmRPG chat, mail and profile scraper
#[derive(Parser, Debug)]
#[command(
    name = "farmrpg-etl",
    version,
    about = "Scrapes FarmRPG pages and dispatches the records to event sinks"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every scraper until Ctrl-C
    Run,

    /// Parse a saved page and print the records as JSON
    Parse {
        /// Page type
        #[arg(value_enum)]
        kind: PageKind,

        /// Saved HTML file
        file: PathBuf,

        /// Room name for chat and flags pages
        #[arg(long, default_value = "global")]
        room: String,

        /// Message id for a mail page
        #[arg(long, default_value_t = 0)]
        id: u64,

        /// Username for a profile page
        #[arg(long, default_value = "")]
        username: String,
    },

    /// Validate the configuration file
    Validate,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PageKind {
    Chat,
    Flags,
    Message,
    Mailbox,
    Profile,
    Online,
}

/// Initialize logging. `--verbose` wins over the configured level and
/// `RUST_LOG` wins over both.
fn init_logging(verbose: bool, configured: &str) {
    let level = if verbose { "debug" } else { configured };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = Config::load(&cli.config);
    let configured_level = loaded
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_logging(cli.verbose, &configured_level);

    let config = loaded.unwrap_or_else(|e| {
        log::warn!(
            "Config load failed from {}: {}. Using defaults.",
            cli.config.display(),
            e
        );
        Config::default()
    });

    match cli.command {
        Command::Run => run(config).await?,

        Command::Parse {
            kind,
            file,
            room,
            id,
            username,
        } => {
            let content = std::fs::read(&file)?;
            let now = Utc::now();
            let json = match kind {
                PageKind::Chat => serde_json::to_string_pretty(&parsers::parse_chat(&room, &content, now)?)?,
                PageKind::Flags => serde_json::to_string_pretty(&parsers::parse_flags(&room, &content, now)?)?,
                PageKind::Message => serde_json::to_string_pretty(&parsers::parse_message(id, &content, now)?)?,
                PageKind::Mailbox => serde_json::to_string_pretty(&parsers::parse_mailbox(&content)?)?,
                PageKind::Profile => {
                    serde_json::to_string_pretty(&parsers::parse_profile(&username, &content, now)?)?
                }
                PageKind::Online => serde_json::to_string_pretty(&parsers::parse_online(&content)?)?,
            };
            println!("{json}");
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "✓ Config OK ({} rooms, mail {}, users {})",
                config.chat.rooms.len(),
                if config.mail.enabled { "on" } else { "off" },
                if config.users.enabled { "on" } else { "off" }
            );
        }
    }

    Ok(())
}

/// Wire the sinks, start the scrapers and wait for Ctrl-C.
async fn run(config: Config) -> Result<()> {
    config.validate()?;
    log::info!("FarmRPG ETL starting against {}", config.site.base_url);

    let cookie = config.site.auth_cookie()?;
    let site: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(&config.site, &cookie)?);
    let bot: Arc<dyn Fetcher> = match config.site.bot_cookie() {
        Some(bot_cookie) => Arc::new(HttpFetcher::new(&config.site, &bot_cookie)?),
        None => {
            log::warn!(
                "{} is not set, the bot will use the scraper session",
                config.site.bot_cookie_env
            );
            Arc::clone(&site)
        }
    };

    let hub = EventHub::new(config.events.max_concurrent_listeners);
    ConsoleEcho::new(Utc::now()).register(&hub);
    SnapshotTracker::new().register(&hub);
    if config.mail.enabled {
        Bot::new(Arc::clone(&bot), Arc::clone(&site)).register(&hub);
    }

    let scheduler = pipeline::run_etl(&config, &hub, &Sessions { site, bot });

    tokio::signal::ctrl_c().await?;
    log::info!("Stopping {} tasks...", scheduler.len());
    scheduler.shutdown().await;
    log::info!("Done!");
    Ok(())
}
