//! In-process event subscribers.
//!
//! - Console echo of chat lines and profile changes (`ConsoleEcho`)
//! - Profile change detection (`SnapshotTracker`)
//! - Bot mail command dispatch (`Bot`)

mod bots;
mod console;
mod snapshots;

pub use bots::{Bot, BotMessage, try_dispatch};
pub use console::ConsoleEcho;
pub use snapshots::SnapshotTracker;
