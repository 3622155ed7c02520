//! Scraping pipeline.
//!
//! - `diff`: per-room change detection between polls
//! - `schedule`: named periodic jobs
//! - `etl`: startup wiring for every scraper

pub mod diff;
pub mod etl;
pub mod schedule;

pub use etl::{Sessions, run_etl};
pub use schedule::{Job, PeriodicTask, Scheduler};
