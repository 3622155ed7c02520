// src/lib.rs

//! FarmRPG ETL Library
//!
//! Polls chat rooms, the bot mailbox and user profiles, parses the pages
//! into records and fans them out through an in-process event hub.

pub mod error;
pub mod events;
pub mod models;
pub mod parsers;
pub mod pipeline;
pub mod services;
pub mod sinks;
pub mod utils;
