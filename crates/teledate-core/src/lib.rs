//! # teledate-core
//!
//! Core types, traits, configuration, and error handling for the Teledate bot.

pub mod config;
pub mod error;
pub mod message;
pub mod sanitize;
pub mod timefmt;
pub mod traits;
