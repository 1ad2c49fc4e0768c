//! # teledate-channels
//!
//! Messaging platform integrations for the Teledate bot.

pub mod telegram;
