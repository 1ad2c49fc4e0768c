//! # teledate-store
//!
//! SQLite-backed persistence for the Teledate bot.

pub mod store;

pub use store::{next_fire_after, Reminder, Store};
