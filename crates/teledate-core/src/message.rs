use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An incoming text message from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub id: Uuid,
    /// Channel name (e.g. "telegram").
    pub channel: String,
    /// Platform-specific user ID.
    pub sender_id: String,
    /// Human-readable sender name (e.g. a Telegram username).
    pub sender_name: Option<String>,
    /// Message text content.
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Platform-specific target for routing the response (e.g. Telegram chat_id).
    #[serde(default)]
    pub reply_target: Option<String>,
}

/// An outgoing message to send back through a channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub text: String,
    /// Platform-specific target for routing (e.g. Telegram chat_id).
    #[serde(default)]
    pub reply_target: Option<String>,
    /// Reply keyboard to attach, if any.
    #[serde(default)]
    pub keyboard: Option<Keyboard>,
}

/// A reply keyboard: rows of button labels.
///
/// Channels render this with their native markup (Telegram's
/// `ReplyKeyboardMarkup`); the dialogue layer only deals in labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyboard(pub Vec<Vec<String>>);

impl Keyboard {
    /// Build a keyboard from rows of string-like labels.
    pub fn new<R, L>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = L>,
        L: Into<String>,
    {
        Self(
            rows.into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        )
    }
}
