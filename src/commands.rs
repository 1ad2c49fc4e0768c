//! Text command classification for the conversation surface.
//!
//! Raw message text is parsed into a typed `Command` before it reaches the
//! state machine; which commands are honored depends on the current state.

/// Classified user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `Start` / `/start` — conversation entry.
    Start,
    /// `Manage database` / `/database` — database management entry/fallback.
    Database,
    /// `/end` — close the conversation from any state.
    End,
    Status,
    Graph,
    /// `Reminder` button, in either of its `Reminder: On`/`Reminder: Off` forms.
    Reminder,
    /// `Add record`, optionally carrying a raw `dd.mm.yyyy hh:mm` argument.
    /// The argument is kept unparsed: admission logic folds parse failures
    /// into the same refusal as constraint violations.
    AddRecord(Option<String>),
    /// `Set` / `Set <n>` with a 1-2 digit interval argument.
    Set(Option<i64>),
    Unset,
    Cancel,
    CreateDatabase,
    DeleteDatabase,
    /// `Delete last record` — drop the newest record (e.g. a typo entry).
    DeleteLastRecord,
    /// Anything else — free text, only meaningful during activity naming.
    Text(String),
}

impl Command {
    /// Classify a message. Never fails; unrecognized input becomes `Text`.
    pub fn parse(text: &str) -> Self {
        match text {
            "Start" | "/start" => return Self::Start,
            "Manage database" | "/database" => return Self::Database,
            "/end" => return Self::End,
            "Status" => return Self::Status,
            "Graph" => return Self::Graph,
            "Reminder" | "Reminder: On" | "Reminder: Off" => return Self::Reminder,
            "Add record" => return Self::AddRecord(None),
            "Set" => return Self::Set(None),
            "Unset" => return Self::Unset,
            "Cancel" => return Self::Cancel,
            "Create database" => return Self::CreateDatabase,
            "Delete database" => return Self::DeleteDatabase,
            "Delete last record" => return Self::DeleteLastRecord,
            _ => {}
        }

        if let Some(arg) = text.strip_prefix("Add record ") {
            if looks_like_manual_date(arg) {
                return Self::AddRecord(Some(arg.to_string()));
            }
        }

        if let Some(arg) = text.strip_prefix("Set ") {
            if (1..=2).contains(&arg.len()) && arg.bytes().all(|b| b.is_ascii_digit()) {
                // 1-2 digits always fit i64.
                return Self::Set(Some(arg.parse().unwrap_or(0)));
            }
        }

        Self::Text(text.to_string())
    }
}

/// Loose shape check for a manual date argument: digits in the digit
/// positions of `dd.mm.yyyy hh:mm`, anything in the separator slots.
/// Strict parsing happens later; garbage that fits the shape is rejected
/// there as an unparseable date.
fn looks_like_manual_date(arg: &str) -> bool {
    const DIGITS: [usize; 12] = [0, 1, 3, 4, 6, 7, 8, 9, 11, 12, 14, 15];
    let bytes = arg.as_bytes();
    bytes.len() == 16
        && DIGITS.iter().all(|&i| bytes[i].is_ascii_digit())
        && bytes[10] == b' '
}
