//! The conversation state machine.
//!
//! Every inbound message is classified into a [`Command`] and dispatched
//! against the session's current [`State`]. Handlers return a [`Reply`]
//! describing what to send back, which keyboard to show, and whether the
//! conversation ended. Transitions are total: every state answers every
//! input class, with a catch-all that preserves the current state.
//!
//! Store failures are collapsed into the same user-facing refusals as
//! business rejections (logged here, not shown), so handlers themselves
//! are infallible.

use crate::commands::Command;
use crate::graph;
use crate::records;
use chrono::Utc;
use teledate_core::{message::Keyboard, sanitize, timefmt};
use teledate_store::{next_fire_after, Reminder, Store};
use tracing::warn;

/// Default reminder repeat interval, in hours.
pub const DEFAULT_INTERVAL_HOURS: i64 = 48;

const FORMAT_HINT: &str = "To create manual record use this format:\n`Add record 01.01.2000 10:00`";

/// Dialogue states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// No conversation yet; waiting for an entry command.
    #[default]
    Start,
    /// Offered to set up a database.
    DbSetup,
    /// Choosing between create/delete/cancel.
    DbManage,
    /// Naming the activity.
    DbActivity,
    /// Main menu.
    Main,
    /// Reminder sub-menu.
    Reminder,
}

/// Per-chat session state, injected into each handler call.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub state: State,
    /// Cached `(user_id, activity)` once resolved.
    pub user: Option<(i64, String)>,
    /// Whether a reminder is believed active for this user.
    pub reminder: bool,
}

/// What a handler wants sent back.
#[derive(Debug, Default)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<Keyboard>,
    /// Rendered graph to deliver as a photo, with its caption.
    pub photo: Option<(Vec<u8>, String)>,
    /// The conversation is over; the session should be dropped.
    pub end: bool,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    fn ending(mut self) -> Self {
        self.end = true;
        self
    }
}

/// Grouped context for dialogue handlers.
pub struct DialogueContext<'a> {
    pub store: &'a Store,
    /// Store-level identity of the chat partner.
    pub username: &'a str,
    /// Channel the conversation runs on (for reminder scheduling).
    pub channel: &'a str,
    /// Delivery target on that channel (e.g. Telegram chat_id).
    pub reply_target: &'a str,
    pub user_limit: i64,
    pub records_limit: i64,
}

/// Handle one inbound message against the session.
pub async fn handle(session: &mut Session, text: &str, ctx: &DialogueContext<'_>) -> Reply {
    let cmd = Command::parse(text);

    // Commands honored regardless of (most) states, per the fallback table.
    match cmd {
        Command::End => {
            return end_conversation(session, ctx);
        }
        Command::Database
            if matches!(
                session.state,
                State::Start | State::DbSetup | State::Main | State::Reminder
            ) =>
        {
            return database(session, ctx).await;
        }
        Command::Start if session.state == State::Start => {
            return start(session, ctx).await;
        }
        _ => {}
    }

    match session.state {
        State::Start => invalid_input(None).with_keyboard(keyboards::end()),
        State::DbSetup => invalid_input(None),
        State::DbManage => db_manage(session, cmd, ctx).await,
        State::DbActivity => db_activity(session, text, ctx).await,
        State::Main => main_menu(session, cmd, ctx).await,
        State::Reminder => reminder_menu(session, cmd, ctx).await,
    }
}

/// `Start` — greet a known user or offer to set up the database.
async fn start(session: &mut Session, ctx: &DialogueContext<'_>) -> Reply {
    resolve_user(session, ctx).await;

    if let Some((user_id, _)) = session.user {
        session.reminder = reminder_active(ctx.store, user_id).await;
        session.state = State::Main;
        return Reply::text(format!(
            "*Hello, {}!*\n\n{FORMAT_HINT}",
            ctx.username
        ))
        .with_keyboard(keyboards::main_menu(session.reminder));
    }

    session.state = State::DbSetup;
    Reply::text("Database does not exists. Try to set up one?")
        .with_keyboard(keyboards::start())
}

/// `Manage database` — offer deletion, creation, or refuse on quota.
async fn database(session: &mut Session, ctx: &DialogueContext<'_>) -> Reply {
    resolve_user(session, ctx).await;

    if let Some((user_id, _)) = session.user {
        session.reminder = reminder_active(ctx.store, user_id).await;
        session.state = State::DbManage;
        return Reply::text("Database exists. Do you want to delete it?")
            .with_keyboard(keyboards::db_delete());
    }

    let user_count = match ctx.store.get_user_count().await {
        Ok(count) => count,
        Err(e) => {
            warn!("get_user_count failed: {e}");
            ctx.user_limit
        }
    };
    if user_count >= ctx.user_limit {
        return Reply::text("Can't create the database because the quota is over.")
            .with_keyboard(keyboards::end())
            .ending();
    }

    session.state = State::DbManage;
    Reply::text("Create the database?").with_keyboard(keyboards::db_create())
}

/// Create/delete/cancel dispatch while managing the database.
async fn db_manage(session: &mut Session, cmd: Command, ctx: &DialogueContext<'_>) -> Reply {
    match cmd {
        Command::Cancel if session.user.is_some() => {
            session.state = State::Main;
            Reply::text("Deletion was canceled")
                .with_keyboard(keyboards::main_menu(session.reminder))
        }
        Command::DeleteDatabase if session.user.is_some() => {
            let Some((user_id, _)) = session.user.clone() else {
                return invalid_input(None);
            };
            let deleted = match ctx.store.delete_user(user_id).await {
                Ok(deleted) => deleted,
                Err(e) => {
                    warn!("delete_user failed: {e}");
                    false
                }
            };
            if !deleted {
                return Reply::text("Can't delete database")
                    .with_keyboard(keyboards::end())
                    .ending();
            }
            // The reminder row cascades with the user; clear the cache too.
            session.user = None;
            session.reminder = false;
            Reply::text("Database has been deleted")
                .with_keyboard(keyboards::end())
                .ending()
        }
        Command::CreateDatabase if session.user.is_none() => {
            session.state = State::DbActivity;
            Reply::text("What is your activity?").with_keyboard(keyboards::db_activity())
        }
        Command::Cancel | Command::DeleteDatabase | Command::CreateDatabase => {
            Reply::text("Database was not created")
                .with_keyboard(keyboards::end())
                .ending()
        }
        _ => invalid_input(None),
    }
}

/// Free-text activity naming.
async fn db_activity(session: &mut Session, text: &str, ctx: &DialogueContext<'_>) -> Reply {
    if text == "Cancel" {
        return Reply::text("Database was not created")
            .with_keyboard(keyboards::end())
            .ending();
    }

    if !sanitize::valid_label(text) {
        return invalid_input(Some("Use only letters, digits and space characters"));
    }

    let activity = if text == "Default" {
        None
    } else {
        Some(sanitize::capitalize(text))
    };

    let created = match ctx
        .store
        .create_user(ctx.username, activity.as_deref())
        .await
    {
        Ok(created) => created,
        Err(e) => {
            warn!("create_user failed: {e}");
            None
        }
    };

    match created {
        Some((user_id, activity)) => {
            session.user = Some((user_id, activity));
            session.state = State::Main;
            Reply::text(format!("*Database has been created*\n\n{FORMAT_HINT}"))
                .with_keyboard(keyboards::main_menu(false))
        }
        None => Reply::text("Can't create database. Try another activity name"),
    }
}

/// Main menu dispatch: status, graph, record insertion, reminder sub-menu.
async fn main_menu(session: &mut Session, cmd: Command, ctx: &DialogueContext<'_>) -> Reply {
    let Some((user_id, activity)) = session.user.clone() else {
        return invalid_input(None);
    };

    match cmd {
        Command::Status => {
            let last = match ctx.store.get_last_user_record(user_id).await {
                Ok(last) => last,
                Err(e) => {
                    warn!("get_last_user_record failed: {e}");
                    None
                }
            };
            match last {
                Some(record) => Reply::text(format!(
                    "*{activity}*\n\n`{}`\n{} ago",
                    timefmt::format_full(record),
                    timefmt::format_elapsed(record, Utc::now().naive_utc())
                ))
                .with_keyboard(keyboards::main_menu(session.reminder)),
                None => Reply::text("No records have been created"),
            }
        }
        Command::Graph => {
            let dates = match ctx.store.get_user_records(user_id).await {
                Ok(dates) => dates,
                Err(e) => {
                    warn!("get_user_records failed: {e}");
                    Vec::new()
                }
            };
            if dates.is_empty() {
                return Reply::text("No records have been created");
            }
            match graph::render_history_graph(&dates) {
                Ok(png) => Reply {
                    photo: Some((png, activity)),
                    ..Default::default()
                },
                Err(e) => {
                    warn!("graph rendering failed: {e}");
                    Reply::text("Can't load the graph")
                        .with_keyboard(keyboards::main_menu(session.reminder))
                }
            }
        }
        Command::Reminder => {
            session.state = State::Reminder;
            if session.reminder {
                Reply::text("You have an active reminder. Unset?")
                    .with_keyboard(keyboards::unset())
            } else {
                Reply::text("`Set (default interval: 48)`\n`Set <hour_interval>`")
                    .with_keyboard(keyboards::set())
            }
        }
        Command::DeleteLastRecord => {
            let deleted = match ctx.store.delete_last_record(user_id).await {
                Ok(deleted) => deleted,
                Err(e) => {
                    warn!("delete_last_record failed: {e}");
                    false
                }
            };
            if deleted {
                Reply::text(format!("*{activity}*\n\nLast record has been deleted"))
                    .with_keyboard(keyboards::main_menu(session.reminder))
            } else {
                Reply::text("Can't delete the record")
            }
        }
        Command::AddRecord(manual) => {
            let outcome =
                records::add_record(ctx.store, user_id, manual.as_deref(), ctx.records_limit)
                    .await;
            match outcome {
                Some(outcome) => {
                    if outcome.manual && session.reminder {
                        // The reminder premise (time since last record) is stale.
                        if let Err(e) = ctx.store.cancel_reminder(user_id).await {
                            warn!("cancel_reminder failed: {e}");
                        }
                        session.reminder = false;
                    }
                    Reply::text(format!("*{activity}*\n\n{}", outcome.confirmation))
                        .with_keyboard(keyboards::main_menu(session.reminder))
                }
                None => Reply::text("Can't create a record"),
            }
        }
        _ => invalid_input(Some("Manual record format:\n`Add record 01.01.2000 10:00`")),
    }
}

/// Reminder sub-menu: schedule, cancel, or back out.
async fn reminder_menu(session: &mut Session, cmd: Command, ctx: &DialogueContext<'_>) -> Reply {
    let Some((user_id, activity)) = session.user.clone() else {
        return invalid_input(None);
    };

    match cmd {
        Command::Cancel => {
            session.state = State::Main;
            Reply::text("Operation was canceled")
                .with_keyboard(keyboards::main_menu(session.reminder))
        }
        Command::Unset => {
            // Idempotent: unsetting without an active reminder is a no-op.
            if let Err(e) = ctx.store.cancel_reminder(user_id).await {
                warn!("cancel_reminder failed: {e}");
            }
            session.reminder = false;
            session.state = State::Main;
            Reply::text("Reminder has been disabled")
                .with_keyboard(keyboards::main_menu(false))
        }
        Command::Set(interval) => {
            let interval_hours = interval.unwrap_or(DEFAULT_INTERVAL_HOURS);
            if !(1..=99).contains(&interval_hours) {
                return Reply::text("`Set <hours_interval>`\n\n`Unset`");
            }

            let now = Utc::now().naive_utc();
            let anchor = match ctx.store.get_last_user_record(user_id).await {
                Ok(last) => last.unwrap_or(now),
                Err(e) => {
                    warn!("get_last_user_record failed: {e}");
                    now
                }
            };
            let next_fire = next_fire_after(anchor, interval_hours, now);

            let reminder = Reminder {
                user_id,
                channel: ctx.channel.to_string(),
                reply_target: ctx.reply_target.to_string(),
                activity: activity.clone(),
                interval_hours,
                next_fire,
            };
            if let Err(e) = ctx.store.set_reminder(&reminder).await {
                warn!("set_reminder failed: {e}");
                return Reply::text("`Set <hours_interval>`\n\n`Unset`");
            }

            session.reminder = true;
            session.state = State::Main;
            Reply::text(format!(
                "{activity}\n\nThe reminder has been set on {} for every {interval_hours} hours",
                timefmt::format_time_of_day(next_fire)
            ))
            .with_keyboard(keyboards::main_menu(true))
        }
        _ => invalid_input(None),
    }
}

/// `/end` — close the conversation and drop the session.
fn end_conversation(session: &mut Session, ctx: &DialogueContext<'_>) -> Reply {
    session.state = State::Start;
    Reply::text(format!("Goodbye, {}.", ctx.username))
        .with_keyboard(keyboards::end())
        .ending()
}

/// Catch-all for unrecognized input; preserves the current state.
fn invalid_input(extra: Option<&str>) -> Reply {
    let mut text = String::from("Invalid input");
    if let Some(extra) = extra {
        text.push_str("\n\n");
        text.push_str(extra);
    }
    Reply::text(text)
}

/// Resolve and cache the store identity for the chat partner.
async fn resolve_user(session: &mut Session, ctx: &DialogueContext<'_>) {
    if session.user.is_some() {
        return;
    }
    session.user = match ctx.store.get_user_info(ctx.username).await {
        Ok(user) => user,
        Err(e) => {
            warn!("get_user_info failed: {e}");
            None
        }
    };
}

async fn reminder_active(store: &Store, user_id: i64) -> bool {
    match store.has_reminder(user_id).await {
        Ok(active) => active,
        Err(e) => {
            warn!("has_reminder failed: {e}");
            false
        }
    }
}

/// Reply keyboard presets.
mod keyboards {
    use teledate_core::message::Keyboard;

    pub fn start() -> Keyboard {
        Keyboard::new([["Manage database"]])
    }

    pub fn db_delete() -> Keyboard {
        Keyboard::new([["Delete database", "Cancel"]])
    }

    pub fn db_create() -> Keyboard {
        Keyboard::new([["Create database", "Cancel"]])
    }

    pub fn db_activity() -> Keyboard {
        Keyboard::new([["Default", "Cancel"]])
    }

    pub fn main_menu(reminder: bool) -> Keyboard {
        let toggle = if reminder {
            "Reminder: On"
        } else {
            "Reminder: Off"
        };
        Keyboard::new([["Status", "Add record"], ["Graph", toggle]])
    }

    pub fn set() -> Keyboard {
        Keyboard::new([["Set", "Cancel"]])
    }

    pub fn unset() -> Keyboard {
        Keyboard::new([["Unset", "Cancel"]])
    }

    pub fn end() -> Keyboard {
        Keyboard::new([["Start"]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use teledate_core::config::StoreConfig;

    async fn test_store() -> Store {
        Store::new(&StoreConfig {
            db_path: ":memory:".to_string(),
            ..Default::default()
        })
        .await
        .unwrap()
    }

    fn ctx<'a>(store: &'a Store) -> DialogueContext<'a> {
        DialogueContext {
            store,
            username: "tester",
            channel: "telegram",
            reply_target: "chat1",
            user_limit: 2,
            records_limit: 30,
        }
    }

    async fn drive(session: &mut Session, store: &Store, text: &str) -> Reply {
        handle(session, text, &ctx(store)).await
    }

    #[tokio::test]
    async fn test_onboarding_flow() {
        let store = test_store().await;
        let mut session = Session::default();

        let reply = drive(&mut session, &store, "Start").await;
        assert_eq!(reply.text, "Database does not exists. Try to set up one?");
        assert_eq!(session.state, State::DbSetup);

        let reply = drive(&mut session, &store, "Manage database").await;
        assert_eq!(reply.text, "Create the database?");
        assert_eq!(session.state, State::DbManage);

        let reply = drive(&mut session, &store, "Create database").await;
        assert_eq!(reply.text, "What is your activity?");
        assert_eq!(session.state, State::DbActivity);

        let reply = drive(&mut session, &store, "workout").await;
        assert!(reply.text.starts_with("*Database has been created*"));
        assert_eq!(session.state, State::Main);

        let (_, activity) = session.user.clone().unwrap();
        assert_eq!(activity, "Workout");
        assert_eq!(
            store.get_user_info("tester").await.unwrap().map(|u| u.1),
            Some("Workout".to_string())
        );
    }

    #[tokio::test]
    async fn test_default_activity_choice() {
        let store = test_store().await;
        let mut session = Session {
            state: State::DbActivity,
            ..Default::default()
        };
        drive(&mut session, &store, "Default").await;
        assert_eq!(session.user.clone().unwrap().1, "Default");
    }

    #[tokio::test]
    async fn test_quota_refusal_ends_conversation() {
        let store = test_store().await;
        store.create_user("first", None).await.unwrap().unwrap();
        store.create_user("second", None).await.unwrap().unwrap();

        let mut session = Session::default();
        let reply = drive(&mut session, &store, "Manage database").await;
        assert_eq!(
            reply.text,
            "Can't create the database because the quota is over."
        );
        assert!(reply.end);
    }

    #[tokio::test]
    async fn test_start_with_existing_user() {
        let store = test_store().await;
        store
            .create_user("tester", Some("Workout"))
            .await
            .unwrap()
            .unwrap();

        let mut session = Session::default();
        let reply = drive(&mut session, &store, "/start").await;
        assert!(reply.text.starts_with("*Hello, tester!*"));
        assert_eq!(session.state, State::Main);
        assert!(!session.reminder);
    }

    #[tokio::test]
    async fn test_invalid_input_preserves_state() {
        let store = test_store().await;
        store.create_user("tester", None).await.unwrap().unwrap();

        let mut session = Session::default();
        drive(&mut session, &store, "Start").await;
        assert_eq!(session.state, State::Main);

        let reply = drive(&mut session, &store, "banana").await;
        assert!(reply.text.starts_with("Invalid input"));
        assert!(reply.text.contains("Manual record format"));
        assert_eq!(session.state, State::Main);

        // `Start` is an entry command, not valid mid-conversation.
        let reply = drive(&mut session, &store, "Start").await;
        assert!(reply.text.starts_with("Invalid input"));
        assert_eq!(session.state, State::Main);
    }

    #[tokio::test]
    async fn test_db_manage_invalid_input_preserves_state() {
        let store = test_store().await;
        let mut session = Session::default();
        drive(&mut session, &store, "Manage database").await;
        assert_eq!(session.state, State::DbManage);

        let reply = drive(&mut session, &store, "what?").await;
        assert_eq!(reply.text, "Invalid input");
        assert_eq!(session.state, State::DbManage);
    }

    #[tokio::test]
    async fn test_activity_charset_reprompts() {
        let store = test_store().await;
        let mut session = Session {
            state: State::DbActivity,
            ..Default::default()
        };

        let reply = drive(&mut session, &store, "my.activity!").await;
        assert!(reply
            .text
            .contains("Use only letters, digits and space characters"));
        assert_eq!(session.state, State::DbActivity);
        assert!(session.user.is_none());

        drive(&mut session, &store, "my activity").await;
        assert_eq!(session.user.clone().unwrap().1, "My activity");
    }

    #[tokio::test]
    async fn test_activity_cancel_ends_without_creating() {
        let store = test_store().await;
        let mut session = Session {
            state: State::DbActivity,
            ..Default::default()
        };
        let reply = drive(&mut session, &store, "Cancel").await;
        assert_eq!(reply.text, "Database was not created");
        assert!(reply.end);
        assert_eq!(store.get_user_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_activity_name_reprompts() {
        let store = test_store().await;
        store.create_user("Tester", None).await.unwrap().unwrap();
        // The capitalized username collides with the existing row.
        let mut session = Session {
            state: State::DbActivity,
            ..Default::default()
        };
        let ctx = DialogueContext {
            username: "Tester",
            ..ctx(&store)
        };
        let reply = handle(&mut session, "Running", &ctx).await;
        assert_eq!(reply.text, "Can't create database. Try another activity name");
        assert_eq!(session.state, State::DbActivity);
    }

    #[tokio::test]
    async fn test_status_without_records() {
        let store = test_store().await;
        store.create_user("tester", None).await.unwrap().unwrap();

        let mut session = Session::default();
        drive(&mut session, &store, "Start").await;
        let reply = drive(&mut session, &store, "Status").await;
        assert_eq!(reply.text, "No records have been created");
        assert_eq!(session.state, State::Main);
    }

    #[tokio::test]
    async fn test_add_record_and_status() {
        let store = test_store().await;
        store
            .create_user("tester", Some("Workout"))
            .await
            .unwrap()
            .unwrap();

        let mut session = Session::default();
        drive(&mut session, &store, "Start").await;

        let reply = drive(&mut session, &store, "Add record").await;
        assert!(reply.text.starts_with("*Workout*"));

        let reply = drive(&mut session, &store, "Status").await;
        assert!(reply.text.starts_with("*Workout*"));
        assert!(reply.text.contains("ago"));
    }

    #[tokio::test]
    async fn test_add_record_rejects_bad_dates() {
        let store = test_store().await;
        let (user_id, _) = store.create_user("tester", None).await.unwrap().unwrap();

        let mut session = Session::default();
        drive(&mut session, &store, "Start").await;
        drive(&mut session, &store, "Add record").await;

        // Earlier than the record just created.
        let reply = drive(&mut session, &store, "Add record 01.01.2000 10:00").await;
        assert_eq!(reply.text, "Can't create a record");
        assert_eq!(store.get_user_records(user_id).await.unwrap().len(), 1);
        assert_eq!(session.state, State::Main);
    }

    #[tokio::test]
    async fn test_delete_last_record_command() {
        let store = test_store().await;
        let (user_id, _) = store.create_user("tester", None).await.unwrap().unwrap();

        let mut session = Session::default();
        drive(&mut session, &store, "Start").await;

        // Nothing to delete yet.
        let reply = drive(&mut session, &store, "Delete last record").await;
        assert_eq!(reply.text, "Can't delete the record");

        drive(&mut session, &store, "Add record").await;
        let reply = drive(&mut session, &store, "Delete last record").await;
        assert!(reply.text.contains("Last record has been deleted"));
        assert!(store.get_user_records(user_id).await.unwrap().is_empty());
        assert_eq!(session.state, State::Main);
    }

    #[tokio::test]
    async fn test_graph_without_records() {
        let store = test_store().await;
        store.create_user("tester", None).await.unwrap().unwrap();

        let mut session = Session::default();
        drive(&mut session, &store, "Start").await;
        let reply = drive(&mut session, &store, "Graph").await;
        assert_eq!(reply.text, "No records have been created");
        assert!(reply.photo.is_none());
    }

    #[tokio::test]
    async fn test_graph_sends_photo() {
        let store = test_store().await;
        store
            .create_user("tester", Some("Workout"))
            .await
            .unwrap()
            .unwrap();

        let mut session = Session::default();
        drive(&mut session, &store, "Start").await;
        drive(&mut session, &store, "Add record").await;

        let reply = drive(&mut session, &store, "Graph").await;
        let (png, caption) = reply.photo.unwrap();
        assert_eq!(&png[..4], b"\x89PNG");
        assert_eq!(caption, "Workout");
    }

    #[tokio::test]
    async fn test_reminder_set_and_unset() {
        let store = test_store().await;
        let (user_id, _) = store.create_user("tester", None).await.unwrap().unwrap();

        let mut session = Session::default();
        drive(&mut session, &store, "Start").await;

        let reply = drive(&mut session, &store, "Reminder").await;
        assert!(reply.text.contains("Set"));
        assert_eq!(session.state, State::Reminder);

        let reply = drive(&mut session, &store, "Set 5").await;
        assert!(reply.text.contains("for every 5 hours"));
        assert_eq!(session.state, State::Main);
        assert!(session.reminder);

        let scheduled = store.get_reminder(user_id).await.unwrap().unwrap();
        assert_eq!(scheduled.interval_hours, 5);
        assert_eq!(scheduled.reply_target, "chat1");
        assert!(scheduled.next_fire > Utc::now().naive_utc());

        // The menu now offers to unset.
        let reply = drive(&mut session, &store, "Reminder: On").await;
        assert_eq!(reply.text, "You have an active reminder. Unset?");

        let reply = drive(&mut session, &store, "Unset").await;
        assert_eq!(reply.text, "Reminder has been disabled");
        assert!(!session.reminder);
        assert!(!store.has_reminder(user_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_reminder_default_interval() {
        let store = test_store().await;
        let (user_id, _) = store.create_user("tester", None).await.unwrap().unwrap();

        let mut session = Session::default();
        drive(&mut session, &store, "Start").await;
        drive(&mut session, &store, "Reminder").await;
        let reply = drive(&mut session, &store, "Set").await;
        assert!(reply.text.contains("for every 48 hours"));
        let scheduled = store.get_reminder(user_id).await.unwrap().unwrap();
        assert_eq!(scheduled.interval_hours, 48);
    }

    #[tokio::test]
    async fn test_reminder_first_fire_anchored_to_last_record() {
        let store = test_store().await;
        let (user_id, _) = store.create_user("tester", None).await.unwrap().unwrap();
        let anchor = Utc::now().naive_utc() - Duration::days(10);
        store.create_record(user_id, Some(anchor)).await.unwrap();

        let mut session = Session::default();
        drive(&mut session, &store, "Start").await;
        drive(&mut session, &store, "Reminder").await;
        drive(&mut session, &store, "Set 24").await;

        let scheduled = store.get_reminder(user_id).await.unwrap().unwrap();
        // Keeps the anchor's time-of-day grid and lands in the future.
        assert!(scheduled.next_fire > Utc::now().naive_utc());
        assert_eq!(
            scheduled.next_fire.format("%H:%M:%S").to_string(),
            anchor.format("%H:%M:%S").to_string()
        );
    }

    #[tokio::test]
    async fn test_reminder_invalid_interval_reprompts() {
        let store = test_store().await;
        store.create_user("tester", None).await.unwrap().unwrap();

        let mut session = Session::default();
        drive(&mut session, &store, "Start").await;
        drive(&mut session, &store, "Reminder").await;

        let reply = drive(&mut session, &store, "Set 0").await;
        assert!(reply.text.contains("Set <hours_interval>"));
        assert_eq!(session.state, State::Reminder);

        let reply = drive(&mut session, &store, "Set x").await;
        assert_eq!(reply.text, "Invalid input");
        assert_eq!(session.state, State::Reminder);
    }

    #[tokio::test]
    async fn test_reminder_cancel_backs_out() {
        let store = test_store().await;
        let (user_id, _) = store.create_user("tester", None).await.unwrap().unwrap();

        let mut session = Session::default();
        drive(&mut session, &store, "Start").await;
        drive(&mut session, &store, "Reminder").await;
        let reply = drive(&mut session, &store, "Cancel").await;
        assert_eq!(reply.text, "Operation was canceled");
        assert_eq!(session.state, State::Main);
        assert!(!store.has_reminder(user_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_manual_record_cancels_reminder() {
        let store = test_store().await;
        let (user_id, _) = store.create_user("tester", None).await.unwrap().unwrap();
        store
            .create_record(user_id, Some(Utc::now().naive_utc() - Duration::days(5)))
            .await
            .unwrap();

        let mut session = Session::default();
        drive(&mut session, &store, "Start").await;
        drive(&mut session, &store, "Reminder").await;
        drive(&mut session, &store, "Set 24").await;
        assert!(session.reminder);

        // A manual record in the gap between then and now.
        let manual = timefmt::to_display(Utc::now().naive_utc() - Duration::days(1));
        let arg = format!("Add record {}", manual.format("%d.%m.%Y %H:%M"));
        let reply = drive(&mut session, &store, &arg).await;
        assert!(reply.text.starts_with("*Default*"));

        assert!(!session.reminder);
        assert!(!store.has_reminder(user_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_database_flow() {
        let store = test_store().await;
        let (user_id, _) = store.create_user("tester", None).await.unwrap().unwrap();
        store.create_record(user_id, None).await.unwrap();

        let mut session = Session::default();
        drive(&mut session, &store, "Start").await;
        drive(&mut session, &store, "Reminder").await;
        drive(&mut session, &store, "Set 24").await;

        let reply = drive(&mut session, &store, "/database").await;
        assert_eq!(reply.text, "Database exists. Do you want to delete it?");
        assert_eq!(session.state, State::DbManage);

        let reply = drive(&mut session, &store, "Delete database").await;
        assert_eq!(reply.text, "Database has been deleted");
        assert!(reply.end);
        assert!(session.user.is_none());
        assert!(!session.reminder);

        // Cascade: records and reminder are gone with the user.
        assert!(store.get_all_records().await.unwrap().is_empty());
        assert!(!store.has_reminder(user_id).await.unwrap());
        assert!(store.get_user_info("tester").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_database_cancel_returns_to_main() {
        let store = test_store().await;
        store.create_user("tester", None).await.unwrap().unwrap();

        let mut session = Session::default();
        drive(&mut session, &store, "Manage database").await;
        let reply = drive(&mut session, &store, "Cancel").await;
        assert_eq!(reply.text, "Deletion was canceled");
        assert_eq!(session.state, State::Main);
    }

    #[tokio::test]
    async fn test_create_database_with_existing_user_refused() {
        let store = test_store().await;
        store.create_user("tester", None).await.unwrap().unwrap();

        let mut session = Session::default();
        drive(&mut session, &store, "Manage database").await;
        let reply = drive(&mut session, &store, "Create database").await;
        assert_eq!(reply.text, "Database was not created");
        assert!(reply.end);
    }

    #[tokio::test]
    async fn test_end_from_any_state() {
        let store = test_store().await;
        store.create_user("tester", None).await.unwrap().unwrap();

        let mut session = Session::default();
        drive(&mut session, &store, "Start").await;
        let reply = drive(&mut session, &store, "/end").await;
        assert_eq!(reply.text, "Goodbye, tester.");
        assert!(reply.end);
    }
}
