//! Record admission and retention.
//!
//! Admission guards manual (backfilled) records: they must land strictly
//! after the user's latest record and never in the future. Retention
//! prunes a third of the oldest records once a user crosses the
//! configured ceiling, so per-user storage stays bounded.

use chrono::Utc;
use teledate_core::timefmt;
use teledate_store::Store;
use tracing::warn;

/// Outcome of a successful record insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    /// Confirmation fragment shown under the activity header.
    pub confirmation: String,
    /// Whether this was a manual (explicit-date) insert.
    pub manual: bool,
}

/// Create a record for the user, optionally from a raw manual-date argument.
///
/// Returns `None` on any failure — unparseable date, non-monotonic or
/// future date, missing user, store error — without distinguishing the
/// cause to the caller.
pub async fn add_record(
    store: &Store,
    user_id: i64,
    manual: Option<&str>,
    records_limit: i64,
) -> Option<RecordOutcome> {
    if let Some(arg) = manual {
        // Manual dates are typed in display time; store and compare in UTC.
        let date = timefmt::from_display(timefmt::parse_manual(arg)?);

        let last = match store.get_last_user_record(user_id).await {
            Ok(last) => last,
            Err(e) => {
                warn!("get_last_user_record failed: {e}");
                return None;
            }
        };
        if let Some(last) = last {
            // A backfilled entry may not precede (or duplicate) the latest one.
            if date <= last {
                return None;
            }
        }
        if date > Utc::now().naive_utc() {
            return None;
        }

        let pruned = clear_old_records(store, user_id, records_limit).await;
        match store.create_record(user_id, Some(date)).await {
            Ok(Some(stored)) => Some(RecordOutcome {
                confirmation: confirmation_text(stored, pruned),
                manual: true,
            }),
            Ok(None) => None,
            Err(e) => {
                warn!("create_record failed: {e}");
                None
            }
        }
    } else {
        let pruned = clear_old_records(store, user_id, records_limit).await;
        // The store stamps its own time; the returned value is authoritative.
        match store.create_record(user_id, None).await {
            Ok(Some(stored)) => Some(RecordOutcome {
                confirmation: confirmation_text(stored, pruned),
                manual: false,
            }),
            Ok(None) => None,
            Err(e) => {
                warn!("create_record failed: {e}");
                None
            }
        }
    }
}

/// Prune the oldest third of the user's records once the count exceeds
/// the ceiling. Returns whether anything was deleted.
pub async fn clear_old_records(store: &Store, user_id: i64, records_limit: i64) -> bool {
    let records = match store.get_user_records(user_id).await {
        Ok(records) => records,
        Err(e) => {
            warn!("get_user_records failed: {e}");
            return false;
        }
    };
    if records.len() as i64 <= records_limit {
        return false;
    }
    match store.delete_records(user_id, records_limit / 3).await {
        Ok(deleted) => deleted,
        Err(e) => {
            warn!("delete_records failed: {e}");
            false
        }
    }
}

fn confirmation_text(stored: chrono::NaiveDateTime, pruned: bool) -> String {
    let mut text = format!("`{}`", timefmt::format_short(stored));
    if pruned {
        text.push_str("\nOld records have been deleted");
    }
    text
}
