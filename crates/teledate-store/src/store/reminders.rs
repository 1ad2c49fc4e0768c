//! Per-user recurring reminder rows consumed by the scheduler loop.

use super::{fmt_dt, parse_dt, Store};
use chrono::{Duration, NaiveDateTime};
use teledate_core::error::TeledateError;

/// A scheduled recurring reminder. One per user.
#[derive(Debug, Clone)]
pub struct Reminder {
    pub user_id: i64,
    /// Channel name the reminder is delivered through.
    pub channel: String,
    /// Platform-specific delivery target (e.g. Telegram chat_id).
    pub reply_target: String,
    /// Activity label carried for the message header.
    pub activity: String,
    pub interval_hours: i64,
    /// Next delivery time, UTC.
    pub next_fire: NaiveDateTime,
}

impl Store {
    /// Schedule a reminder, replacing any existing one for the same user.
    ///
    /// The delete-then-insert keeps the one-job-per-user invariant even if
    /// a stale row is somehow present.
    pub async fn set_reminder(&self, reminder: &Reminder) -> Result<(), TeledateError> {
        sqlx::query("DELETE FROM reminders WHERE user_id = ?")
            .bind(reminder.user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| TeledateError::Store(format!("clear reminder failed: {e}")))?;

        sqlx::query(
            "INSERT INTO reminders (user_id, channel, reply_target, activity, interval_hours, next_fire) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(reminder.user_id)
        .bind(&reminder.channel)
        .bind(&reminder.reply_target)
        .bind(&reminder.activity)
        .bind(reminder.interval_hours)
        .bind(fmt_dt(reminder.next_fire))
        .execute(&self.pool)
        .await
        .map_err(|e| TeledateError::Store(format!("set reminder failed: {e}")))?;

        Ok(())
    }

    /// Whether the user currently has a scheduled reminder.
    pub async fn has_reminder(&self, user_id: i64) -> Result<bool, TeledateError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM reminders WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| TeledateError::Store(format!("reminder check failed: {e}")))?;

        Ok(count > 0)
    }

    /// Fetch the user's reminder, if any.
    pub async fn get_reminder(&self, user_id: i64) -> Result<Option<Reminder>, TeledateError> {
        let row: Option<(i64, String, String, String, i64, String)> = sqlx::query_as(
            "SELECT user_id, channel, reply_target, activity, interval_hours, next_fire \
             FROM reminders WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TeledateError::Store(format!("get reminder failed: {e}")))?;

        row.map(row_into_reminder).transpose()
    }

    /// Reminders that are due for delivery.
    pub async fn get_due_reminders(&self) -> Result<Vec<Reminder>, TeledateError> {
        let rows: Vec<(i64, String, String, String, i64, String)> = sqlx::query_as(
            "SELECT user_id, channel, reply_target, activity, interval_hours, next_fire \
             FROM reminders WHERE datetime(next_fire) <= datetime('now')",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| TeledateError::Store(format!("get due reminders failed: {e}")))?;

        rows.into_iter().map(row_into_reminder).collect()
    }

    /// Advance a reminder's `next_fire` by whole intervals until it is
    /// strictly after `now`.
    pub async fn advance_reminder(
        &self,
        user_id: i64,
        now: NaiveDateTime,
    ) -> Result<(), TeledateError> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT interval_hours, next_fire FROM reminders WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| TeledateError::Store(format!("advance reminder failed: {e}")))?;

        let Some((interval_hours, next_fire)) = row else {
            return Ok(());
        };

        let next = next_fire_after(parse_dt(&next_fire)?, interval_hours, now);
        sqlx::query("UPDATE reminders SET next_fire = ? WHERE user_id = ?")
            .bind(fmt_dt(next))
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| TeledateError::Store(format!("advance reminder failed: {e}")))?;

        Ok(())
    }

    /// Cancel the user's reminder. Idempotent: returns `false` when there
    /// was nothing to cancel.
    pub async fn cancel_reminder(&self, user_id: i64) -> Result<bool, TeledateError> {
        let result = sqlx::query("DELETE FROM reminders WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| TeledateError::Store(format!("cancel reminder failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_into_reminder(
    (user_id, channel, reply_target, activity, interval_hours, next_fire): (
        i64,
        String,
        String,
        String,
        i64,
        String,
    ),
) -> Result<Reminder, TeledateError> {
    Ok(Reminder {
        user_id,
        channel,
        reply_target,
        activity,
        interval_hours,
        next_fire: parse_dt(&next_fire)?,
    })
}

/// Step `anchor` forward by whole intervals until strictly after `now`.
pub fn next_fire_after(anchor: NaiveDateTime, interval_hours: i64, now: NaiveDateTime) -> NaiveDateTime {
    let interval = Duration::hours(interval_hours.max(1));
    let mut next = anchor + interval;
    if next > now {
        return next;
    }
    // Jump in one step rather than looping per interval.
    let behind = (now - next).num_seconds();
    let step = interval.num_seconds();
    let missed = behind / step + 1;
    next + Duration::seconds(missed * step)
}

#[cfg(test)]
mod tests {
    use super::next_fire_after;
    use chrono::NaiveDate;

    fn dt(d: u32, h: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_next_fire_one_interval_ahead() {
        assert_eq!(next_fire_after(dt(1, 0), 48, dt(1, 1)), dt(3, 0));
    }

    #[test]
    fn test_next_fire_skips_missed_intervals() {
        // Anchor long in the past: lands on the first slot after `now`.
        assert_eq!(next_fire_after(dt(1, 0), 24, dt(10, 12)), dt(11, 0));
        assert_eq!(next_fire_after(dt(1, 0), 48, dt(10, 12)), dt(11, 0));
    }

    #[test]
    fn test_next_fire_strictly_future() {
        // Exactly on a slot boundary: advance to the following slot.
        assert_eq!(next_fire_after(dt(1, 0), 24, dt(2, 0)), dt(3, 0));
    }
}
