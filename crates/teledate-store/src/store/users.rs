//! User creation, lookup, count, and deletion.

use super::Store;
use teledate_core::error::TeledateError;
use teledate_core::sanitize::valid_label;

/// Default activity label assigned when the user does not pick one.
const DEFAULT_ACTIVITY: &str = "Default";

impl Store {
    /// Create a user entry.
    ///
    /// Returns the new user's id and activity label, or `None` when the
    /// name is already taken or either label violates the charset rule.
    pub async fn create_user(
        &self,
        name: &str,
        activity: Option<&str>,
    ) -> Result<Option<(i64, String)>, TeledateError> {
        let activity = activity.unwrap_or(DEFAULT_ACTIVITY);
        if !valid_label(name) || !valid_label(activity) {
            return Ok(None);
        }

        let result = sqlx::query("INSERT INTO users (name, activity) VALUES (?, ?)")
            .bind(name)
            .bind(activity)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) => Ok(Some((done.last_insert_rowid(), activity.to_string()))),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Ok(None),
            Err(e) => Err(TeledateError::Store(format!("create user failed: {e}"))),
        }
    }

    /// Look up a user by name.
    pub async fn get_user_info(&self, name: &str) -> Result<Option<(i64, String)>, TeledateError> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT id, activity FROM users WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| TeledateError::Store(format!("get user failed: {e}")))?;

        Ok(row)
    }

    /// Total number of users.
    pub async fn get_user_count(&self) -> Result<i64, TeledateError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| TeledateError::Store(format!("count users failed: {e}")))?;

        Ok(count)
    }

    /// Delete a user; records and reminders cascade.
    ///
    /// Returns `false` when no such user existed.
    pub async fn delete_user(&self, user_id: i64) -> Result<bool, TeledateError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| TeledateError::Store(format!("delete user failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}
