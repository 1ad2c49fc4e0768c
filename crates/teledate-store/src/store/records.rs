//! Activity record insertion, retrieval, and oldest-first deletion.

use super::{fmt_dt, parse_dt, Store};
use chrono::NaiveDateTime;
use teledate_core::error::TeledateError;

impl Store {
    /// Create a record for a user.
    ///
    /// With `date = None` the store stamps its own current UTC time and
    /// the stored value is returned as authoritative. Returns `None`
    /// when the user does not exist.
    pub async fn create_record(
        &self,
        user_id: i64,
        date: Option<NaiveDateTime>,
    ) -> Result<Option<NaiveDateTime>, TeledateError> {
        let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| TeledateError::Store(format!("user check failed: {e}")))?;
        if exists.is_none() {
            return Ok(None);
        }

        if let Some(dt) = date {
            sqlx::query("INSERT INTO records (user_id, date) VALUES (?, ?)")
                .bind(user_id)
                .bind(fmt_dt(dt))
                .execute(&self.pool)
                .await
                .map_err(|e| TeledateError::Store(format!("insert record failed: {e}")))?;
            return Ok(Some(dt));
        }

        let result = sqlx::query("INSERT INTO records (user_id) VALUES (?)")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| TeledateError::Store(format!("insert record failed: {e}")))?;

        let (stored,): (String,) = sqlx::query_as("SELECT date FROM records WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| TeledateError::Store(format!("read back record failed: {e}")))?;

        Ok(Some(parse_dt(&stored)?))
    }

    /// The user's most recent record by insertion order.
    pub async fn get_last_user_record(
        &self,
        user_id: i64,
    ) -> Result<Option<NaiveDateTime>, TeledateError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT date FROM records WHERE user_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TeledateError::Store(format!("get last record failed: {e}")))?;

        row.map(|(date,)| parse_dt(&date)).transpose()
    }

    /// All of a user's record dates in insertion order.
    pub async fn get_user_records(
        &self,
        user_id: i64,
    ) -> Result<Vec<NaiveDateTime>, TeledateError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT date FROM records WHERE user_id = ? ORDER BY id ASC")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| TeledateError::Store(format!("get records failed: {e}")))?;

        rows.into_iter().map(|(date,)| parse_dt(&date)).collect()
    }

    /// All record dates across all users, in insertion order.
    pub async fn get_all_records(&self) -> Result<Vec<NaiveDateTime>, TeledateError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT date FROM records ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| TeledateError::Store(format!("get all records failed: {e}")))?;

        rows.into_iter().map(|(date,)| parse_dt(&date)).collect()
    }

    /// Delete the user's newest record (highest id).
    ///
    /// Returns `false` when the user had no records.
    pub async fn delete_last_record(&self, user_id: i64) -> Result<bool, TeledateError> {
        let result = sqlx::query(
            "DELETE FROM records WHERE id = (
                SELECT id FROM records WHERE user_id = ? ORDER BY id DESC LIMIT 1
            )",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| TeledateError::Store(format!("delete last record failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete up to `count` of a user's oldest records (ascending id).
    ///
    /// Returns `false` when the user had no records at all.
    pub async fn delete_records(&self, user_id: i64, count: i64) -> Result<bool, TeledateError> {
        let result = sqlx::query(
            "DELETE FROM records WHERE id IN (
                SELECT id FROM records WHERE user_id = ? ORDER BY id ASC LIMIT ?
            )",
        )
        .bind(user_id)
        .bind(count)
        .execute(&self.pool)
        .await
        .map_err(|e| TeledateError::Store(format!("delete records failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}
