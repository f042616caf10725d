use chrono::{DateTime, Utc};
use color_eyre::Result;

use super::helpers::Tx;
use super::models::Notification;
use super::Db;

impl Db {
    /// Queue a notification inside the transaction of the action that
    /// triggered it, so both land or neither does.
    pub(crate) async fn push_notification(
        tx: &mut Tx<'_>,
        user_id: i64,
        kind: &str,
        payload: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO notifications (user_id, kind, payload, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(user_id)
        .bind(kind)
        .bind(payload.to_string())
        .bind(now)
        .execute(&mut **tx)
        .await?;

        tracing::debug!("notification {kind} queued for user_id={user_id}");
        Ok(())
    }

    pub async fn notifications_for(&self, user_id: i64, limit: i64) -> Result<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, kind, payload, created_at, read_at
            FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    /// Returns false when the notification does not exist or belongs to
    /// someone else.
    pub async fn mark_notification_read(
        &self,
        notification_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE notifications SET read_at = COALESCE(read_at, $1)
            WHERE id = $2 AND user_id = $3
            "#,
        )
        .bind(now)
        .bind(notification_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
