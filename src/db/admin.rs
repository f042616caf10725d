use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde_json::json;
use ulid::Ulid;

use super::ledger::NewEntry;
use super::models::{UserSummary, UserTotals};
use super::Db;
use crate::names;
use crate::xp::ranking::month_key;

impl Db {
    /// All users with their cached XP for the admin panel.
    pub async fn list_users(&self, now: DateTime<Utc>) -> Result<Vec<UserSummary>> {
        let users = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT id, email, display_name, role, access_tier, xp,
                   CASE WHEN xp_mensal_month = $1 THEN xp_mensal ELSE 0 END AS xp_mensal,
                   level
            FROM users
            ORDER BY id
            "#,
        )
        .bind(month_key(now))
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    pub async fn set_access_tier(&self, user_id: i64, access_tier: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET access_tier = $1 WHERE id = $2")
            .bind(access_tier)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        tracing::info!("access tier of user_id={user_id} set to {access_tier}");
        Ok(result.rows_affected() > 0)
    }

    /// Grant a manual bonus. Every grant gets its own ledger key so repeated
    /// bonuses add up.
    pub async fn grant_bonus(
        &self,
        user_id: i64,
        amount: i64,
        reason: &str,
        granted_by: i64,
        now: DateTime<Utc>,
    ) -> Result<UserTotals> {
        let mut tx = self.pool.begin().await?;

        let entry = NewEntry {
            user_id,
            source: names::SOURCE_BONUS,
            source_id: Ulid::new().to_string(),
            kind: names::KIND_BONUS,
            amount,
            description: reason.to_string(),
        };
        Self::append_entry(&mut tx, &entry, now).await?;
        let totals = self.sync_user_totals(&mut tx, user_id, now).await?;

        Self::push_notification(
            &mut tx,
            user_id,
            names::NOTIFY_BONUS,
            &json!({ "amount": amount, "reason": reason }),
            now,
        )
        .await?;

        tx.commit().await?;

        tracing::info!("bonus of {amount} xp granted to user_id={user_id} by user_id={granted_by}");
        Ok(totals)
    }
}
