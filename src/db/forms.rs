use chrono::{DateTime, Utc};
use color_eyre::Result;

use super::ledger::NewEntry;
use super::models::UserTotals;
use super::Db;
use crate::names;

impl Db {
    /// Store a form submission and award the form reward for it.
    pub async fn submit_form(
        &self,
        user_id: i64,
        form_key: &str,
        payload: &serde_json::Value,
        reward: i64,
        now: DateTime<Utc>,
    ) -> Result<(i64, UserTotals)> {
        let mut tx = self.pool.begin().await?;

        let submission_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO form_submissions (user_id, form_key, payload, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(form_key)
        .bind(payload.to_string())
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let entry = NewEntry {
            user_id,
            source: names::SOURCE_FORMULARIO,
            source_id: submission_id.to_string(),
            kind: names::KIND_FORMULARIO,
            amount: reward,
            description: format!("Formulário {form_key} preenchido"),
        };
        Self::append_entry(&mut tx, &entry, now).await?;
        let totals = self.sync_user_totals(&mut tx, user_id, now).await?;

        tx.commit().await?;

        tracing::info!("form {form_key} submitted by user_id={user_id}: submission={submission_id}");
        Ok((submission_id, totals))
    }
}
