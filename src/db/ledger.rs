use chrono::{DateTime, Utc};
use color_eyre::{eyre::OptionExt, Result};
use ulid::Ulid;

use super::helpers::Tx;
use super::models::{LedgerEntry, UserTotals};
use super::Db;
use crate::names;
use crate::xp::ranking::{month_key, month_start};
use crate::xp::rules::monthly_running_total;

/// One XP grant or penalty about to be written to the ledger.
#[derive(Debug, Clone)]
pub struct NewEntry<'a> {
    pub user_id: i64,
    pub source: &'a str,
    pub source_id: String,
    pub kind: &'a str,
    pub amount: i64,
    pub description: String,
}

impl Db {
    /// Insert a ledger row unless one already exists for the same
    /// `(user, source, source_id, kind)`. Returns whether a row was written.
    pub(crate) async fn append_entry(
        tx: &mut Tx<'_>,
        entry: &NewEntry<'_>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO xp_ledger (user_id, source, source_id, kind, amount, description, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id, source, source_id, kind) DO NOTHING
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.source)
        .bind(&entry.source_id)
        .bind(entry.kind)
        .bind(entry.amount)
        .bind(&entry.description)
        .bind(now)
        .execute(&mut **tx)
        .await?;

        let written = result.rows_affected() > 0;
        if written {
            tracing::info!(
                user_id = entry.user_id,
                source = entry.source,
                source_id = %entry.source_id,
                kind = entry.kind,
                amount = entry.amount,
                "xp ledger entry written"
            );
        } else {
            tracing::warn!(
                user_id = entry.user_id,
                source = entry.source,
                source_id = %entry.source_id,
                kind = entry.kind,
                "xp ledger entry already present, skipped"
            );
        }
        Ok(written)
    }

    /// Sum of the ledger rows a user holds for one source entity, limited to
    /// `kinds`.
    pub(crate) async fn ledger_sum_for_source(
        tx: &mut Tx<'_>,
        user_id: i64,
        source: &str,
        source_id: &str,
        kinds: &[&str],
    ) -> Result<i64> {
        let mut sum = 0;
        for kind in kinds {
            let part: i64 = sqlx::query_scalar(
                r#"
                SELECT COALESCE(SUM(amount), 0) FROM xp_ledger
                WHERE user_id = $1 AND source = $2 AND source_id = $3 AND kind = $4
                "#,
            )
            .bind(user_id)
            .bind(source)
            .bind(source_id)
            .bind(kind)
            .fetch_one(&mut **tx)
            .await?;
            sum += part;
        }

        Ok(sum)
    }

    /// Remove every ledger row of one source entity with one of `kinds`.
    /// Returns the `(user_id, amount)` of each removed row.
    pub(crate) async fn delete_entries(
        tx: &mut Tx<'_>,
        source: &str,
        source_id: &str,
        kinds: &[&str],
    ) -> Result<Vec<(i64, i64)>> {
        let mut removed = Vec::new();
        for kind in kinds {
            let rows: Vec<(i64, i64)> = sqlx::query_as(
                r#"
                DELETE FROM xp_ledger
                WHERE source = $1 AND source_id = $2 AND kind = $3
                RETURNING user_id, amount
                "#,
            )
            .bind(source)
            .bind(source_id)
            .bind(kind)
            .fetch_all(&mut **tx)
            .await?;
            removed.extend(rows);
        }

        Ok(removed)
    }

    /// Current ledger balance of a user.
    pub(crate) async fn ledger_balance(tx: &mut Tx<'_>, user_id: i64) -> Result<i64> {
        let balance: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0) FROM xp_ledger WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&mut **tx)
                .await?;

        Ok(balance)
    }

    /// Recompute the cached `xp`, `xp_mensal` and `level` of a user from the
    /// ledger. A balance below 0 is zeroed with an adjustment row so it never
    /// eats into later awards; the monthly total is floored at 0 as it runs.
    pub(crate) async fn sync_user_totals(
        &self,
        tx: &mut Tx<'_>,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<UserTotals> {
        let balance = Self::ledger_balance(tx, user_id).await?;
        if balance < 0 {
            let adjustment = NewEntry {
                user_id,
                source: names::SOURCE_AJUSTE,
                source_id: Ulid::new().to_string(),
                kind: names::KIND_SALDO_ZERADO,
                amount: -balance,
                description: "Saldo negativo zerado".to_string(),
            };
            Self::append_entry(tx, &adjustment, now).await?;
        }

        let monthly: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT amount FROM xp_ledger
            WHERE user_id = $1 AND created_at >= $2 AND source != $3
            ORDER BY created_at, id
            "#,
        )
        .bind(user_id)
        .bind(month_start(now))
        .bind(names::SOURCE_AJUSTE)
        .fetch_all(&mut **tx)
        .await?;

        let xp = balance.max(0);
        let totals = UserTotals {
            xp,
            xp_mensal: monthly_running_total(monthly),
            level: self.levels.level(xp),
        };

        let updated = sqlx::query(
            r#"
            UPDATE users SET xp = $1, xp_mensal = $2, xp_mensal_month = $3, level = $4
            WHERE id = $5
            "#,
        )
        .bind(totals.xp)
        .bind(totals.xp_mensal)
        .bind(month_key(now))
        .bind(totals.level)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

        if updated.rows_affected() == 0 {
            color_eyre::eyre::bail!("user {user_id} not found while syncing xp totals");
        }

        tracing::debug!(
            user_id,
            xp = totals.xp,
            xp_mensal = totals.xp_mensal,
            level = totals.level,
            "user xp totals synced"
        );
        Ok(totals)
    }

    /// Append one entry and refresh the owner's totals in a single transaction.
    pub async fn award(&self, entry: NewEntry<'_>, now: DateTime<Utc>) -> Result<(bool, UserTotals)> {
        let mut tx = self.pool.begin().await?;
        let written = Self::append_entry(&mut tx, &entry, now).await?;
        let totals = self.sync_user_totals(&mut tx, entry.user_id, now).await?;
        tx.commit().await?;
        Ok((written, totals))
    }

    /// Cached totals as of `now`; a monthly total cached for an earlier month
    /// reads as 0.
    pub async fn user_totals(&self, user_id: i64, now: DateTime<Utc>) -> Result<UserTotals> {
        let totals = sqlx::query_as::<_, UserTotals>(
            r#"
            SELECT xp, CASE WHEN xp_mensal_month = $2 THEN xp_mensal ELSE 0 END AS xp_mensal, level
            FROM users WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(month_key(now))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_eyre("user not found")?;

        Ok(totals)
    }

    pub async fn ledger_total(&self, user_id: i64) -> Result<i64> {
        let sum: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0) FROM xp_ledger WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(sum)
    }

    /// Most recent ledger entries of a user.
    pub async fn ledger_for_user(&self, user_id: i64, limit: i64) -> Result<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT id, user_id, source, source_id, kind, amount, description, created_at
            FROM xp_ledger
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Recompute cached totals for every user. Run at startup and on demand.
    pub async fn recalculate_all_totals(&self, now: DateTime<Utc>) -> Result<usize> {
        let user_ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        let mut tx = self.pool.begin().await?;
        for user_id in &user_ids {
            self.sync_user_totals(&mut tx, *user_id, now).await?;
        }
        tx.commit().await?;

        tracing::info!("xp totals recalculated for {} users", user_ids.len());
        Ok(user_ids.len())
    }
}
