use chrono::{DateTime, Utc};
use color_eyre::Result;

use super::Db;
use crate::names;
use crate::xp::ranking::{assign_positions, month_key, MonthlyTotal, RankingRow, RankingType};

impl Db {
    /// Leaderboard of full-access students. Equal XP is ordered by user id.
    /// A monthly total cached for an earlier month counts as 0.
    pub async fn ranking(
        &self,
        ranking_type: RankingType,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<RankingRow>> {
        let rows: Vec<(i64, String, i64, i64)> = match ranking_type {
            RankingType::Geral => {
                sqlx::query_as(
                    r#"
                    SELECT id, display_name, level, xp
                    FROM users
                    WHERE role = $1 AND access_tier = $2
                    ORDER BY xp DESC, id ASC
                    LIMIT $3
                    "#,
                )
                .bind(names::ROLE_STUDENT)
                .bind(names::TIER_FULL)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            RankingType::Mensal => {
                sqlx::query_as(
                    r#"
                    SELECT id, display_name, level,
                           CASE WHEN xp_mensal_month = $3 THEN xp_mensal ELSE 0 END AS mensal
                    FROM users
                    WHERE role = $1 AND access_tier = $2
                    ORDER BY mensal DESC, id ASC
                    LIMIT $4
                    "#,
                )
                .bind(names::ROLE_STUDENT)
                .bind(names::TIER_FULL)
                .bind(month_key(now))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(assign_positions(rows))
    }

    /// Per-user ledger sums of every month that ended before `cutoff`.
    /// Balance adjustments are not earned XP and are left out.
    pub async fn monthly_totals_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<MonthlyTotal>> {
        let totals = sqlx::query_as::<_, MonthlyTotal>(
            r#"
            SELECT
                CAST(strftime('%Y', created_at) AS INTEGER) AS year,
                CAST(strftime('%m', created_at) AS INTEGER) AS month,
                user_id,
                SUM(amount) AS xp
            FROM xp_ledger
            WHERE created_at < $1 AND source != $2
            GROUP BY year, month, user_id
            "#,
        )
        .bind(cutoff)
        .bind(names::SOURCE_AJUSTE)
        .fetch_all(&self.pool)
        .await?;

        Ok(totals)
    }

    pub async fn display_name(&self, user_id: i64) -> Result<Option<String>> {
        let name: Option<String> =
            sqlx::query_scalar("SELECT display_name FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(name)
    }
}
