use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde_json::json;

use super::helpers::is_unique_violation;
use super::ledger::NewEntry;
use super::models::{Desafio, Submission};
use super::Db;
use crate::models::GeneratedDesafio;
use crate::names;
use crate::services::challenges::ChallengeRepository;
use crate::xp::rules::capped_penalty;

impl Db {
    pub async fn create_desafio(
        &self,
        desafio: &GeneratedDesafio,
        technology: &str,
        level: &str,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let desafio_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO desafios (title, description, technology, level, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&desafio.title)
        .bind(&desafio.description)
        .bind(technology)
        .bind(level)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!("new desafio created with id: {desafio_id}");
        Ok(desafio_id)
    }

    pub async fn submissions_for(&self, user_id: i64, desafio_id: i64) -> Result<Vec<Submission>> {
        let submissions = sqlx::query_as::<_, Submission>(
            r#"
            SELECT id, desafio_id, user_id, content, status, feedback, created_at, reviewed_at
            FROM desafio_submissions
            WHERE user_id = $1 AND desafio_id = $2
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .bind(desafio_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(submissions)
    }
}

impl ChallengeRepository for Db {
    async fn find_desafio(&self, desafio_id: i64) -> Result<Option<Desafio>> {
        let desafio = sqlx::query_as::<_, Desafio>(
            "SELECT id, title, description, technology, level, created_at FROM desafios WHERE id = $1",
        )
        .bind(desafio_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(desafio)
    }

    async fn find_submission(&self, submission_id: i64) -> Result<Option<Submission>> {
        let submission = sqlx::query_as::<_, Submission>(
            r#"
            SELECT id, desafio_id, user_id, content, status, feedback, created_at, reviewed_at
            FROM desafio_submissions WHERE id = $1
            "#,
        )
        .bind(submission_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(submission)
    }

    async fn is_assigned(&self, user_id: i64, desafio_id: i64) -> Result<bool> {
        let assigned: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM desafio_assignments WHERE user_id = $1 AND desafio_id = $2)",
        )
        .bind(user_id)
        .bind(desafio_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(assigned)
    }

    async fn is_completed(&self, user_id: i64, desafio_id: i64) -> Result<bool> {
        let completed: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM desafio_progress
                WHERE user_id = $1 AND desafio_id = $2 AND completed = 1
            )
            "#,
        )
        .bind(user_id)
        .bind(desafio_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(completed)
    }

    async fn has_pending_submission(&self, user_id: i64, desafio_id: i64) -> Result<bool> {
        let pending: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM desafio_submissions
                WHERE user_id = $1 AND desafio_id = $2 AND status = $3
            )
            "#,
        )
        .bind(user_id)
        .bind(desafio_id)
        .bind(names::STATUS_PENDENTE)
        .fetch_one(&self.pool)
        .await?;

        Ok(pending)
    }

    async fn insert_assignment(
        &self,
        user_id: i64,
        desafio_id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO desafio_assignments (desafio_id, user_id, created_at) VALUES ($1, $2, $3)",
        )
        .bind(desafio_id)
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                tracing::info!("desafio {desafio_id} assigned to user_id={user_id}");
                Ok(true)
            }
            Err(e) if is_unique_violation(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn insert_submission(
        &self,
        user_id: i64,
        desafio_id: i64,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let submission_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO desafio_submissions (desafio_id, user_id, content, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(desafio_id)
        .bind(user_id)
        .bind(content)
        .bind(names::STATUS_PENDENTE)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!("submission {submission_id} for desafio {desafio_id} by user_id={user_id}");
        Ok(submission_id)
    }

    async fn approve_submission(
        &self,
        submission: &Submission,
        reviewer_id: i64,
        feedback: Option<String>,
        reward: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<i64>> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE desafio_submissions
            SET status = $1, feedback = $2, reviewed_by = $3, reviewed_at = $4
            WHERE id = $5 AND status = $6
            "#,
        )
        .bind(names::STATUS_APROVADO)
        .bind(&feedback)
        .bind(reviewer_id)
        .bind(now)
        .bind(submission.id)
        .bind(names::STATUS_PENDENTE)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tracing::warn!("submission {} is no longer pending", submission.id);
            return Ok(None);
        }

        // only the first completion of a desafio flips the progress record
        let first_completion = sqlx::query(
            r#"
            INSERT INTO desafio_progress (user_id, desafio_id, completed, completed_at)
            VALUES ($1, $2, 1, $3)
            ON CONFLICT (user_id, desafio_id) DO UPDATE
            SET completed = 1, completed_at = excluded.completed_at
            WHERE desafio_progress.completed = 0
            "#,
        )
        .bind(submission.user_id)
        .bind(submission.desafio_id)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        let mut awarded = 0;
        if first_completion {
            let entry = NewEntry {
                user_id: submission.user_id,
                source: names::SOURCE_DESAFIO,
                source_id: submission.desafio_id.to_string(),
                kind: names::KIND_DESAFIO_COMPLETO,
                amount: reward,
                description: "Desafio concluído".to_string(),
            };
            if Self::append_entry(&mut tx, &entry, now).await? {
                awarded = reward;
            }
            self.sync_user_totals(&mut tx, submission.user_id, now).await?;
        } else {
            tracing::warn!(
                "desafio {} already completed by user_id={}, no xp awarded",
                submission.desafio_id,
                submission.user_id
            );
        }

        Self::push_notification(
            &mut tx,
            submission.user_id,
            names::NOTIFY_DESAFIO_APROVADO,
            &json!({
                "desafio_id": submission.desafio_id,
                "submission_id": submission.id,
                "xp": awarded,
                "feedback": feedback,
            }),
            now,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            "submission {} approved by user_id={reviewer_id}, {awarded} xp awarded",
            submission.id
        );
        Ok(Some(awarded))
    }

    async fn reject_submission(
        &self,
        submission: &Submission,
        reviewer_id: i64,
        feedback: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE desafio_submissions
            SET status = $1, feedback = $2, reviewed_by = $3, reviewed_at = $4
            WHERE id = $5 AND status = $6
            "#,
        )
        .bind(names::STATUS_REJEITADO)
        .bind(&feedback)
        .bind(reviewer_id)
        .bind(now)
        .bind(submission.id)
        .bind(names::STATUS_PENDENTE)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(false);
        }

        Self::push_notification(
            &mut tx,
            submission.user_id,
            names::NOTIFY_DESAFIO_REJEITADO,
            &json!({
                "desafio_id": submission.desafio_id,
                "submission_id": submission.id,
                "feedback": feedback,
            }),
            now,
        )
        .await?;

        tx.commit().await?;

        tracing::info!("submission {} rejected by user_id={reviewer_id}", submission.id);
        Ok(true)
    }

    async fn abandon_submission(
        &self,
        submission: &Submission,
        penalty: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<i64>> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE desafio_submissions
            SET status = $1
            WHERE id = $2 AND status IN ($3, $4)
            "#,
        )
        .bind(names::STATUS_DESISTIU)
        .bind(submission.id)
        .bind(names::STATUS_PENDENTE)
        .bind(names::STATUS_REJEITADO)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tracing::warn!("submission {} cannot be abandoned in its current state", submission.id);
            return Ok(None);
        }

        let current_xp = Self::ledger_balance(&mut tx, submission.user_id).await?;
        let applied = capped_penalty(penalty, current_xp);
        let entry = NewEntry {
            user_id: submission.user_id,
            source: names::SOURCE_PENALIDADE_DESAFIO,
            source_id: submission.id.to_string(),
            kind: names::KIND_DESISTENCIA,
            amount: applied,
            description: "Desistência de desafio".to_string(),
        };
        Self::append_entry(&mut tx, &entry, now).await?;
        self.sync_user_totals(&mut tx, submission.user_id, now).await?;

        sqlx::query("DELETE FROM desafio_assignments WHERE user_id = $1 AND desafio_id = $2")
            .bind(submission.user_id)
            .bind(submission.desafio_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            "submission {} abandoned by user_id={}, penalty {applied} of {penalty}",
            submission.id,
            submission.user_id
        );
        Ok(Some(applied))
    }
}
