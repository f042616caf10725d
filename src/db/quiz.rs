use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde_json::json;

use super::ledger::NewEntry;
use super::models::{Quiz, QuizQuestion, UserTotals};
use super::Db;
use crate::{models::GeneratedQuiz, names};

impl Db {
    /// Insert a quiz with all its questions atomically.
    pub async fn create_quiz(
        &self,
        quiz: &GeneratedQuiz,
        technology: &str,
        level: &str,
        max_xp: i64,
        created_by: i64,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let quiz_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO quizzes (title, technology, level, max_xp, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&quiz.title)
        .bind(technology)
        .bind(level)
        .bind(max_xp)
        .bind(created_by)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        for (position, question) in quiz.questions.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO quiz_questions (quiz_id, position, prompt, options, correct_option, explanation)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(quiz_id)
            .bind(position as i64)
            .bind(&question.prompt)
            .bind(serde_json::to_string(&question.options)?)
            .bind(question.correct_option as i64)
            .bind(&question.explanation)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            "new quiz created with id: {quiz_id} ({} questions) for user_id: {created_by}",
            quiz.questions.len()
        );
        Ok(quiz_id)
    }

    pub async fn get_quiz(&self, quiz_id: i64) -> Result<Option<Quiz>> {
        let quiz = sqlx::query_as::<_, Quiz>(
            "SELECT id, title, technology, level, max_xp, created_at FROM quizzes WHERE id = $1",
        )
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(quiz)
    }

    pub async fn quiz_questions(&self, quiz_id: i64) -> Result<Vec<QuizQuestion>> {
        let questions = sqlx::query_as::<_, QuizQuestion>(
            r#"
            SELECT id, position, prompt, options, correct_option, explanation
            FROM quiz_questions
            WHERE quiz_id = $1
            ORDER BY position
            "#,
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(questions)
    }

    /// Store an attempt and, when it earned anything, its ledger entry.
    /// Attempts are repeatable; each one is its own ledger key.
    pub async fn record_quiz_attempt(
        &self,
        quiz: &Quiz,
        user_id: i64,
        answers: &[i64],
        score_percent: f64,
        xp_awarded: i64,
        now: DateTime<Utc>,
    ) -> Result<(i64, UserTotals)> {
        let mut tx = self.pool.begin().await?;

        let attempt_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO quiz_attempts (quiz_id, user_id, answers, score_percent, xp_awarded, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(quiz.id)
        .bind(user_id)
        .bind(json!(answers).to_string())
        .bind(score_percent)
        .bind(xp_awarded)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        if xp_awarded > 0 {
            let entry = NewEntry {
                user_id,
                source: names::SOURCE_QUIZ,
                source_id: attempt_id.to_string(),
                kind: names::KIND_QUIZ_ATTEMPT,
                amount: xp_awarded,
                description: format!("Quiz \"{}\": {score_percent:.0}%", quiz.title),
            };
            Self::append_entry(&mut tx, &entry, now).await?;
        }

        let totals = self.sync_user_totals(&mut tx, user_id, now).await?;
        tx.commit().await?;

        tracing::info!(
            "quiz attempt {attempt_id} recorded: quiz={} user_id={user_id} score={score_percent:.1} xp={xp_awarded}",
            quiz.id
        );
        Ok((attempt_id, totals))
    }
}
