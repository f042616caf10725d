use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde_json::json;

use super::helpers::{is_unique_violation, Tx};
use super::ledger::NewEntry;
use super::models::{Pergunta, Resposta};
use super::Db;
use crate::names;
use crate::services::community::CommunityRepository;

const RESPOSTA_KINDS: [&str; 2] = [names::KIND_RESPOSTA, names::KIND_RESPOSTA_CERTA];

impl Db {
    /// Votes per response of a question as `(resposta_id, score)`.
    pub async fn vote_scores(&self, pergunta_id: i64) -> Result<Vec<(i64, i64)>> {
        let scores = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT r.id, COALESCE(SUM(v.value), 0)
            FROM respostas r
            LEFT JOIN votos v ON v.resposta_id = r.id
            WHERE r.pergunta_id = $1
            GROUP BY r.id
            ORDER BY r.id
            "#,
        )
        .bind(pergunta_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(scores)
    }

    /// Remove the ledger rows and votes of one response, then the response.
    /// Returns the `(user_id, amount)` of the removed ledger rows.
    async fn purge_resposta(tx: &mut Tx<'_>, resposta_id: i64) -> Result<Vec<(i64, i64)>> {
        let removed = Self::delete_entries(
            tx,
            names::SOURCE_COMUNIDADE,
            &resposta_id.to_string(),
            &RESPOSTA_KINDS,
        )
        .await?;

        sqlx::query("DELETE FROM votos WHERE resposta_id = $1")
            .bind(resposta_id)
            .execute(&mut **tx)
            .await?;

        sqlx::query("DELETE FROM respostas WHERE id = $1")
            .bind(resposta_id)
            .execute(&mut **tx)
            .await?;

        Ok(removed)
    }
}

/// XP each user lost, from the removed `(user_id, amount)` ledger rows.
fn revert_totals(removed: Vec<(i64, i64)>) -> BTreeMap<i64, i64> {
    let mut reverted = BTreeMap::new();
    for (user_id, amount) in removed {
        *reverted.entry(user_id).or_insert(0) += amount;
    }
    reverted
}

impl CommunityRepository for Db {
    async fn find_pergunta(&self, pergunta_id: i64) -> Result<Option<Pergunta>> {
        let pergunta = sqlx::query_as::<_, Pergunta>(
            "SELECT id, user_id, title, body, created_at FROM perguntas WHERE id = $1",
        )
        .bind(pergunta_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(pergunta)
    }

    async fn find_resposta(&self, resposta_id: i64) -> Result<Option<Resposta>> {
        let resposta = sqlx::query_as::<_, Resposta>(
            r#"
            SELECT id, pergunta_id, user_id, parent_id, body, is_accepted, created_at
            FROM respostas WHERE id = $1
            "#,
        )
        .bind(resposta_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(resposta)
    }

    async fn respostas_for(&self, pergunta_id: i64) -> Result<Vec<Resposta>> {
        let respostas = sqlx::query_as::<_, Resposta>(
            r#"
            SELECT id, pergunta_id, user_id, parent_id, body, is_accepted, created_at
            FROM respostas
            WHERE pergunta_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(pergunta_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(respostas)
    }

    async fn has_comments(&self, resposta_id: i64) -> Result<bool> {
        let has: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM respostas WHERE parent_id = $1)")
                .bind(resposta_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(has)
    }

    async fn insert_pergunta(
        &self,
        author_id: i64,
        title: &str,
        body: &str,
        award: i64,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let pergunta_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO perguntas (user_id, title, body, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(author_id)
        .bind(title)
        .bind(body)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let entry = NewEntry {
            user_id: author_id,
            source: names::SOURCE_COMUNIDADE,
            source_id: pergunta_id.to_string(),
            kind: names::KIND_PERGUNTA,
            amount: award,
            description: format!("Pergunta: {title}"),
        };
        Self::append_entry(&mut tx, &entry, now).await?;
        self.sync_user_totals(&mut tx, author_id, now).await?;

        tx.commit().await?;

        tracing::info!("pergunta {pergunta_id} created by user_id={author_id}");
        Ok(pergunta_id)
    }

    async fn insert_resposta(
        &self,
        pergunta: &Pergunta,
        author_id: i64,
        parent_id: Option<i64>,
        body: &str,
        award: i64,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let resposta_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO respostas (pergunta_id, user_id, parent_id, body, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(pergunta.id)
        .bind(author_id)
        .bind(parent_id)
        .bind(body)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        if award > 0 {
            let entry = NewEntry {
                user_id: author_id,
                source: names::SOURCE_COMUNIDADE,
                source_id: resposta_id.to_string(),
                kind: names::KIND_RESPOSTA,
                amount: award,
                description: format!("Resposta em: {}", pergunta.title),
            };
            Self::append_entry(&mut tx, &entry, now).await?;
            self.sync_user_totals(&mut tx, author_id, now).await?;
        }

        if pergunta.user_id != author_id {
            Self::push_notification(
                &mut tx,
                pergunta.user_id,
                names::NOTIFY_RESPOSTA_NOVA,
                &json!({ "pergunta_id": pergunta.id, "resposta_id": resposta_id }),
                now,
            )
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            "resposta {resposta_id} on pergunta {} created by user_id={author_id}",
            pergunta.id
        );
        Ok(resposta_id)
    }

    async fn accept_resposta(
        &self,
        resposta: &Resposta,
        target: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<i64>> {
        let mut tx = self.pool.begin().await?;

        let accepted: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM respostas WHERE pergunta_id = $1 AND is_accepted = 1",
        )
        .bind(resposta.pergunta_id)
        .fetch_optional(&mut *tx)
        .await?;

        match accepted {
            Some(id) if id != resposta.id => {
                tracing::warn!(
                    "resposta {} not accepted: resposta {id} already accepted",
                    resposta.id
                );
                return Ok(None);
            }
            Some(_) => {}
            None => {
                let marked = sqlx::query("UPDATE respostas SET is_accepted = 1 WHERE id = $1")
                    .bind(resposta.id)
                    .execute(&mut *tx)
                    .await;
                match marked {
                    Ok(_) => {}
                    // a concurrent accept won the race on the partial unique index
                    Err(e) if is_unique_violation(&e) => return Ok(None),
                    Err(e) => return Err(e.into()),
                }
            }
        }

        let source_id = resposta.id.to_string();
        let already = Self::ledger_sum_for_source(
            &mut tx,
            resposta.user_id,
            names::SOURCE_COMUNIDADE,
            &source_id,
            &RESPOSTA_KINDS,
        )
        .await?;
        let topup = crate::xp::rules::accepted_topup(target, already);

        let mut awarded = 0;
        if topup > 0 {
            let entry = NewEntry {
                user_id: resposta.user_id,
                source: names::SOURCE_COMUNIDADE,
                source_id,
                kind: names::KIND_RESPOSTA_CERTA,
                amount: topup,
                description: "Resposta aceita".to_string(),
            };
            if Self::append_entry(&mut tx, &entry, now).await? {
                awarded = topup;
            }
            self.sync_user_totals(&mut tx, resposta.user_id, now).await?;
        }

        if accepted.is_none() {
            Self::push_notification(
                &mut tx,
                resposta.user_id,
                names::NOTIFY_RESPOSTA_ACEITA,
                &json!({ "pergunta_id": resposta.pergunta_id, "resposta_id": resposta.id, "xp": awarded }),
                now,
            )
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            "resposta {} accepted, user_id={} topped up by {awarded}",
            resposta.id,
            resposta.user_id
        );
        Ok(Some(awarded))
    }

    async fn delete_resposta(&self, resposta: &Resposta, now: DateTime<Utc>) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let reverted_by_user = revert_totals(Self::purge_resposta(&mut tx, resposta.id).await?);
        for user_id in reverted_by_user.keys() {
            self.sync_user_totals(&mut tx, *user_id, now).await?;
        }
        let reverted = reverted_by_user.get(&resposta.user_id).copied().unwrap_or(0);

        tx.commit().await?;

        tracing::info!(
            "resposta {} deleted by its author, {reverted} xp reverted",
            resposta.id
        );
        Ok(reverted)
    }

    async fn delete_pergunta(
        &self,
        pergunta: &Pergunta,
        respostas: &[Resposta],
        now: DateTime<Utc>,
    ) -> Result<BTreeMap<i64, i64>> {
        let mut tx = self.pool.begin().await?;

        let mut removed = Self::delete_entries(
            &mut tx,
            names::SOURCE_COMUNIDADE,
            &pergunta.id.to_string(),
            &[names::KIND_PERGUNTA],
        )
        .await?;

        // comments first, they reference their parent response
        let (direct, comments): (Vec<&Resposta>, Vec<&Resposta>) =
            respostas.iter().partition(|r| r.is_direct());
        for resposta in comments.into_iter().chain(direct) {
            removed.extend(Self::purge_resposta(&mut tx, resposta.id).await?);
        }

        // anything inserted after the caller loaded the list
        sqlx::query(
            r#"
            DELETE FROM votos WHERE resposta_id IN (SELECT id FROM respostas WHERE pergunta_id = $1)
            "#,
        )
        .bind(pergunta.id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM respostas WHERE pergunta_id = $1 AND parent_id IS NOT NULL")
            .bind(pergunta.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM respostas WHERE pergunta_id = $1")
            .bind(pergunta.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM perguntas WHERE id = $1")
            .bind(pergunta.id)
            .execute(&mut *tx)
            .await?;

        let reverted = revert_totals(removed);
        for user_id in reverted.keys() {
            self.sync_user_totals(&mut tx, *user_id, now).await?;
        }

        tx.commit().await?;

        tracing::info!(
            "pergunta {} deleted with {} respostas, totals refreshed for {} users",
            pergunta.id,
            respostas.len(),
            reverted.len()
        );
        Ok(reverted)
    }

    async fn upsert_vote(
        &self,
        resposta_id: i64,
        user_id: i64,
        value: i64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO votos (user_id, resposta_id, value, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, resposta_id) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(user_id)
        .bind(resposta_id)
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await?;

        tracing::debug!("vote {value} on resposta {resposta_id} by user_id={user_id}");
        Ok(())
    }
}
