use chrono::{DateTime, Utc};
use color_eyre::Result;
use ulid::Ulid;

use super::models::{AuthUser, UserSummary};
use super::Db;
use crate::names;
use crate::xp::ranking::month_key;

impl Db {
    pub async fn create_user(
        &self,
        email: &str,
        display_name: &str,
        role: &str,
        access_tier: &str,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let user_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO users (email, display_name, role, access_tier, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(email)
        .bind(display_name)
        .bind(role)
        .bind(access_tier)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!("new user created: id={user_id}, email={email}, role={role}");
        Ok(user_id)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<AuthUser>> {
        let user = sqlx::query_as::<_, AuthUser>(
            "SELECT id, email, display_name, role, access_tier FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    /// Register a bearer token issued by the identity provider.
    pub async fn create_token(&self, user_id: i64, now: DateTime<Utc>) -> Result<String> {
        let token = Ulid::new().to_string();

        sqlx::query("INSERT INTO auth_tokens (token, user_id, created_at) VALUES ($1, $2, $3)")
            .bind(&token)
            .bind(user_id)
            .bind(now)
            .execute(&self.pool)
            .await?;

        tracing::info!("new bearer token registered for user_id={user_id}");
        Ok(token)
    }

    pub async fn get_user_by_token(&self, token: &str) -> Result<Option<AuthUser>> {
        let user = sqlx::query_as::<_, AuthUser>(
            r#"
            SELECT u.id, u.email, u.display_name, u.role, u.access_tier
            FROM auth_tokens t
            JOIN users u ON u.id = t.user_id
            WHERE t.token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Profile with totals as of `now`; see [`Db::user_totals`].
    pub async fn user_summary(&self, user_id: i64, now: DateTime<Utc>) -> Result<Option<UserSummary>> {
        let user = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT id, email, display_name, role, access_tier, xp,
                   CASE WHEN xp_mensal_month = $2 THEN xp_mensal ELSE 0 END AS xp_mensal,
                   level
            FROM users WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(month_key(now))
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Create an admin account for `email` unless it exists. Returns a fresh
    /// token only when the account was created.
    pub async fn bootstrap_admin(&self, email: &str, now: DateTime<Utc>) -> Result<Option<String>> {
        if self.email_exists(email).await? {
            tracing::info!("bootstrap admin {email} already exists, skipping");
            return Ok(None);
        }

        let user_id = self
            .create_user(email, "Admin", names::ROLE_ADMIN, names::TIER_FULL, now)
            .await?;
        let token = self.create_token(user_id, now).await?;
        Ok(Some(token))
    }
}
