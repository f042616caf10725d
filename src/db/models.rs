// Database model structs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::types::Json;

use crate::names;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub access_tier: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == names::ROLE_ADMIN
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub access_tier: String,
    pub xp: i64,
    pub xp_mensal: i64,
    pub level: i64,
}

/// Cached totals after a ledger mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserTotals {
    pub xp: i64,
    pub xp_mensal: i64,
    pub level: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: i64,
    pub source: String,
    pub source_id: String,
    pub kind: String,
    pub amount: i64,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: i64,
    pub title: String,
    pub technology: String,
    pub level: String,
    pub max_xp: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QuizQuestion {
    pub id: i64,
    pub position: i64,
    pub prompt: String,
    pub options: Json<Vec<String>>,
    pub correct_option: i64,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Desafio {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub technology: String,
    pub level: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: i64,
    pub desafio_id: i64,
    pub user_id: i64,
    pub content: String,
    pub status: String,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Pergunta {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Resposta {
    pub id: i64,
    pub pergunta_id: i64,
    pub user_id: i64,
    pub parent_id: Option<i64>,
    pub body: String,
    pub is_accepted: bool,
    pub created_at: DateTime<Utc>,
}

impl Resposta {
    /// Direct responses earn XP; comments nested under a response do not.
    pub fn is_direct(&self) -> bool {
        self.parent_id.is_none()
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub kind: String,
    pub payload: Json<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}
