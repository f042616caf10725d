// Database module - provides data access layer

use std::{str::FromStr, sync::Arc};

use color_eyre::{eyre::ensure, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::xp::LevelTable;

// Re-export models for convenience
pub mod models;
pub use models::*;

// Internal modules
mod admin;
mod community;
mod desafio;
mod forms;
mod helpers;
mod ledger;
mod migrations;
mod notifications;
mod quiz;
mod ranking;
mod user;

pub use ledger::NewEntry;

// Main database handle
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
    levels: Arc<LevelTable>,
}

impl Db {
    /// Connect to `url` (e.g. `sqlite://coderank.db`), creating the file if
    /// needed, and bring the schema up to date.
    pub async fn new(url: &str, levels: LevelTable) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        // Verify connection
        let one: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&pool).await?;
        ensure!(one == 1, "connection check failed");

        migrations::run(&pool).await?;

        tracing::info!("database connection has been verified");

        Ok(Self {
            pool,
            levels: Arc::new(levels),
        })
    }

    pub fn levels(&self) -> &LevelTable {
        &self.levels
    }

    pub async fn migration_applied(&self, version: &str) -> Result<bool> {
        let applied: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM schema_migrations WHERE version = $1)",
        )
        .bind(version)
        .fetch_one(&self.pool)
        .await?;

        Ok(applied)
    }
}
