#![allow(dead_code)]

use chrono::Utc;
use coderank::{
    db::Db,
    names,
    services::generator::HttpContentGenerator,
    xp::{LevelTable, Rewards},
    AppState,
};

pub async fn create_test_db() -> Db {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let id = COUNTER.fetch_add(1, Ordering::SeqCst);
    let path =
        std::env::temp_dir().join(format!("coderank_test_{}_{}.db", std::process::id(), id));
    // Clean up leftover file from previous runs
    let _ = std::fs::remove_file(&path);
    let url = format!("sqlite://{}", path.display());
    Db::new(&url, LevelTable::default())
        .await
        .expect("failed to create test database")
}

pub async fn create_student(db: &Db, email: &str) -> i64 {
    db.create_user(email, email, names::ROLE_STUDENT, names::TIER_FULL, Utc::now())
        .await
        .expect("create student")
}

pub async fn create_admin(db: &Db, email: &str) -> i64 {
    db.create_user(email, email, names::ROLE_ADMIN, names::TIER_FULL, Utc::now())
        .await
        .expect("create admin")
}

pub async fn token_for(db: &Db, user_id: i64) -> String {
    db.create_token(user_id, Utc::now())
        .await
        .expect("create token")
}

/// App state with the content generator switched off.
pub fn test_state(db: Db, expose_error_details: bool) -> AppState {
    let generator = HttpContentGenerator::new(None, String::new(), "test".to_string());
    AppState::new(db, Rewards::default(), generator, expose_error_details)
}
