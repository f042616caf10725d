use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::{
    extractors::AuthGuard,
    names,
    rejections::{AppError, ResultExt},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/me/xp/history", get(history))
}

async fn me(
    AuthGuard(user): AuthGuard,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let summary = state
        .db
        .user_summary(user.id, Utc::now())
        .await
        .reject("could not get user summary")?
        .ok_or(AppError::NotFound("errors.user_not_found"))?;

    let progress = state.db.levels().progress(summary.xp);

    Ok(Json(json!({
        "success": true,
        "user": summary,
        "progress": progress,
    })))
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<i64>,
}

async fn history(
    AuthGuard(user): AuthGuard,
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, AppError> {
    let limit = query
        .limit
        .unwrap_or(names::HISTORY_LIMIT)
        .clamp(1, names::HISTORY_LIMIT);

    let entries = state
        .db
        .ledger_for_user(user.id, limit)
        .await
        .reject("could not get xp history")?;

    Ok(Json(json!({ "success": true, "entries": entries })))
}
