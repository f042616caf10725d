use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use crate::{
    extractors::AuthGuard,
    names,
    rejections::{AppError, ResultExt},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list))
        .route("/notifications/{id}/read", post(mark_read))
}

async fn list(
    AuthGuard(user): AuthGuard,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let notifications = state
        .db
        .notifications_for(user.id, names::NOTIFICATIONS_LIMIT)
        .await
        .reject("could not get notifications")?;

    Ok(Json(json!({ "success": true, "notifications": notifications })))
}

async fn mark_read(
    AuthGuard(user): AuthGuard,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let marked = state
        .db
        .mark_notification_read(id, user.id, Utc::now())
        .await
        .reject("could not mark notification as read")?;

    if !marked {
        return Err(AppError::NotFound("errors.notification_not_found"));
    }
    Ok(Json(json!({ "success": true })))
}
