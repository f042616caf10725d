use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::{
    extractors::AdminGuard,
    names,
    rejections::{AppError, ResultExt},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users).post(create_user))
        .route("/admin/users/{id}/access", patch(set_access))
        .route("/admin/bonus", post(grant_bonus))
        .route("/admin/xp/recalculate", post(recalculate))
}

async fn list_users(
    AdminGuard(_admin): AdminGuard,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let users = state
        .db
        .list_users(Utc::now())
        .await
        .reject("could not get users")?;

    Ok(Json(json!({ "success": true, "users": users })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserBody {
    email: String,
    display_name: String,
    role: Option<String>,
    access_tier: Option<String>,
}

async fn create_user(
    AdminGuard(admin): AdminGuard,
    State(state): State<AppState>,
    Json(body): Json<CreateUserBody>,
) -> Result<impl IntoResponse, AppError> {
    let email = body.email.trim().to_lowercase();
    let display_name = body.display_name.trim();
    if !email.contains('@') || display_name.is_empty() {
        return Err(AppError::Input("errors.email_name_required"));
    }

    let role = body.role.as_deref().unwrap_or(names::ROLE_STUDENT);
    if role != names::ROLE_STUDENT && role != names::ROLE_ADMIN {
        return Err(AppError::Input("errors.invalid_role"));
    }
    let access_tier = body.access_tier.as_deref().unwrap_or(names::TIER_LIMITED);
    if !valid_tier(access_tier) {
        return Err(AppError::Input("errors.invalid_access_tier"));
    }

    if state
        .db
        .email_exists(&email)
        .await
        .reject("could not check email")?
    {
        return Err(AppError::Conflict("errors.email_taken"));
    }

    let now = Utc::now();
    let user_id = state
        .db
        .create_user(&email, display_name, role, access_tier, now)
        .await
        .reject("could not create user")?;
    let token = state
        .db
        .create_token(user_id, now)
        .await
        .reject("could not create token")?;

    tracing::info!("user_id={user_id} created by admin user_id={}", admin.id);
    Ok(Json(json!({
        "success": true,
        "userId": user_id,
        "token": token,
    })))
}

fn valid_tier(tier: &str) -> bool {
    tier == names::TIER_FULL || tier == names::TIER_LIMITED
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessBody {
    access_tier: String,
}

async fn set_access(
    AdminGuard(_admin): AdminGuard,
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(body): Json<AccessBody>,
) -> Result<impl IntoResponse, AppError> {
    if !valid_tier(&body.access_tier) {
        return Err(AppError::Input("errors.invalid_access_tier"));
    }

    let updated = state
        .db
        .set_access_tier(user_id, &body.access_tier)
        .await
        .reject("could not set access tier")?;

    if !updated {
        return Err(AppError::NotFound("errors.user_not_found"));
    }
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
struct BonusBody {
    emails: Vec<String>,
    amount: i64,
    reason: String,
}

async fn grant_bonus(
    AdminGuard(admin): AdminGuard,
    State(state): State<AppState>,
    Json(body): Json<BonusBody>,
) -> Result<impl IntoResponse, AppError> {
    if body.amount <= 0 {
        return Err(AppError::Input("errors.bonus_amount_positive"));
    }
    let reason = body.reason.trim();
    if reason.is_empty() {
        return Err(AppError::Input("errors.bonus_reason_required"));
    }
    if body.emails.is_empty() {
        return Err(AppError::Input("errors.bonus_emails_required"));
    }

    let mut granted = Vec::new();
    let mut not_found = Vec::new();
    for email in &body.emails {
        let email = email.trim().to_lowercase();
        let Some(user) = state
            .db
            .find_user_by_email(&email)
            .await
            .reject("could not find user by email")?
        else {
            tracing::warn!("bonus skipped, no user with email {email}");
            not_found.push(email);
            continue;
        };

        let totals = state
            .db
            .grant_bonus(user.id, body.amount, reason, admin.id, Utc::now())
            .await
            .reject("could not grant bonus")?;
        granted.push(json!({ "email": email, "userId": user.id, "totals": totals }));
    }

    Ok(Json(json!({
        "success": true,
        "granted": granted,
        "notFound": not_found,
    })))
}

async fn recalculate(
    AdminGuard(admin): AdminGuard,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let users = state
        .db
        .recalculate_all_totals(Utc::now())
        .await
        .reject("could not recalculate xp totals")?;

    tracing::info!("xp totals recalculated by admin user_id={}", admin.id);
    Ok(Json(json!({ "success": true, "users": users })))
}
