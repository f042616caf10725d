use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::{
    extractors::{AdminGuard, AuthGuard},
    rejections::{AppError, ResultExt},
    services::challenges::{
        AbandonOutcome, AssignOutcome, ChallengeRepository, ReviewOutcome, SubmitOutcome,
    },
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/desafios/generate", post(generate_desafio))
        .route("/desafios/{id}", get(get_desafio))
        .route("/desafios/{id}/assign", post(assign))
        .route("/desafios/{id}/submissions", post(submit))
        .route("/submissions/{id}/approve", post(approve))
        .route("/submissions/{id}/reject", post(reject))
        .route("/submissions/{id}/abandon", post(abandon))
}

#[derive(Deserialize)]
struct GenerateDesafioBody {
    technology: String,
    level: String,
}

async fn generate_desafio(
    AdminGuard(admin): AdminGuard,
    State(state): State<AppState>,
    Json(body): Json<GenerateDesafioBody>,
) -> Result<impl IntoResponse, AppError> {
    let technology = body.technology.trim();
    let level = body.level.trim();
    if technology.is_empty() || level.is_empty() {
        return Err(AppError::Input("errors.technology_level_required"));
    }

    let generated = state
        .generator
        .generate_desafio(technology, level)
        .await
        .reject("could not generate desafio")?;

    let desafio_id = state
        .db
        .create_desafio(&generated, technology, level, Utc::now())
        .await
        .reject("could not store generated desafio")?;

    let desafio = state
        .db
        .find_desafio(desafio_id)
        .await
        .reject("could not get desafio")?
        .ok_or(AppError::NotFound("errors.desafio_not_found"))?;

    tracing::info!("desafio {desafio_id} generated by admin user_id={}", admin.id);
    Ok(Json(json!({ "success": true, "desafio": desafio })))
}

async fn get_desafio(
    AuthGuard(user): AuthGuard,
    State(state): State<AppState>,
    Path(desafio_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let desafio = state
        .db
        .find_desafio(desafio_id)
        .await
        .reject("could not get desafio")?
        .ok_or(AppError::NotFound("errors.desafio_not_found"))?;

    let assigned = state
        .db
        .is_assigned(user.id, desafio_id)
        .await
        .reject("could not check assignment")?;
    let completed = state
        .db
        .is_completed(user.id, desafio_id)
        .await
        .reject("could not check progress")?;
    let submissions = state
        .db
        .submissions_for(user.id, desafio_id)
        .await
        .reject("could not get submissions")?;

    Ok(Json(json!({
        "success": true,
        "desafio": desafio,
        "assigned": assigned,
        "completed": completed,
        "submissions": submissions,
    })))
}

async fn assign(
    AuthGuard(user): AuthGuard,
    State(state): State<AppState>,
    Path(desafio_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    match state
        .challenges
        .assign(&user, desafio_id)
        .await
        .reject("could not assign desafio")?
    {
        AssignOutcome::Assigned => Ok(Json(json!({ "success": true }))),
        AssignOutcome::NotFound => Err(AppError::NotFound("errors.desafio_not_found")),
        AssignOutcome::NotStudent => Err(AppError::Forbidden("errors.students_only")),
        AssignOutcome::AlreadyAssigned => Err(AppError::Conflict("errors.desafio_already_assigned")),
        AssignOutcome::AlreadyCompleted => {
            Err(AppError::Conflict("errors.desafio_already_completed"))
        }
    }
}

#[derive(Deserialize)]
struct SubmitBody {
    content: String,
}

async fn submit(
    AuthGuard(user): AuthGuard,
    State(state): State<AppState>,
    Path(desafio_id): Path<i64>,
    Json(body): Json<SubmitBody>,
) -> Result<impl IntoResponse, AppError> {
    match state
        .challenges
        .submit(user.id, desafio_id, &body.content)
        .await
        .reject("could not submit desafio")?
    {
        SubmitOutcome::Submitted(submission_id) => Ok(Json(json!({
            "success": true,
            "submissionId": submission_id,
        }))),
        SubmitOutcome::NotFound => Err(AppError::NotFound("errors.desafio_not_found")),
        SubmitOutcome::EmptyContent => Err(AppError::Input("errors.content_required")),
        SubmitOutcome::NotAssigned => Err(AppError::Forbidden("errors.desafio_not_assigned")),
        SubmitOutcome::AlreadyCompleted => {
            Err(AppError::Conflict("errors.desafio_already_completed"))
        }
        SubmitOutcome::PendingExists => Err(AppError::Conflict("errors.submission_pending")),
    }
}

#[derive(Deserialize)]
struct ReviewBody {
    feedback: Option<String>,
}

fn clean_feedback(feedback: Option<String>) -> Option<String> {
    feedback
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
}

async fn approve(
    AdminGuard(admin): AdminGuard,
    State(state): State<AppState>,
    Path(submission_id): Path<i64>,
    Json(body): Json<ReviewBody>,
) -> Result<impl IntoResponse, AppError> {
    match state
        .challenges
        .approve(admin.id, submission_id, clean_feedback(body.feedback))
        .await
        .reject("could not approve submission")?
    {
        ReviewOutcome::Approved {
            user_id,
            xp_awarded,
        } => Ok(Json(json!({
            "success": true,
            "userId": user_id,
            "xpAwarded": xp_awarded,
        }))),
        ReviewOutcome::NotFound => Err(AppError::NotFound("errors.submission_not_found")),
        ReviewOutcome::NotPending | ReviewOutcome::Rejected => {
            Err(AppError::Conflict("errors.submission_not_pending"))
        }
    }
}

async fn reject(
    AdminGuard(admin): AdminGuard,
    State(state): State<AppState>,
    Path(submission_id): Path<i64>,
    Json(body): Json<ReviewBody>,
) -> Result<impl IntoResponse, AppError> {
    let Some(feedback) = clean_feedback(body.feedback) else {
        return Err(AppError::Input("errors.feedback_required"));
    };

    match state
        .challenges
        .reject(admin.id, submission_id, Some(feedback))
        .await
        .reject("could not reject submission")?
    {
        ReviewOutcome::Rejected => Ok(Json(json!({ "success": true }))),
        ReviewOutcome::NotFound => Err(AppError::NotFound("errors.submission_not_found")),
        ReviewOutcome::NotPending | ReviewOutcome::Approved { .. } => {
            Err(AppError::Conflict("errors.submission_not_pending"))
        }
    }
}

async fn abandon(
    AuthGuard(user): AuthGuard,
    State(state): State<AppState>,
    Path(submission_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    match state
        .challenges
        .abandon(user.id, submission_id)
        .await
        .reject("could not abandon submission")?
    {
        AbandonOutcome::Abandoned { penalty } => {
            let totals = state
                .db
                .user_totals(user.id, Utc::now())
                .await
                .reject("could not get user totals")?;
            Ok(Json(json!({
                "success": true,
                "penalty": penalty,
                "totals": totals,
            })))
        }
        AbandonOutcome::NotFound => Err(AppError::NotFound("errors.submission_not_found")),
        AbandonOutcome::NotOwner => Err(AppError::Forbidden("errors.not_submission_owner")),
        AbandonOutcome::InvalidState => Err(AppError::Conflict("errors.submission_not_abandonable")),
    }
}
