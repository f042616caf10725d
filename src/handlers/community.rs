use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    extractors::AuthGuard,
    rejections::{AppError, ResultExt},
    services::community::{
        AcceptOutcome, AnswerOutcome, AskOutcome, CommunityRepository, DeleteAnswerOutcome,
        DeleteQuestionOutcome, VoteOutcome,
    },
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/perguntas", post(ask))
        .route("/perguntas/{id}", get(get_pergunta).delete(delete_pergunta))
        .route("/perguntas/{id}/respostas", post(answer))
        .route("/respostas/{id}", delete(delete_resposta))
        .route("/respostas/{id}/accept", post(accept))
        .route("/respostas/{id}/votes", post(vote))
}

#[derive(Deserialize)]
struct AskBody {
    title: String,
    body: String,
}

async fn ask(
    AuthGuard(user): AuthGuard,
    State(state): State<AppState>,
    Json(body): Json<AskBody>,
) -> Result<impl IntoResponse, AppError> {
    match state
        .community
        .ask(user.id, &body.title, &body.body)
        .await
        .reject("could not create pergunta")?
    {
        AskOutcome::Created {
            pergunta_id,
            xp_awarded,
        } => Ok(Json(json!({
            "success": true,
            "perguntaId": pergunta_id,
            "xpAwarded": xp_awarded,
        }))),
        AskOutcome::EmptyFields => Err(AppError::Input("errors.title_body_required")),
    }
}

async fn get_pergunta(
    AuthGuard(_user): AuthGuard,
    State(state): State<AppState>,
    Path(pergunta_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let pergunta = state
        .db
        .find_pergunta(pergunta_id)
        .await
        .reject("could not get pergunta")?
        .ok_or(AppError::NotFound("errors.pergunta_not_found"))?;

    let respostas = state
        .db
        .respostas_for(pergunta_id)
        .await
        .reject("could not get respostas")?;
    let scores: HashMap<i64, i64> = state
        .db
        .vote_scores(pergunta_id)
        .await
        .reject("could not get vote scores")?
        .into_iter()
        .collect();

    let view = |r: &crate::db::models::Resposta| {
        json!({
            "id": r.id,
            "userId": r.user_id,
            "body": r.body,
            "isAccepted": r.is_accepted,
            "score": scores.get(&r.id).copied().unwrap_or(0),
            "createdAt": r.created_at,
        })
    };

    let respostas: Vec<Value> = respostas
        .iter()
        .filter(|r| r.is_direct())
        .map(|direct| {
            let comments: Vec<Value> = respostas
                .iter()
                .filter(|c| c.parent_id == Some(direct.id))
                .map(view)
                .collect();
            let mut item = view(direct);
            item["comments"] = json!(comments);
            item
        })
        .collect();

    Ok(Json(json!({
        "success": true,
        "pergunta": pergunta,
        "respostas": respostas,
    })))
}

async fn delete_pergunta(
    AuthGuard(user): AuthGuard,
    State(state): State<AppState>,
    Path(pergunta_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    match state
        .community
        .delete_question(user.id, user.is_admin(), pergunta_id)
        .await
        .reject("could not delete pergunta")?
    {
        DeleteQuestionOutcome::Deleted { reverted } => {
            let reverted: Vec<Value> = reverted
                .into_iter()
                .map(|(user_id, xp)| json!({ "userId": user_id, "xp": xp }))
                .collect();
            Ok(Json(json!({ "success": true, "reverted": reverted })))
        }
        DeleteQuestionOutcome::NotFound => Err(AppError::NotFound("errors.pergunta_not_found")),
        DeleteQuestionOutcome::Forbidden => Err(AppError::Forbidden("errors.not_pergunta_owner")),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnswerBody {
    body: String,
    parent_id: Option<i64>,
}

async fn answer(
    AuthGuard(user): AuthGuard,
    State(state): State<AppState>,
    Path(pergunta_id): Path<i64>,
    Json(body): Json<AnswerBody>,
) -> Result<impl IntoResponse, AppError> {
    match state
        .community
        .answer(user.id, pergunta_id, body.parent_id, &body.body)
        .await
        .reject("could not create resposta")?
    {
        AnswerOutcome::Created {
            resposta_id,
            xp_awarded,
        } => Ok(Json(json!({
            "success": true,
            "respostaId": resposta_id,
            "xpAwarded": xp_awarded,
        }))),
        AnswerOutcome::EmptyBody => Err(AppError::Input("errors.body_required")),
        AnswerOutcome::PerguntaNotFound => Err(AppError::NotFound("errors.pergunta_not_found")),
        AnswerOutcome::ParentNotFound => Err(AppError::NotFound("errors.resposta_not_found")),
        AnswerOutcome::NestedComment => Err(AppError::Input("errors.nested_comment")),
    }
}

async fn delete_resposta(
    AuthGuard(user): AuthGuard,
    State(state): State<AppState>,
    Path(resposta_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    match state
        .community
        .delete_answer(user.id, resposta_id)
        .await
        .reject("could not delete resposta")?
    {
        DeleteAnswerOutcome::Deleted { xp_reverted } => Ok(Json(json!({
            "success": true,
            "xpReverted": xp_reverted,
        }))),
        DeleteAnswerOutcome::NotFound => Err(AppError::NotFound("errors.resposta_not_found")),
        DeleteAnswerOutcome::NotAuthor => Err(AppError::Forbidden("errors.not_resposta_owner")),
        DeleteAnswerOutcome::IsAccepted => Err(AppError::Conflict("errors.resposta_accepted")),
        DeleteAnswerOutcome::HasComments => Err(AppError::Conflict("errors.resposta_has_comments")),
    }
}

async fn accept(
    AuthGuard(user): AuthGuard,
    State(state): State<AppState>,
    Path(resposta_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    match state
        .community
        .accept(user.id, resposta_id)
        .await
        .reject("could not accept resposta")?
    {
        AcceptOutcome::Accepted {
            author_id,
            xp_awarded,
        } => Ok(Json(json!({
            "success": true,
            "authorId": author_id,
            "xpAwarded": xp_awarded,
        }))),
        AcceptOutcome::NotFound => Err(AppError::NotFound("errors.resposta_not_found")),
        AcceptOutcome::NotQuestionAuthor => {
            Err(AppError::Forbidden("errors.not_pergunta_owner"))
        }
        AcceptOutcome::OwnAnswer => Err(AppError::Forbidden("errors.accept_own_resposta")),
        AcceptOutcome::IsComment => Err(AppError::Input("errors.accept_comment")),
        AcceptOutcome::OtherAlreadyAccepted => {
            Err(AppError::Conflict("errors.other_resposta_accepted"))
        }
    }
}

#[derive(Deserialize)]
struct VoteBody {
    value: i64,
}

async fn vote(
    AuthGuard(user): AuthGuard,
    State(state): State<AppState>,
    Path(resposta_id): Path<i64>,
    Json(body): Json<VoteBody>,
) -> Result<impl IntoResponse, AppError> {
    match state
        .community
        .vote(user.id, resposta_id, body.value)
        .await
        .reject("could not record vote")?
    {
        VoteOutcome::Recorded => Ok(Json(json!({ "success": true }))),
        VoteOutcome::NotFound => Err(AppError::NotFound("errors.resposta_not_found")),
        VoteOutcome::InvalidValue => Err(AppError::Input("errors.invalid_vote")),
        VoteOutcome::OwnAnswer => Err(AppError::Forbidden("errors.vote_own_resposta")),
    }
}
