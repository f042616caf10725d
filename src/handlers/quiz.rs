use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    db::models::{Quiz, QuizQuestion},
    extractors::AuthGuard,
    names,
    rejections::{AppError, ResultExt},
    xp::rules,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/quizzes/generate", post(generate_quiz))
        .route("/quizzes/{id}", get(get_quiz))
        .route("/quizzes/{id}/attempts", post(submit_attempt))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateQuizBody {
    technology: String,
    level: String,
    question_count: Option<usize>,
    max_xp: Option<i64>,
}

async fn generate_quiz(
    AuthGuard(user): AuthGuard,
    State(state): State<AppState>,
    Json(body): Json<GenerateQuizBody>,
) -> Result<impl IntoResponse, AppError> {
    let technology = body.technology.trim();
    let level = body.level.trim();
    if technology.is_empty() || level.is_empty() {
        return Err(AppError::Input("errors.technology_level_required"));
    }

    let question_count = body
        .question_count
        .unwrap_or(names::DEFAULT_QUIZ_QUESTIONS)
        .clamp(1, names::MAX_QUIZ_QUESTIONS);

    // only admins pick the quiz reward
    let max_xp = match body.max_xp {
        Some(max_xp) if user.is_admin() => {
            if max_xp < 0 {
                return Err(AppError::Input("errors.invalid_max_xp"));
            }
            max_xp
        }
        _ => names::DEFAULT_QUIZ_MAX_XP,
    };

    let generated = state
        .generator
        .generate_quiz(technology, level, question_count)
        .await
        .reject("could not generate quiz")?;

    let quiz_id = state
        .db
        .create_quiz(&generated, technology, level, max_xp, user.id, Utc::now())
        .await
        .reject("could not store generated quiz")?;

    let (quiz, questions) = load_quiz(&state, quiz_id).await?;
    Ok(Json(json!({ "success": true, "quiz": quiz_view(&quiz, &questions) })))
}

async fn get_quiz(
    AuthGuard(_user): AuthGuard,
    State(state): State<AppState>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let (quiz, questions) = load_quiz(&state, quiz_id).await?;
    Ok(Json(json!({ "success": true, "quiz": quiz_view(&quiz, &questions) })))
}

#[derive(Deserialize)]
struct AttemptBody {
    /// Chosen option index per question, in question order.
    answers: Vec<i64>,
}

async fn submit_attempt(
    AuthGuard(user): AuthGuard,
    State(state): State<AppState>,
    Path(quiz_id): Path<i64>,
    Json(body): Json<AttemptBody>,
) -> Result<impl IntoResponse, AppError> {
    let (quiz, questions) = load_quiz(&state, quiz_id).await?;

    if body.answers.len() != questions.len() {
        return Err(AppError::Input("errors.answers_mismatch"));
    }

    let results: Vec<Value> = questions
        .iter()
        .zip(&body.answers)
        .map(|(question, answer)| {
            json!({
                "questionId": question.id,
                "correct": question.correct_option == *answer,
                "correctOption": question.correct_option,
                "explanation": question.explanation,
            })
        })
        .collect();
    let correct = questions
        .iter()
        .zip(&body.answers)
        .filter(|(question, answer)| question.correct_option == **answer)
        .count();

    let score_percent = rules::score_percent(correct, questions.len());
    let xp_awarded = rules::quiz_award(score_percent, quiz.max_xp);

    let (attempt_id, totals) = state
        .db
        .record_quiz_attempt(&quiz, user.id, &body.answers, score_percent, xp_awarded, Utc::now())
        .await
        .reject("could not record quiz attempt")?;

    Ok(Json(json!({
        "success": true,
        "attemptId": attempt_id,
        "correct": correct,
        "total": questions.len(),
        "scorePercent": score_percent,
        "xpAwarded": xp_awarded,
        "totals": totals,
        "results": results,
    })))
}

async fn load_quiz(state: &AppState, quiz_id: i64) -> Result<(Quiz, Vec<QuizQuestion>), AppError> {
    let quiz = state
        .db
        .get_quiz(quiz_id)
        .await
        .reject("could not get quiz")?
        .ok_or(AppError::NotFound("errors.quiz_not_found"))?;

    let questions = state
        .db
        .quiz_questions(quiz_id)
        .await
        .reject("could not get quiz questions")?;

    Ok((quiz, questions))
}

/// Quiz as shown to a student: no correct options, no explanations.
fn quiz_view(quiz: &Quiz, questions: &[QuizQuestion]) -> Value {
    let questions: Vec<Value> = questions
        .iter()
        .map(|q| {
            json!({
                "id": q.id,
                "position": q.position,
                "prompt": q.prompt,
                "options": q.options.0,
            })
        })
        .collect();

    json!({
        "id": quiz.id,
        "title": quiz.title,
        "technology": quiz.technology,
        "level": quiz.level,
        "maxXp": quiz.max_xp,
        "createdAt": quiz.created_at,
        "questions": questions,
    })
}
