use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::{
    extractors::AuthGuard,
    rejections::{AppError, ResultExt},
    AppState,
};

const MAX_FORM_KEY_LEN: usize = 64;

pub fn routes() -> Router<AppState> {
    Router::new().route("/forms/{key}/submissions", post(submit_form))
}

fn valid_form_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_FORM_KEY_LEN
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

async fn submit_form(
    AuthGuard(user): AuthGuard,
    State(state): State<AppState>,
    Path(form_key): Path<String>,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    if !valid_form_key(&form_key) {
        return Err(AppError::Input("errors.invalid_form_key"));
    }
    if !payload.is_object() {
        return Err(AppError::Input("errors.form_payload_object"));
    }

    let reward = state.rewards.formulario;
    let (submission_id, totals) = state
        .db
        .submit_form(user.id, &form_key, &payload, reward, Utc::now())
        .await
        .reject("could not store form submission")?;

    Ok(Json(json!({
        "success": true,
        "submissionId": submission_id,
        "xpAwarded": reward,
        "totals": totals,
    })))
}

#[cfg(test)]
mod tests {
    use super::valid_form_key;

    #[test]
    fn form_keys_are_slugs() {
        assert!(valid_form_key("pesquisa-onboarding"));
        assert!(valid_form_key("nps_2024"));
        assert!(!valid_form_key(""));
        assert!(!valid_form_key("Pesquisa"));
        assert!(!valid_form_key("a/b"));
    }
}
