use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    extractors::AuthGuard,
    names,
    rejections::{AppError, ResultExt},
    xp::ranking::{closed_months_cutoff, monthly_champions, RankingType},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ranking", get(ranking))
        .route("/ranking/champions", get(champions))
}

#[derive(Deserialize)]
struct RankingQuery {
    #[serde(rename = "type", default)]
    ranking_type: RankingType,
    limit: Option<i64>,
}

async fn ranking(
    AuthGuard(_user): AuthGuard,
    State(state): State<AppState>,
    Query(query): Query<RankingQuery>,
) -> Result<impl IntoResponse, AppError> {
    let limit = query
        .limit
        .unwrap_or(names::DEFAULT_RANKING_LIMIT)
        .clamp(1, names::MAX_RANKING_LIMIT);

    let rows = state
        .db
        .ranking(query.ranking_type, limit, Utc::now())
        .await
        .reject("could not get ranking")?;

    Ok(Json(json!({
        "success": true,
        "type": query.ranking_type,
        "ranking": rows,
    })))
}

#[derive(Deserialize)]
struct ChampionsQuery {
    limit: Option<usize>,
}

async fn champions(
    AuthGuard(_user): AuthGuard,
    State(state): State<AppState>,
    Query(query): Query<ChampionsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let limit = query
        .limit
        .unwrap_or(names::DEFAULT_CHAMPIONS_LIMIT)
        .clamp(1, names::MAX_CHAMPIONS_LIMIT);

    let totals = state
        .db
        .monthly_totals_before(closed_months_cutoff(Utc::now()))
        .await
        .reject("could not get monthly totals")?;

    let mut champions: Vec<Value> = Vec::new();
    for champion in monthly_champions(&totals, limit) {
        let display_name = state
            .db
            .display_name(champion.user_id)
            .await
            .reject("could not get champion name")?;
        champions.push(json!({
            "year": champion.year,
            "month": champion.month,
            "userId": champion.user_id,
            "displayName": display_name,
            "xp": champion.xp,
        }));
    }

    Ok(Json(json!({ "success": true, "champions": champions })))
}
