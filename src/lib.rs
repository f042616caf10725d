rust_i18n::i18n!("locales", fallback = "en");

pub mod db;
pub mod extractors;
pub mod handlers;
pub mod models;
pub mod names;
pub mod rejections;
pub mod services;
pub mod xp;

use axum::{middleware, Router};

use services::{
    challenges::ChallengeService,
    community::CommunityService,
    generator::{GeneratorService, HttpContentGenerator},
};
use xp::Rewards;

#[derive(Clone)]
pub struct AppState {
    pub db: db::Db,
    pub rewards: Rewards,
    pub community: CommunityService,
    pub challenges: ChallengeService,
    pub generator: GeneratorService,
    pub expose_error_details: bool,
}

impl AppState {
    pub fn new(
        db: db::Db,
        rewards: Rewards,
        generator: HttpContentGenerator,
        expose_error_details: bool,
    ) -> Self {
        Self {
            community: CommunityService::new(db.clone(), rewards),
            challenges: ChallengeService::new(db.clone(), rewards),
            generator: GeneratorService::new(generator),
            db,
            rewards,
            expose_error_details,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(handlers::me::routes())
        .merge(handlers::notifications::routes())
        .merge(handlers::quiz::routes())
        .merge(handlers::desafio::routes())
        .merge(handlers::community::routes())
        .merge(handlers::forms::routes())
        .merge(handlers::admin::routes())
        .merge(handlers::ranking::routes())
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rejections::render_errors,
        ))
        .with_state(state)
}
