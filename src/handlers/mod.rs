pub mod admin;
pub mod community;
pub mod desafio;
pub mod forms;
pub mod me;
pub mod notifications;
pub mod quiz;
pub mod ranking;

use crate::rejections::AppError;

pub async fn not_found() -> AppError {
    AppError::NotFound("errors.route_not_found")
}
