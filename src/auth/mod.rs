use crate::state::AppState;
use axum::Router;

pub mod claims;
pub mod dto;
pub mod handlers;
pub mod jwt;
pub mod lifecycle;
pub mod middleware;
pub mod password;
pub mod service;

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new().nest("/api/auth", handlers::auth_routes(state))
}
