mod dto;
pub mod handlers;

use crate::state::AppState;
use axum::Router;

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/api/user",
        Router::new()
            .merge(handlers::read_routes(state))
            .merge(handlers::write_routes(state)),
    )
}
