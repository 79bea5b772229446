use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod scope;
pub mod services;

pub fn router() -> Router<AppState> {
    handlers::analytics_routes()
}
