use crate::state::AppState;
use axum::Router;

pub mod dashboard;

pub fn router() -> Router<AppState> {
    dashboard::dashboard_routes()
}
