pub mod client;
pub mod dto;
pub mod fallback;
pub mod handlers;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::nutrition_routes()
}
