use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    handlers::upload_routes(max_upload_bytes)
}
