use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::{error, instrument};

use crate::{
    auth::session::{PageUser, Session},
    state::AppState,
};

mod views;

pub const DASHBOARD_RECENT: i64 = 5;
pub const HISTORY_LIMIT: i64 = 20;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/dashboard", get(dashboard))
        .route("/history", get(history))
        .route("/about", get(about))
}

#[instrument(skip(session))]
pub async fn index(mut session: Session) -> (Session, Html<String>) {
    let flashes = session.take_flashes();
    let page = views::index(session.username(), &flashes);
    (session, Html(page))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn dashboard(State(state): State<AppState>, mut user: PageUser) -> Response {
    let recent = match state.analyses.list_recent(user.id, DASHBOARD_RECENT).await {
        Ok(rows) => rows,
        Err(e) => {
            error!(error = %e, "loading recent analyses failed");
            return unavailable();
        }
    };
    let flashes = user.session.take_flashes();
    let page = views::dashboard(&user.username, &flashes, &recent);
    (user.session, Html(page)).into_response()
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn history(State(state): State<AppState>, mut user: PageUser) -> Response {
    let analyses = match state.analyses.list_recent(user.id, HISTORY_LIMIT).await {
        Ok(rows) => rows,
        Err(e) => {
            error!(error = %e, "loading history failed");
            return unavailable();
        }
    };
    let flashes = user.session.take_flashes();
    let page = views::history(&user.username, &flashes, &analyses);
    (user.session, Html(page)).into_response()
}

#[instrument(skip(session))]
pub async fn about(session: Session) -> Html<String> {
    Html(views::about(session.username()))
}

fn unavailable() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(views::error_page("The service is temporarily unavailable.")),
    )
        .into_response()
}

