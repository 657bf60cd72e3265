use axum::{
    extract::{rejection::FormRejection, State},
    response::Redirect,
    routing::{get, post},
    Form, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginForm, RegisterForm},
        services,
        session::{FlashKind, Session},
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", get(logout))
}

#[instrument(skip(state, session, form), fields(username = tracing::field::Empty))]
pub async fn register(
    State(state): State<AppState>,
    mut session: Session,
    form: Result<Form<RegisterForm>, FormRejection>,
) -> (Session, Redirect) {
    let Form(form) = match form {
        Ok(form) => form,
        Err(e) => return unreadable_form(session, e),
    };
    tracing::Span::current().record("username", form.username.as_str());
    if session.current().is_some() {
        session.flash(FlashKind::Info, "You are already logged in.");
        return (session, Redirect::to("/dashboard"));
    }

    let outcome = services::register(
        state.users.as_ref(),
        &form.username,
        &form.email,
        &form.password,
        form.mobile.as_deref(),
    )
    .await;

    match outcome {
        Ok(user_id) => {
            info!(user_id, "user registered");
            session.flash(FlashKind::Success, "Registration successful! Please login.");
        }
        Err(e @ (AppError::InvalidInput(_) | AppError::DuplicateIdentity)) => {
            warn!(error = %e, "registration rejected");
            session.flash(FlashKind::Error, e.message());
        }
        Err(e) => {
            error!(error = %e, "registration failed");
            session.flash(FlashKind::Error, "Registration failed. Please try again.");
        }
    }
    (session, Redirect::to("/"))
}

#[instrument(skip(state, session, form), fields(username = tracing::field::Empty))]
pub async fn login(
    State(state): State<AppState>,
    mut session: Session,
    form: Result<Form<LoginForm>, FormRejection>,
) -> (Session, Redirect) {
    let Form(form) = match form {
        Ok(form) => form,
        Err(e) => return unreadable_form(session, e),
    };
    tracing::Span::current().record("username", form.username.as_str());
    if session.current().is_some() {
        session.flash(FlashKind::Info, "You are already logged in.");
        return (session, Redirect::to("/dashboard"));
    }

    match services::authenticate(state.users.as_ref(), &form.username, &form.password).await {
        Ok(user) => {
            session.establish(&user);
            session.flash(FlashKind::Success, "Login successful!");
            info!(user_id = user.id, "user logged in");
            (session, Redirect::to("/dashboard"))
        }
        Err(e @ AppError::InvalidCredentials) => {
            warn!("login rejected");
            session.flash(FlashKind::Error, e.message());
            (session, Redirect::to("/"))
        }
        Err(e) => {
            error!(error = %e, "login failed");
            session.flash(FlashKind::Error, "Login failed. Please try again.");
            (session, Redirect::to("/"))
        }
    }
}

fn unreadable_form(mut session: Session, e: FormRejection) -> (Session, Redirect) {
    warn!(error = %e, "unreadable form submission");
    session.flash(FlashKind::Error, "All fields are required!");
    (session, Redirect::to("/"))
}

#[instrument(skip(session))]
pub async fn logout(mut session: Session) -> (Session, Redirect) {
    if let Some(user_id) = session.current() {
        info!(user_id, "user logged out");
    }
    session.terminate();
    session.flash(FlashKind::Info, "You have been logged out successfully!");
    (session, Redirect::to("/"))
}
