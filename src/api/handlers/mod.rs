pub mod auth;
pub mod health;
pub mod registration;
pub mod root;

// common functions for the handlers
use askama::Template;
use axum::{
    http::{header::SET_COOKIE, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
};
use tracing::error;

use self::auth::Session;
use crate::api::state::AppState;

pub const FLASH_ERROR: &str = "error";
pub const FLASH_INFO: &str = "info";
pub const FLASH_VALIDATION: &str = "validationErrors";

/// Emails are compared and stored trimmed and lowercased.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}

/// Commit the session and attach its cookie to the response.
pub(crate) async fn finish(state: &AppState, session: Session, mut response: Response) -> Response {
    match state.sessions().commit(session).await {
        Ok(Some(cookie)) => {
            response.headers_mut().append(SET_COOKIE, cookie);
            response
        }
        Ok(None) => response,
        Err(err) => {
            error!("Failed to save session: {err:#}");
            internal_error()
        }
    }
}

/// 303 redirect after committing the session.
pub(crate) async fn redirect(state: &AppState, session: Session, to: &str) -> Response {
    finish(state, session, Redirect::to(to).into_response()).await
}

/// Render a page after committing the session.
pub(crate) async fn page<T: Template>(state: &AppState, session: Session, view: &T) -> Response {
    match view.render() {
        Ok(html) => finish(state, session, Html(html).into_response()).await,
        Err(err) => {
            error!("Failed to render template: {err}");
            internal_error()
        }
    }
}
