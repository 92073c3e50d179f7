//! Per-request authentication context.
//!
//! Guards resolve the context once and stash it in the request extensions;
//! handlers extract it with [`RequestContext`] as an extractor and get the
//! same value back instead of hitting the stores twice.

use anyhow::Result;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{error, warn};

use super::session::Session;
use crate::{api::state::AppState, store::User};

#[derive(Clone, Debug)]
pub struct RequestContext {
    pub session: Session,
    pub user: Option<User>,
}

impl RequestContext {
    /// Load the session and the user it points at.
    ///
    /// A session whose user no longer exists is invalidated and the request
    /// continues anonymously.
    ///
    /// # Errors
    /// Returns an error if the session or user store fails.
    pub async fn resolve(state: &AppState, headers: &HeaderMap) -> Result<Self> {
        let mut session = state.sessions().load(headers).await?;

        let user = match session.user_id() {
            Some(user_id) => {
                let user = state.users().find_by_id(user_id).await?;
                if user.is_none() {
                    warn!(%user_id, "Session references a missing user, invalidating");
                    session.invalidate();
                }
                user
            }
            None => None,
        };

        Ok(Self { session, user })
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(context) = parts.extensions.remove::<Self>() {
            return Ok(context);
        }

        let Some(state) = parts.extensions.get::<Arc<AppState>>().cloned() else {
            error!("AppState extension missing");
            return Err(StatusCode::INTERNAL_SERVER_ERROR.into_response());
        };

        Self::resolve(&state, &parts.headers).await.map_err(|err| {
            error!("Failed to resolve session: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
    }
}
