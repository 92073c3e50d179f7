//! Route guards, applied with `route_layer(middleware::from_fn(..))`.

use axum::{
    extract::{Extension, Request},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, error};

use super::context::RequestContext;
use crate::api::{
    handlers::{internal_error, redirect},
    state::AppState,
};

/// Let the request through only with a signed-in user, otherwise redirect
/// to `/login`.
pub async fn require_authenticated(
    Extension(state): Extension<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    guard(&state, request, next, true, "/login").await
}

/// Let the request through only without a signed-in user, otherwise
/// redirect to `/`.
pub async fn require_not_authenticated(
    Extension(state): Extension<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    guard(&state, request, next, false, "/").await
}

async fn guard(
    state: &AppState,
    mut request: Request,
    next: Next,
    want_authenticated: bool,
    otherwise: &str,
) -> Response {
    let context = match RequestContext::resolve(state, request.headers()).await {
        Ok(context) => context,
        Err(err) => {
            error!("Failed to resolve session: {err:#}");
            return internal_error();
        }
    };

    if context.is_authenticated() != want_authenticated {
        debug!(path = %request.uri().path(), to = otherwise, "Guard redirect");
        return redirect(state, context.session, otherwise).await;
    }

    request.extensions_mut().insert(context);
    next.run(request).await
}
