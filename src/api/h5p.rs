//! The H5P subtree.
//!
//! The client-side player and editor are served as static files from the
//! H5P directory; this module only mounts them and exposes the current user
//! in the shape the H5P client expects. Every request in the subtree passes
//! through [`inject_user`], so handlers can rely on an [`H5pUser`] extension.

use askama::Template;
use axum::{
    extract::{Extension, Request},
    middleware::{self, Next},
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use std::{io::ErrorKind, path::Path, sync::Arc};
use tower_http::services::ServeDir;
use tracing::{debug, error};

use crate::{
    api::{
        handlers::{auth::RequestContext, finish, internal_error},
        state::{AppConfig, AppState},
        views::H5pContentPage,
    },
    store::User,
};

const ANONYMOUS_ID: &str = "anonymous";
const ANONYMOUS_NAME: &str = "Anonymous";
const USER_TYPE: &str = "local";

/// User object handed to the H5P client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct H5pUser {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl H5pUser {
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            id: ANONYMOUS_ID.to_string(),
            name: ANONYMOUS_NAME.to_string(),
            email: String::new(),
            kind: USER_TYPE.to_string(),
        }
    }

    #[must_use]
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            name: user.display_name(),
            email: user.email.clone(),
            kind: USER_TYPE.to_string(),
        }
    }
}

/// Routes of the subtree, relative to the configured base URL.
pub fn router(config: &AppConfig) -> Router {
    let root = config.h5p_path();
    Router::new()
        .route("/", get(content_list))
        .route("/user", get(current_user))
        .nest_service("/core", ServeDir::new(root.join("core")))
        .nest_service("/editor", ServeDir::new(root.join("editor")))
        .nest_service("/libraries", ServeDir::new(root.join("libraries")))
        .nest_service("/content", ServeDir::new(root.join("content")))
        .layer(middleware::from_fn(inject_user))
}

/// Resolve the session user and attach it to the request as an [`H5pUser`].
pub async fn inject_user(
    Extension(state): Extension<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let context = match RequestContext::resolve(&state, request.headers()).await {
        Ok(context) => context,
        Err(err) => {
            error!("Failed to resolve session: {err:#}");
            return internal_error();
        }
    };

    let user = context
        .user
        .as_ref()
        .map_or_else(H5pUser::anonymous, H5pUser::from_user);
    debug!(h5p_user = %user.id, "Injected H5P user");
    request.extensions_mut().insert(user);

    let response = next.run(request).await;
    finish(&state, context.session, response).await
}

pub async fn current_user(Extension(user): Extension<H5pUser>) -> Json<H5pUser> {
    Json(user)
}

pub async fn content_list(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<H5pUser>,
) -> Response {
    let content_dir = state.config().h5p_path().join("content");
    let content_ids = match list_content(&content_dir).await {
        Ok(ids) => ids,
        Err(err) => {
            error!("Failed to list H5P content in {}: {err}", content_dir.display());
            return internal_error();
        }
    };

    let view = H5pContentPage {
        base_url: state.config().h5p_base_url().to_string(),
        user_name: user.name,
        content_ids,
    };
    // `inject_user` commits the session.
    match view.render() {
        Ok(html) => Html(html).into_response(),
        Err(err) => {
            error!("Failed to render template: {err}");
            internal_error()
        }
    }
}

/// Content ids are the names of the subdirectories of `content/`.
async fn list_content(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };

    let mut ids = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                ids.push(name.to_string());
            }
        }
    }
    ids.sort();
    Ok(ids)
}
