#![allow(dead_code)]

use anyhow::{Context, Result};
use atelier::{
    api::{handlers::auth::SESSION_COOKIE_NAME, router, AppConfig, AppState},
    password::PasswordHasher,
    store::{MemoryStore, SessionStore, UserStore},
};
use axum::{
    body::{to_bytes, Body},
    http::{
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
        Method, Request, StatusCode,
    },
    response::Response,
    Router,
};
use secrecy::SecretString;
use std::{path::Path, sync::Arc};
use tower::ServiceExt;

pub const EMAIL: &str = "a@x.com";
pub const PASSWORD: &str = "Abcdef1!";

pub fn config(h5p_path: &Path) -> AppConfig {
    AppConfig::new(SecretString::from(
        "integration-test-secret-0123456789".to_string(),
    ))
    .with_h5p_path(h5p_path.to_path_buf())
}

/// Router backed by one in-memory store for users and sessions.
pub fn app(store: Arc<MemoryStore>, h5p_path: &Path) -> Result<Router> {
    app_with(store.clone(), store, h5p_path)
}

pub fn app_with(
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    h5p_path: &Path,
) -> Result<Router> {
    let hasher = PasswordHasher::with_salt(4, [9u8; 16])?;
    let state = AppState::new(config(h5p_path), hasher, users, sessions);
    Ok(router(Arc::new(state)))
}

pub fn form(fields: &[(&str, &str)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields)
        .finish()
}

pub fn registration(email: &str, password: &str, confirm: &str) -> String {
    form(&[
        ("firstName", "Ada"),
        ("lastName", "Lovelace"),
        ("email", email),
        ("password", password),
        ("confirmPassword", confirm),
    ])
}

pub fn login(email: &str, password: &str) -> String {
    form(&[("email", email), ("password", password)])
}

/// A browser: remembers the session cookie between requests.
pub struct Browser {
    app: Router,
    cookie: Option<String>,
}

impl Browser {
    pub fn new(app: Router) -> Self {
        Self { app, cookie: None }
    }

    pub fn cookie(&self) -> Option<&str> {
        self.cookie.as_deref()
    }

    pub async fn get(&mut self, path: &str) -> Result<Response> {
        self.send(Method::GET, path, None).await
    }

    pub async fn post(&mut self, path: &str, body: String) -> Result<Response> {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn send(
        &mut self,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<Response> {
        let mut request = Request::builder().method(method).uri(path);
        if let Some(cookie) = &self.cookie {
            request = request.header(COOKIE, cookie.as_str());
        }
        let request = match body {
            Some(body) => request
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body))?,
            None => request.body(Body::empty())?,
        };

        let response = self.app.clone().oneshot(request).await?;

        if let Some(set_cookie) = response.headers().get(SET_COOKIE) {
            let value = set_cookie.to_str()?;
            let pair = value.split(';').next().unwrap_or_default().trim();
            if value.contains("Max-Age=0") {
                self.cookie = None;
            } else if pair.starts_with(SESSION_COOKIE_NAME) {
                self.cookie = Some(pair.to_string());
            }
        }

        Ok(response)
    }
}

pub fn location(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
}

pub fn assert_redirect(response: &Response, to: &str) {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(response), Some(to));
}

pub async fn body_text(response: Response) -> Result<String> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    String::from_utf8(bytes.to_vec()).context("body is not UTF-8")
}
