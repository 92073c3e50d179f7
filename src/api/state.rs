//! Application configuration and the shared request state.

use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{
    api::handlers::auth::SessionManager,
    password::{PasswordHasher, PasswordPolicy},
    store::{SessionStore, UserStore},
};

const DEFAULT_SESSION_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_H5P_BASE_URL: &str = "/h5p";
const DEFAULT_H5P_PATH: &str = "./h5p";
const DEFAULT_PUBLIC_PATH: &str = "./public";

#[derive(Clone, Debug)]
pub struct AppConfig {
    session_secret: SecretString,
    session_ttl_seconds: i64,
    session_cookie_secure: bool,
    min_password_length: usize,
    h5p_base_url: String,
    h5p_path: PathBuf,
    public_path: PathBuf,
}

impl AppConfig {
    #[must_use]
    pub fn new(session_secret: SecretString) -> Self {
        Self {
            session_secret,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            session_cookie_secure: false,
            min_password_length: crate::password::policy::DEFAULT_MIN_LENGTH,
            h5p_base_url: DEFAULT_H5P_BASE_URL.to_string(),
            h5p_path: PathBuf::from(DEFAULT_H5P_PATH),
            public_path: PathBuf::from(DEFAULT_PUBLIC_PATH),
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_cookie_secure(mut self, secure: bool) -> Self {
        self.session_cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn with_min_password_length(mut self, length: usize) -> Self {
        self.min_password_length = length;
        self
    }

    /// Set the H5P mount point. Trailing slashes are dropped.
    #[must_use]
    pub fn with_h5p_base_url(mut self, base_url: &str) -> Self {
        self.h5p_base_url = normalize_base_url(base_url);
        self
    }

    #[must_use]
    pub fn with_h5p_path(mut self, path: PathBuf) -> Self {
        self.h5p_path = path;
        self
    }

    #[must_use]
    pub fn with_public_path(mut self, path: PathBuf) -> Self {
        self.public_path = path;
        self
    }

    pub(crate) fn session_secret(&self) -> &SecretString {
        &self.session_secret
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.session_cookie_secure
    }

    #[must_use]
    pub fn min_password_length(&self) -> usize {
        self.min_password_length
    }

    #[must_use]
    pub fn h5p_base_url(&self) -> &str {
        &self.h5p_base_url
    }

    #[must_use]
    pub fn h5p_path(&self) -> &Path {
        &self.h5p_path
    }

    #[must_use]
    pub fn public_path(&self) -> &Path {
        &self.public_path
    }
}

fn normalize_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Everything a request handler needs, built once at startup.
pub struct AppState {
    config: AppConfig,
    hasher: PasswordHasher,
    policy: PasswordPolicy,
    users: Arc<dyn UserStore>,
    sessions: SessionManager,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: AppConfig,
        hasher: PasswordHasher,
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let policy = PasswordPolicy::new().with_min_length(config.min_password_length());
        let sessions = SessionManager::new(
            sessions,
            config.session_secret().clone(),
            config.session_ttl_seconds(),
            config.session_cookie_secure(),
        );
        Self {
            config,
            hasher,
            policy,
            users,
            sessions,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    #[must_use]
    pub fn policy(&self) -> &PasswordPolicy {
        &self.policy
    }

    #[must_use]
    pub fn users(&self) -> &dyn UserStore {
        self.users.as_ref()
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }
}
