//! Credential and session storage.
//!
//! Handlers only talk to the [`UserStore`] and [`SessionStore`] traits; the
//! server wires in [`PgStore`] and tests (or `--in-memory` demos) use
//! [`MemoryStore`].

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::password::PasswordHash;

mod memory;
mod postgres;

pub use memory::{MemoryStore, RoleRow};
pub use postgres::PgStore;

/// Role assigned to every account at registration.
pub const DEFAULT_ROLE: &str = "User";

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: PasswordHash,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Full name, falling back to the email when both name fields are blank.
    #[must_use]
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let name = name.trim();
        if name.is_empty() {
            self.email.clone()
        } else {
            name.to_string()
        }
    }
}

/// Input for account creation. The password is already hashed.
#[derive(Debug, Clone, Copy)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub password_hash: &'a PasswordHash,
}

/// Outcome of creating a user + default role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateUserOutcome {
    Created(Uuid),
    Duplicate,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create the user and its [`DEFAULT_ROLE`] row atomically.
    ///
    /// A duplicate email is reported as [`CreateUserOutcome::Duplicate`] and
    /// leaves nothing behind.
    async fn create_user(&self, user: NewUser<'_>) -> Result<CreateUserOutcome>;

    /// Lookup by normalized email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn roles(&self, user_id: Uuid) -> Result<Vec<String>>;

    /// Check that the backing store is reachable.
    async fn ping(&self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub kind: String,
    pub message: String,
}

/// Server-side session payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub flash: Vec<FlashMessage>,
}

impl SessionData {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.user_id.is_none() && self.flash.is_empty()
    }
}

/// Session records keyed by the hash of the session token.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a live (non-expired) session.
    async fn load(&self, key: &[u8]) -> Result<Option<SessionData>>;

    /// Insert or replace a session, resetting its expiry.
    async fn save(&self, key: &[u8], data: &SessionData, ttl_seconds: i64) -> Result<()>;

    async fn delete(&self, key: &[u8]) -> Result<()>;
}
