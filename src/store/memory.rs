//! In-process stores for tests and `--in-memory` runs.
//!
//! Uniqueness is checked and the user + role rows are written under one
//! lock, which gives the same all-or-nothing outcome as the database
//! transaction.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    CreateUserOutcome, NewUser, SessionData, SessionStore, User, UserStore, DEFAULT_ROLE,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRow {
    pub user_id: Uuid,
    pub role: String,
}

#[derive(Default)]
struct Credentials {
    users: HashMap<Uuid, User>,
    roles: Vec<RoleRow>,
}

struct SessionEntry {
    data: SessionData,
    expires_at: Instant,
}

#[derive(Default)]
pub struct MemoryStore {
    credentials: Mutex<Credentials>,
    sessions: Mutex<HashMap<Vec<u8>, SessionEntry>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.credentials.lock().await.users.len()
    }

    pub async fn role_rows(&self) -> Vec<RoleRow> {
        self.credentials.lock().await.roles.clone()
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        let now = Instant::now();
        self.sessions
            .lock()
            .await
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    /// Remove a user while keeping its sessions, to simulate an account that
    /// disappeared behind a live session.
    pub async fn remove_user(&self, id: Uuid) -> bool {
        let mut credentials = self.credentials.lock().await;
        credentials.roles.retain(|row| row.user_id != id);
        credentials.users.remove(&id).is_some()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser<'_>) -> Result<CreateUserOutcome> {
        let mut credentials = self.credentials.lock().await;

        let duplicate = credentials
            .users
            .values()
            .any(|existing| existing.email.eq_ignore_ascii_case(user.email));
        if duplicate {
            return Ok(CreateUserOutcome::Duplicate);
        }

        let id = Uuid::new_v4();
        credentials.users.insert(
            id,
            User {
                id,
                email: user.email.to_string(),
                first_name: user.first_name.to_string(),
                last_name: user.last_name.to_string(),
                password_hash: user.password_hash.clone(),
                created_at: Utc::now(),
            },
        );
        credentials.roles.push(RoleRow {
            user_id: id,
            role: DEFAULT_ROLE.to_string(),
        });

        Ok(CreateUserOutcome::Created(id))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let credentials = self.credentials.lock().await;
        Ok(credentials
            .users
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.credentials.lock().await.users.get(&id).cloned())
    }

    async fn roles(&self, user_id: Uuid) -> Result<Vec<String>> {
        let credentials = self.credentials.lock().await;
        let mut roles: Vec<String> = credentials
            .roles
            .iter()
            .filter(|row| row.user_id == user_id)
            .map(|row| row.role.clone())
            .collect();
        roles.sort();
        Ok(roles)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, key: &[u8]) -> Result<Option<SessionData>> {
        let mut sessions = self.sessions.lock().await;
        let expired = match sessions.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Ok(Some(entry.data.clone()));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            sessions.remove(key);
        }
        Ok(None)
    }

    async fn save(&self, key: &[u8], data: &SessionData, ttl_seconds: i64) -> Result<()> {
        let ttl = Duration::from_secs(u64::try_from(ttl_seconds).unwrap_or(0));
        self.sessions.lock().await.insert(
            key.to_vec(),
            SessionEntry {
                data: data.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> Result<()> {
        self.sessions.lock().await.remove(key);
        Ok(())
    }
}
