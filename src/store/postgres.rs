//! PostgreSQL-backed stores.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{postgres::PgRow, Connection, PgPool, Row};
use tracing::{warn, Instrument};
use uuid::Uuid;

use super::{
    CreateUserOutcome, NewUser, SessionData, SessionStore, User, UserStore, DEFAULT_ROLE,
};
use crate::password::PasswordHash;

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables and indexes if they are missing.
    ///
    /// # Errors
    /// Returns an error if any schema statement fails.
    pub async fn apply_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&self.pool)
            .await
            .context("failed to apply database schema")?;
        Ok(())
    }
}

fn query_span(operation: &'static str, statement: &'static str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        password_hash: PasswordHash::from_stored(row.get("password")),
        created_at: row.get("created_at"),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: NewUser<'_>) -> Result<CreateUserOutcome> {
        // The user row and its role commit together; a duplicate email rolls
        // both back.
        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin registration transaction")?;

        let query = r"
            INSERT INTO users
                (email, password, first_name, last_name)
            VALUES ($1, $2, $3, $4)
            RETURNING id
        ";
        let row = sqlx::query(query)
            .bind(user.email)
            .bind(user.password_hash.as_str())
            .bind(user.first_name)
            .bind(user.last_name)
            .fetch_one(&mut *tx)
            .instrument(query_span("INSERT", query))
            .await;

        let user_id: Uuid = match row {
            Ok(row) => row.get("id"),
            Err(err) => {
                if is_unique_violation(&err) {
                    if let Err(err) = tx.rollback().await {
                        warn!("Failed to roll back registration transaction: {err}");
                    }
                    return Ok(CreateUserOutcome::Duplicate);
                }
                return Err(err).context("failed to insert user");
            }
        };

        let query = "INSERT INTO user_roles (user_id, role) VALUES ($1, $2)";
        sqlx::query(query)
            .bind(user_id)
            .bind(DEFAULT_ROLE)
            .execute(&mut *tx)
            .instrument(query_span("INSERT", query))
            .await
            .context("failed to insert user role")?;

        tx.commit()
            .await
            .context("commit registration transaction")?;

        Ok(CreateUserOutcome::Created(user_id))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let query = r"
            SELECT id, email, password, first_name, last_name, created_at
            FROM users
            WHERE lower(email) = lower($1)
        ";
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to lookup user by email")?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let query = r"
            SELECT id, email, password, first_name, last_name, created_at
            FROM users
            WHERE id = $1
        ";
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to lookup user by id")?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn roles(&self, user_id: Uuid) -> Result<Vec<String>> {
        let query = "SELECT role FROM user_roles WHERE user_id = $1 ORDER BY role";
        let rows = sqlx::query(query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to lookup user roles")?;

        Ok(rows.iter().map(|row| row.get::<String, _>("role")).collect())
    }

    async fn ping(&self) -> Result<()> {
        let acquire_span = tracing::info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self
            .pool
            .acquire()
            .instrument(acquire_span)
            .await
            .context("failed to acquire database connection")?;

        let ping_span = tracing::info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping()
            .instrument(ping_span)
            .await
            .context("failed to ping database")
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn load(&self, key: &[u8]) -> Result<Option<SessionData>> {
        let query = r"
            SELECT data::text AS data
            FROM user_sessions
            WHERE session_hash = $1
              AND expires_at > NOW()
        ";
        let row = sqlx::query(query)
            .bind(key)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to lookup session")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let text: String = row.get("data");
        let data = serde_json::from_str(&text).context("failed to decode session data")?;
        Ok(Some(data))
    }

    async fn save(&self, key: &[u8], data: &SessionData, ttl_seconds: i64) -> Result<()> {
        let payload = serde_json::to_string(data).context("failed to encode session data")?;
        let query = r"
            INSERT INTO user_sessions (session_hash, data, expires_at)
            VALUES ($1, $2::jsonb, NOW() + ($3 * INTERVAL '1 second'))
            ON CONFLICT (session_hash) DO UPDATE
                SET data = EXCLUDED.data,
                    expires_at = EXCLUDED.expires_at,
                    updated_at = NOW()
        ";
        sqlx::query(query)
            .bind(key)
            .bind(payload)
            .bind(ttl_seconds)
            .execute(&self.pool)
            .instrument(query_span("INSERT", query))
            .await
            .context("failed to save session")?;
        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> Result<()> {
        let query = "DELETE FROM user_sessions WHERE session_hash = $1";
        sqlx::query(query)
            .bind(key)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("failed to delete session")?;
        Ok(())
    }
}
