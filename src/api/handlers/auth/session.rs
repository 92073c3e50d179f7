//! Cookie-backed server-side sessions.
//!
//! The cookie carries `<token>.<signature>`: a random 32-byte token and its
//! HMAC-SHA256 under the session secret, both base64url encoded. The store
//! is keyed by SHA-256 of the token, so raw tokens never reach it.
//!
//! A [`Session`] is loaded per request, mutated by the handler and handed
//! back to [`SessionManager::commit`]. Unmodified sessions are not written,
//! and a session that holds nothing (no user, no flash) is never persisted.

use anyhow::{anyhow, Context, Result};
use axum::http::{
    header::{InvalidHeaderValue, COOKIE},
    HeaderMap, HeaderValue,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::store::{FlashMessage, SessionData, SessionStore};

pub const SESSION_COOKIE_NAME: &str = "atelier_session";

type HmacSha256 = Hmac<Sha256>;

/// Per-request view of a session.
#[derive(Clone, Debug, Default)]
pub struct Session {
    token: Option<String>,
    // Token whose record must be deleted on commit (regenerated or invalidated).
    stale: Option<String>,
    data: SessionData,
    modified: bool,
    clear_cookie: bool,
}

impl Session {
    #[must_use]
    pub fn user_id(&self) -> Option<Uuid> {
        self.data.user_id
    }

    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn set_user(&mut self, user_id: Uuid) {
        self.data.user_id = Some(user_id);
        self.modified = true;
    }

    /// Queue a message for the next request.
    pub fn flash(&mut self, kind: &str, message: impl Into<String>) {
        self.data.flash.push(FlashMessage {
            kind: kind.to_string(),
            message: message.into(),
        });
        self.modified = true;
    }

    /// Drain the queued messages of one kind.
    pub fn take_flash(&mut self, kind: &str) -> Vec<String> {
        let (taken, kept): (Vec<FlashMessage>, Vec<FlashMessage>) = self
            .data
            .flash
            .drain(..)
            .partition(|message| message.kind == kind);
        self.data.flash = kept;
        if !taken.is_empty() {
            self.modified = true;
        }
        taken.into_iter().map(|message| message.message).collect()
    }

    /// Issue a new token on commit and drop the old record (login).
    pub fn regenerate(&mut self) {
        if let Some(token) = self.token.take() {
            self.stale = Some(token);
        }
        self.modified = true;
    }

    /// Forget everything and clear the cookie (logout, vanished user).
    pub fn invalidate(&mut self) {
        self.regenerate();
        self.data = SessionData::default();
        self.clear_cookie = true;
    }
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    secret: SecretString,
    ttl_seconds: i64,
    cookie_secure: bool,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("secret", &"***")
            .field("ttl_seconds", &self.ttl_seconds)
            .field("cookie_secure", &self.cookie_secure)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    #[must_use]
    pub fn new(
        store: Arc<dyn SessionStore>,
        secret: SecretString,
        ttl_seconds: i64,
        cookie_secure: bool,
    ) -> Self {
        Self {
            store,
            secret,
            ttl_seconds,
            cookie_secure,
        }
    }

    /// Resolve the request cookie into a session.
    ///
    /// Missing, tampered or expired cookies yield an empty session; the
    /// latter two also clear the cookie on commit.
    ///
    /// # Errors
    /// Returns an error if the session store fails.
    pub async fn load(&self, headers: &HeaderMap) -> Result<Session> {
        let Some(cookie) = extract_session_cookie(headers) else {
            return Ok(Session::default());
        };

        let Some(token) = self.verify(&cookie) else {
            debug!("Rejected session cookie with invalid signature");
            return Ok(Session {
                clear_cookie: true,
                ..Session::default()
            });
        };

        match self.store.load(&hash_session_token(&token)).await? {
            Some(data) => Ok(Session {
                token: Some(token),
                data,
                ..Session::default()
            }),
            None => Ok(Session {
                clear_cookie: true,
                ..Session::default()
            }),
        }
    }

    /// Persist a session if it changed and return the `Set-Cookie` value to
    /// send, if any.
    ///
    /// # Errors
    /// Returns an error if the session store fails or the cookie cannot be built.
    pub async fn commit(&self, mut session: Session) -> Result<Option<HeaderValue>> {
        if let Some(stale) = session.stale.take() {
            self.store.delete(&hash_session_token(&stale)).await?;
        }

        if !session.modified {
            return self.clear_if(session.clear_cookie);
        }

        if session.data.is_empty() {
            if let Some(token) = session.token {
                self.store.delete(&hash_session_token(&token)).await?;
                return self.clear_if(true);
            }
            return self.clear_if(session.clear_cookie);
        }

        let token = match session.token {
            Some(token) => token,
            None => generate_session_token()?,
        };
        self.store
            .save(&hash_session_token(&token), &session.data, self.ttl_seconds)
            .await?;

        let cookie = self
            .session_cookie(&token)
            .context("failed to build session cookie")?;
        Ok(Some(cookie))
    }

    fn clear_if(&self, clear: bool) -> Result<Option<HeaderValue>> {
        if clear {
            let cookie = self
                .clear_session_cookie()
                .context("failed to build session cookie")?;
            Ok(Some(cookie))
        } else {
            Ok(None)
        }
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|err| anyhow!("invalid session secret: {err}"))
    }

    fn sign(&self, token: &str) -> Result<String> {
        let mut mac = self.mac()?;
        mac.update(token.as_bytes());
        Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }

    /// Return the token if the cookie value carries a valid signature.
    fn verify(&self, cookie: &str) -> Option<String> {
        let (token, signature) = cookie.split_once('.')?;
        if token.is_empty() {
            return None;
        }
        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;
        let mut mac = self.mac().ok()?;
        mac.update(token.as_bytes());
        // Constant-time comparison.
        mac.verify_slice(&signature).ok()?;
        Some(token.to_string())
    }

    /// Build a `HttpOnly` cookie for the signed session token.
    fn session_cookie(&self, token: &str) -> Result<HeaderValue> {
        let signature = self.sign(token)?;
        let ttl_seconds = self.ttl_seconds;
        let mut cookie = format!(
            "{SESSION_COOKIE_NAME}={token}.{signature}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
        );
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        Ok(HeaderValue::from_str(&cookie)?)
    }

    fn clear_session_cookie(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie =
            format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }
}

/// Create a new random session token.
fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a session token so raw values never touch the store.
fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

fn extract_session_cookie(headers: &HeaderMap) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
                continue;
            };
            if key.trim() == SESSION_COOKIE_NAME {
                return Some(val.trim().to_string());
            }
        }
    }
    None
}
