use axum::{
    extract::{Extension, Form},
    response::Response,
};
use serde::Deserialize;
use std::{fmt, sync::Arc};
use tracing::{error, info, instrument};

use super::{context::RequestContext, error::AuthError};
use crate::{
    api::{
        handlers::{normalize_email, page, redirect, FLASH_ERROR, FLASH_INFO},
        state::AppState,
        views::LoginPage,
    },
    store::User,
};

const LOGIN_FAILED: &str = "Login failed, please try again";

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginForm")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

/// Check the credentials against the store.
///
/// Unknown emails still pay for a bcrypt verification so both failure modes
/// take the same time and return the same error.
///
/// # Errors
/// [`AuthError::AuthenticationFailure`] on bad credentials,
/// [`AuthError::PersistenceFailure`] if the store or hasher fails.
pub async fn authenticate(state: &AppState, form: &LoginForm) -> Result<User, AuthError> {
    let email = normalize_email(&form.email);
    let user = state.users().find_by_email(&email).await?;

    let verified = state
        .hasher()
        .verify_or_dummy(&form.password, user.as_ref().map(|user| &user.password_hash))
        .await?;

    match user {
        Some(user) if verified => Ok(user),
        _ => Err(AuthError::AuthenticationFailure),
    }
}

pub async fn login_form(
    Extension(state): Extension<Arc<AppState>>,
    mut context: RequestContext,
) -> Response {
    let view = LoginPage {
        errors: context.session.take_flash(FLASH_ERROR),
        infos: context.session.take_flash(FLASH_INFO),
    };
    page(&state, context.session, &view).await
}

#[instrument(skip_all)]
pub async fn login(
    Extension(state): Extension<Arc<AppState>>,
    context: RequestContext,
    Form(form): Form<LoginForm>,
) -> Response {
    let mut session = context.session;

    match authenticate(&state, &form).await {
        Ok(user) => {
            info!(user_id = %user.id, "User logged in");
            session.regenerate();
            session.set_user(user.id);
            redirect(&state, session, "/").await
        }
        Err(AuthError::PersistenceFailure(err)) => {
            error!("Failed to authenticate user: {err:#}");
            session.flash(FLASH_ERROR, LOGIN_FAILED);
            redirect(&state, session, "/login").await
        }
        Err(err) => {
            session.flash(FLASH_ERROR, AuthError::AuthenticationFailure.to_string());
            info!("Login rejected: {err}");
            redirect(&state, session, "/login").await
        }
    }
}

#[instrument(skip_all)]
pub async fn logout(
    Extension(state): Extension<Arc<AppState>>,
    mut context: RequestContext,
) -> Response {
    if let Some(user) = &context.user {
        info!(user_id = %user.id, "User logged out");
    }
    context.session.invalidate();
    redirect(&state, context.session, "/login").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::state::AppConfig,
        password::PasswordHasher,
        store::{MemoryStore, NewUser, UserStore},
    };
    use secrecy::SecretString;

    async fn state_with_user(email: &str, password: &str) -> anyhow::Result<AppState> {
        let store = Arc::new(MemoryStore::new());
        let hasher = PasswordHasher::with_salt(4, [7u8; 16])?;
        let hash = hasher.hash(password).await?;
        store
            .create_user(NewUser {
                email,
                first_name: "Ada",
                last_name: "Lovelace",
                password_hash: &hash,
            })
            .await?;
        let config = AppConfig::new(SecretString::from("k".repeat(32)));
        Ok(AppState::new(config, hasher, store.clone(), store))
    }

    fn form(email: &str, password: &str) -> LoginForm {
        LoginForm {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn authenticate_accepts_valid_credentials() -> anyhow::Result<()> {
        let state = state_with_user("a@x.com", "Abcdef1!").await?;
        let user = authenticate(&state, &form(" A@X.com ", "Abcdef1!"))
            .await
            .map_err(|err| anyhow::anyhow!("{err}"))?;
        assert_eq!(user.email, "a@x.com");
        Ok(())
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_fail_alike() -> anyhow::Result<()> {
        let state = state_with_user("a@x.com", "Abcdef1!").await?;
        let unknown = authenticate(&state, &form("b@x.com", "Abcdef1!")).await;
        let wrong = authenticate(&state, &form("a@x.com", "Abcdef1?")).await;
        assert!(matches!(unknown, Err(AuthError::AuthenticationFailure)));
        assert!(matches!(wrong, Err(AuthError::AuthenticationFailure)));
        Ok(())
    }

    #[test]
    fn debug_redacts_password() {
        let rendered = format!("{:?}", form("a@x.com", "Abcdef1!"));
        assert!(!rendered.contains("Abcdef1!"));
        assert!(rendered.contains("a@x.com"));
    }
}
