//! Account registration.
//!
//! Flow Overview: validate the form against the password policy, hash the
//! password with the application salt, then create the user and its default
//! role in one store call. Every outcome ends in a redirect carrying flash
//! messages.

use axum::{
    extract::{Extension, Form},
    response::Response,
};
use serde::Deserialize;
use std::{fmt, sync::Arc};
use tracing::{error, info, instrument};
use uuid::Uuid;

use super::{
    auth::{AuthError, RequestContext, REGISTRATION_FAILED},
    normalize_email, page, redirect, FLASH_ERROR, FLASH_INFO, FLASH_VALIDATION,
};
use crate::{
    api::{state::AppState, views::RegistrationPage},
    password::Candidate,
    store::{CreateUserOutcome, NewUser},
};

pub const REGISTRATION_SUCCEEDED: &str = "Registration successful, please login";

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl fmt::Debug for RegistrationForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationForm")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Validate, hash and persist a new account.
///
/// # Errors
/// - [`AuthError::ValidationFailure`] with every policy violation
/// - [`AuthError::DuplicateCredential`] if the email is taken
/// - [`AuthError::PersistenceFailure`] if hashing or the store fails
pub async fn register_user(state: &AppState, form: &RegistrationForm) -> Result<Uuid, AuthError> {
    let email = normalize_email(&form.email);

    state
        .policy()
        .validate(&Candidate {
            email: &email,
            password: &form.password,
            confirm_password: &form.confirm_password,
        })
        .map_err(AuthError::ValidationFailure)?;

    let password_hash = state.hasher().hash(&form.password).await?;

    let outcome = state
        .users()
        .create_user(NewUser {
            email: &email,
            first_name: form.first_name.trim(),
            last_name: form.last_name.trim(),
            password_hash: &password_hash,
        })
        .await?;

    match outcome {
        CreateUserOutcome::Created(id) => Ok(id),
        CreateUserOutcome::Duplicate => Err(AuthError::DuplicateCredential),
    }
}

pub async fn registration_form(
    Extension(state): Extension<Arc<AppState>>,
    mut context: RequestContext,
) -> Response {
    let view = RegistrationPage {
        validation_errors: context.session.take_flash(FLASH_VALIDATION),
        errors: context.session.take_flash(FLASH_ERROR),
        min_length: state.policy().min_length(),
    };
    page(&state, context.session, &view).await
}

#[instrument(skip_all)]
pub async fn register(
    Extension(state): Extension<Arc<AppState>>,
    context: RequestContext,
    Form(form): Form<RegistrationForm>,
) -> Response {
    let mut session = context.session;

    match register_user(&state, &form).await {
        Ok(user_id) => {
            info!(%user_id, "User registered");
            session.flash(FLASH_INFO, REGISTRATION_SUCCEEDED);
            redirect(&state, session, "/login").await
        }
        Err(err @ AuthError::ValidationFailure(_)) => {
            for message in err.messages() {
                session.flash(FLASH_VALIDATION, message);
            }
            redirect(&state, session, "/registration").await
        }
        Err(err @ AuthError::DuplicateCredential) => {
            info!("Registration rejected: email already registered");
            session.flash(FLASH_ERROR, err.to_string());
            redirect(&state, session, "/login").await
        }
        Err(err) => {
            error!("Failed to register user: {err}");
            session.flash(FLASH_ERROR, REGISTRATION_FAILED);
            redirect(&state, session, "/registration").await
        }
    }
}
