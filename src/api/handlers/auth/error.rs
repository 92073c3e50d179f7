use thiserror::Error;

use crate::password::PolicyViolation;

/// Failures surfaced by the registration and login flows.
///
/// Each variant maps to the flash message the user sees; the underlying
/// cause of a [`AuthError::PersistenceFailure`] is only logged.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("registration input failed validation")]
    ValidationFailure(Vec<PolicyViolation>),

    #[error("User is already registered. Please login.")]
    DuplicateCredential,

    #[error("Invalid email or password")]
    AuthenticationFailure,

    #[error("persistence failure: {0:#}")]
    PersistenceFailure(#[source] anyhow::Error),
}

impl AuthError {
    /// Messages to flash for this failure.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::ValidationFailure(violations) => {
                violations.iter().map(ToString::to_string).collect()
            }
            Self::DuplicateCredential | Self::AuthenticationFailure => vec![self.to_string()],
            Self::PersistenceFailure(_) => vec![REGISTRATION_FAILED.to_string()],
        }
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::PersistenceFailure(err)
    }
}

pub const REGISTRATION_FAILED: &str = "Registration failed, please try again";
