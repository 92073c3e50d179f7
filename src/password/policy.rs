//! Password policy for new accounts.
//!
//! Each rule is a plain function returning `Result<(), PolicyViolation>`; the
//! policy runs all of them and collects the failures so the form can show
//! every problem at once.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::hash::MAX_PASSWORD_BYTES;

pub const DEFAULT_MIN_LENGTH: usize = 8;

/// Characters accepted as "special" by the policy.
pub const SPECIAL_CHARACTERS: &str = r#"!@#$%^&*(),.?":{}|<>"#;

static EMAIL: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("Please provide a valid email address")]
    InvalidEmail,
    #[error("Passwords do not match")]
    ConfirmationMismatch,
    #[error("Password field can not be empty")]
    Empty,
    #[error("Password must be at least {0} characters long")]
    TooShort(usize),
    #[error("Password must be at most {0} bytes long")]
    TooLong(usize),
    #[error("Password must include a special character")]
    MissingSpecialCharacter,
    #[error("Password must include an uppercase letter")]
    MissingUppercase,
}

/// Fields of the registration form the policy looks at.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub confirm_password: &'a str,
}

#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    min_length: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self {
            min_length: DEFAULT_MIN_LENGTH,
        }
    }

    #[must_use]
    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length;
        self
    }

    #[must_use]
    pub fn min_length(&self) -> usize {
        self.min_length
    }

    /// Run every rule and return the aggregated violations, in rule order.
    ///
    /// # Errors
    /// Returns the non-empty list of violations when any rule fails.
    pub fn validate(&self, candidate: &Candidate<'_>) -> Result<(), Vec<PolicyViolation>> {
        let results = [
            email_format(candidate.email),
            confirmation_matches(candidate.password, candidate.confirm_password),
            not_empty(candidate.password),
            min_length(candidate.password, self.min_length),
            max_bytes(candidate.password),
            has_special_character(candidate.password),
            has_uppercase(candidate.password),
        ];

        let violations: Vec<PolicyViolation> =
            results.into_iter().filter_map(Result::err).collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

pub fn email_format(email: &str) -> Result<(), PolicyViolation> {
    let valid = EMAIL.as_ref().is_some_and(|re| re.is_match(email));
    if valid {
        Ok(())
    } else {
        Err(PolicyViolation::InvalidEmail)
    }
}

pub fn confirmation_matches(password: &str, confirmation: &str) -> Result<(), PolicyViolation> {
    if password == confirmation {
        Ok(())
    } else {
        Err(PolicyViolation::ConfirmationMismatch)
    }
}

pub fn not_empty(password: &str) -> Result<(), PolicyViolation> {
    if password.is_empty() {
        Err(PolicyViolation::Empty)
    } else {
        Ok(())
    }
}

pub fn min_length(password: &str, min: usize) -> Result<(), PolicyViolation> {
    if password.chars().count() < min {
        Err(PolicyViolation::TooShort(min))
    } else {
        Ok(())
    }
}

/// bcrypt only reads the first [`MAX_PASSWORD_BYTES`] bytes.
pub fn max_bytes(password: &str) -> Result<(), PolicyViolation> {
    if password.len() > MAX_PASSWORD_BYTES {
        Err(PolicyViolation::TooLong(MAX_PASSWORD_BYTES))
    } else {
        Ok(())
    }
}

pub fn has_special_character(password: &str) -> Result<(), PolicyViolation> {
    if password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        Ok(())
    } else {
        Err(PolicyViolation::MissingSpecialCharacter)
    }
}

pub fn has_uppercase(password: &str) -> Result<(), PolicyViolation> {
    if password.chars().any(|c| c.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(PolicyViolation::MissingUppercase)
    }
}
