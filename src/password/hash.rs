//! bcrypt hashing with an application-wide salt.
//!
//! The salt and cost are generated once at startup and held by
//! [`PasswordHasher`], which lives in the application state. bcrypt embeds
//! the salt in every hash, so hashes created by a previous process still
//! verify after a restart.

use anyhow::{bail, Context, Result};
use bcrypt::{hash_with_salt, verify, Version};
use rand::{rngs::OsRng, RngCore};
use std::fmt;

pub const DEFAULT_COST: u32 = 10;

/// bcrypt ignores everything past the first 72 bytes of a password.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// A bcrypt hash. Only [`PasswordHasher`] (or a value read back from the
/// store) can produce one, so a raw password can never be persisted by
/// accident.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Wrap a hash read back from the credential store.
    pub(crate) fn from_stored(hash: String) -> Self {
        Self(hash)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash(***)")
    }
}

#[derive(Clone)]
pub struct PasswordHasher {
    cost: u32,
    salt: [u8; 16],
    // Verified against when the email is unknown so both login failures cost the same.
    dummy: PasswordHash,
}

impl fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("cost", &self.cost)
            .field("salt", &"***")
            .finish()
    }
}

impl PasswordHasher {
    /// Generate a fresh random salt for the given cost.
    ///
    /// # Errors
    /// Returns an error if the OS RNG fails or the cost is outside 4..=31.
    pub fn generate(cost: u32) -> Result<Self> {
        let mut salt = [0u8; 16];
        OsRng
            .try_fill_bytes(&mut salt)
            .context("failed to generate password salt")?;
        Self::with_salt(cost, salt)
    }

    /// Build a hasher from a known salt.
    ///
    /// # Errors
    /// Returns an error if the cost is outside 4..=31.
    pub fn with_salt(cost: u32, salt: [u8; 16]) -> Result<Self> {
        let dummy = hash_with_salt(ulid::Ulid::new().to_string(), cost, salt)
            .with_context(|| format!("invalid bcrypt cost: {cost}"))?
            .format_for_version(Version::TwoB);
        Ok(Self {
            cost,
            salt,
            dummy: PasswordHash(dummy),
        })
    }

    #[must_use]
    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a password on the blocking pool.
    ///
    /// # Errors
    /// Returns an error if the password is longer than [`MAX_PASSWORD_BYTES`],
    /// bcrypt fails or the blocking task panics.
    pub async fn hash(&self, password: &str) -> Result<PasswordHash> {
        if password.len() > MAX_PASSWORD_BYTES {
            bail!("password exceeds {MAX_PASSWORD_BYTES} bytes");
        }
        let password = password.to_string();
        let cost = self.cost;
        let salt = self.salt;

        tokio::task::spawn_blocking(move || hash_with_salt(password, cost, salt))
            .await
            .context("password hashing task failed")?
            .map(|parts| PasswordHash(parts.format_for_version(Version::TwoB)))
            .context("failed to hash password")
    }

    /// Verify a password against a stored hash on the blocking pool.
    ///
    /// A password longer than [`MAX_PASSWORD_BYTES`] never matches, since no
    /// stored hash can have been made from it.
    ///
    /// # Errors
    /// Returns an error if the stored hash is malformed or the blocking task panics.
    pub async fn verify(&self, password: &str, hash: &PasswordHash) -> Result<bool> {
        let too_long = password.len() > MAX_PASSWORD_BYTES;
        let password = password.to_string();
        let hash = hash.0.clone();

        let matches = tokio::task::spawn_blocking(move || verify(password, &hash))
            .await
            .context("password verification task failed")?
            .context("failed to verify password")?;
        Ok(matches && !too_long)
    }

    /// Verify against `hash`, or against the dummy hash when there is none.
    /// Always `false` in the latter case.
    ///
    /// # Errors
    /// Same as [`PasswordHasher::verify`].
    pub async fn verify_or_dummy(&self, password: &str, hash: Option<&PasswordHash>) -> Result<bool> {
        match hash {
            Some(hash) => self.verify(password, hash).await,
            None => {
                let _ = self.verify(password, &self.dummy).await?;
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::with_salt(4, [7u8; 16]).expect("valid cost")
    }

    #[tokio::test]
    async fn hash_differs_from_plaintext_and_verifies() {
        let hasher = hasher();
        let hash = hasher.hash("Abcdef1!").await.expect("hash");
        assert_ne!(hash.as_str(), "Abcdef1!");
        assert!(hash.as_str().starts_with("$2b$04$"));
        assert!(hasher.verify("Abcdef1!", &hash).await.expect("verify"));
        assert!(!hasher.verify("Abcdef1?", &hash).await.expect("verify"));
    }

    #[tokio::test]
    async fn hash_is_deterministic_per_salt() {
        let hasher = hasher();
        let first = hasher.hash("Abcdef1!").await.expect("hash");
        let second = hasher.hash("Abcdef1!").await.expect("hash");
        assert_eq!(first, second);

        let other = PasswordHasher::with_salt(4, [9u8; 16]).expect("valid cost");
        let third = other.hash("Abcdef1!").await.expect("hash");
        assert_ne!(first, third);
        // Salt is embedded, so any hasher can verify it.
        assert!(hasher.verify("Abcdef1!", &third).await.expect("verify"));
    }

    #[tokio::test]
    async fn generated_salts_differ() {
        let first = PasswordHasher::generate(4).expect("hasher");
        let second = PasswordHasher::generate(4).expect("hasher");
        let a = first.hash("Abcdef1!").await.expect("hash");
        let b = second.hash("Abcdef1!").await.expect("hash");
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn bytes_past_the_bcrypt_limit_are_not_ignored() {
        let hasher = hasher();
        let base = format!("A!{}", "a".repeat(MAX_PASSWORD_BYTES - 2));
        let hash = hasher.hash(&base).await.expect("hash");
        assert!(hasher.verify(&base, &hash).await.expect("verify"));
        assert!(!hasher
            .verify(&format!("{base}WRONG"), &hash)
            .await
            .expect("verify"));
        assert!(hasher.hash(&format!("{base}x")).await.is_err());
    }

    #[test]
    fn rejects_invalid_cost() {
        assert!(PasswordHasher::with_salt(3, [0u8; 16]).is_err());
        assert!(PasswordHasher::with_salt(32, [0u8; 16]).is_err());
    }

    #[tokio::test]
    async fn verify_or_dummy_without_hash_is_false() {
        let hasher = hasher();
        assert!(!hasher
            .verify_or_dummy("Abcdef1!", None)
            .await
            .expect("verify"));
    }

    #[tokio::test]
    async fn malformed_hash_is_an_error() {
        let hasher = hasher();
        let bogus = PasswordHash::from_stored("not-a-hash".to_string());
        assert!(hasher.verify("Abcdef1!", &bogus).await.is_err());
    }

    #[test]
    fn debug_redacts_hash_and_salt() {
        let hasher = hasher();
        assert!(!format!("{hasher:?}").contains("[7, 7"));
        let hash = PasswordHash::from_stored("$2b$04$secret".to_string());
        assert_eq!(format!("{hash:?}"), "PasswordHash(***)");
    }
}
