//! Password policy and hashing.

pub mod hash;
pub mod policy;

pub use hash::{PasswordHash, PasswordHasher};
pub use policy::{Candidate, PasswordPolicy, PolicyViolation};
