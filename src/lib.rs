//! # Atelier (interactive content authoring portal)
//!
//! `atelier` is a server-rendered web application that puts account
//! registration, password login and cookie sessions in front of an embedded
//! H5P content editor/player.
//!
//! ## Registration
//!
//! Submitted passwords go through a password policy (confirmation match,
//! minimum length, special character, uppercase letter). Every rule is
//! evaluated and the failures are flashed back to the registration form.
//! Passwords are hashed with bcrypt using an application-wide salt and cost
//! chosen at startup; the raw password never reaches the credential store.
//!
//! Duplicate emails are detected by the store's uniqueness constraint at
//! commit time, never by a separate pre-check, so concurrent registrations
//! with the same email always leave exactly one account.
//!
//! ## Sessions
//!
//! The browser holds an HMAC-signed random token; the server stores only its
//! SHA-256 hash. Sessions are written only when mutated, so anonymous
//! visitors never create session rows.
//!
//! ## H5P
//!
//! The H5P subtree is mounted at a configurable base URL. Every request in
//! that subtree carries the current user (or an anonymous default user) for
//! the client-side library to consume.

pub mod api;
pub mod cli;
pub mod password;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
