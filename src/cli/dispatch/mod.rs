use crate::{
    api::{AppConfig, Storage},
    cli::{
        actions::{server::Args, Action},
        commands::{
            self,
            h5p::{ARG_H5P_BASE_URL, ARG_H5P_PATH, ARG_PUBLIC_PATH},
            session::{
                ARG_SESSION_COOKIE_SECURE, ARG_SESSION_SECRET, ARG_SESSION_TTL_SECONDS,
                MIN_SESSION_SECRET_LEN,
            },
        },
    },
    password::hash::DEFAULT_COST,
};
use anyhow::{bail, Context, Result};
use secrecy::SecretString;
use std::path::PathBuf;

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches
        .get_one::<u16>(commands::ARG_PORT)
        .copied()
        .unwrap_or(8080);

    let storage = if matches.get_flag(commands::ARG_IN_MEMORY) {
        Storage::Memory
    } else {
        let dsn = matches
            .get_one::<String>(commands::ARG_DSN)
            .cloned()
            .context("missing required argument: --dsn")?;
        Storage::Postgres(dsn)
    };

    let session_secret = matches
        .get_one::<String>(ARG_SESSION_SECRET)
        .cloned()
        .context("missing required argument: --session-secret")?;
    if session_secret.len() < MIN_SESSION_SECRET_LEN {
        bail!("--session-secret must be at least {MIN_SESSION_SECRET_LEN} bytes long");
    }

    let h5p_base_url = matches
        .get_one::<String>(ARG_H5P_BASE_URL)
        .map_or("/h5p", String::as_str);
    if h5p_base_url.trim().trim_matches('/').is_empty() {
        bail!("--h5p-base-url can not be the site root");
    }

    let mut config = AppConfig::new(SecretString::from(session_secret))
        .with_session_cookie_secure(matches.get_flag(ARG_SESSION_COOKIE_SECURE))
        .with_h5p_base_url(h5p_base_url);

    if let Some(ttl) = matches.get_one::<i64>(ARG_SESSION_TTL_SECONDS) {
        config = config.with_session_ttl_seconds(*ttl);
    }
    if let Some(path) = matches.get_one::<String>(ARG_H5P_PATH) {
        config = config.with_h5p_path(PathBuf::from(path));
    }
    if let Some(path) = matches.get_one::<String>(ARG_PUBLIC_PATH) {
        config = config.with_public_path(PathBuf::from(path));
    }

    let bcrypt_cost = matches
        .get_one::<u32>(commands::ARG_BCRYPT_COST)
        .copied()
        .unwrap_or(DEFAULT_COST);

    Ok(Action::Server(Args {
        port,
        storage,
        config,
        bcrypt_cost,
    }))
}
