use crate::api::{self, AppConfig, Storage};
use anyhow::Result;
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub storage: Storage,
    pub config: AppConfig,
    pub bcrypt_cost: u32,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    api::new(args.port, args.storage, args.config, args.bcrypt_cost).await
}

fn log_startup_args(args: &Args) {
    let storage = match &args.storage {
        Storage::Postgres(dsn) => redact_dsn(dsn),
        Storage::Memory => "in-memory".to_string(),
    };
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("storage", storage),
        ("bcrypt_cost", args.bcrypt_cost.to_string()),
        (
            "session_ttl_seconds",
            args.config.session_ttl_seconds().to_string(),
        ),
        (
            "session_cookie_secure",
            args.config.session_cookie_secure().to_string(),
        ),
        ("h5p_base_url", args.config.h5p_base_url().to_string()),
        ("h5p_path", args.config.h5p_path().display().to_string()),
        ("public_path", args.config.public_path().display().to_string()),
    ];
    log_entries("Startup configuration", &entries);
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\n{title}:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}
