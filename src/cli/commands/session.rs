use clap::{builder::BoolishValueParser, Arg, ArgAction, Command};

pub const ARG_SESSION_SECRET: &str = "session-secret";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_SESSION_COOKIE_SECURE: &str = "session-cookie-secure";

/// Minimum length of the cookie signing key, in bytes.
pub const MIN_SESSION_SECRET_LEN: usize = 32;

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_SECRET)
                .long(ARG_SESSION_SECRET)
                .help("Secret used to sign session cookies (at least 32 bytes)")
                .env("ATELIER_SESSION_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session lifetime in seconds")
                .env("ATELIER_SESSION_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_SESSION_COOKIE_SECURE)
                .long(ARG_SESSION_COOKIE_SECURE)
                .help("Mark the session cookie as Secure (HTTPS only)")
                .env("ATELIER_SESSION_COOKIE_SECURE")
                .action(ArgAction::SetTrue)
                .value_parser(BoolishValueParser::new()),
        )
}
