pub mod h5p;
pub mod logging;
pub mod session;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ArgAction, ColorChoice, Command,
};

pub const ARG_PORT: &str = "port";
pub const ARG_DSN: &str = "dsn";
pub const ARG_IN_MEMORY: &str = "in-memory";
pub const ARG_BCRYPT_COST: &str = "bcrypt-cost";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("atelier")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("ATELIER_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long(ARG_DSN)
                .help("Database connection string")
                .env("ATELIER_DSN")
                .required_unless_present(ARG_IN_MEMORY),
        )
        .arg(
            Arg::new(ARG_IN_MEMORY)
                .long(ARG_IN_MEMORY)
                .help("Keep users and sessions in memory instead of PostgreSQL")
                .env("ATELIER_IN_MEMORY")
                .action(ArgAction::SetTrue)
                .value_parser(clap::builder::BoolishValueParser::new())
                .conflicts_with(ARG_DSN),
        )
        .arg(
            Arg::new(ARG_BCRYPT_COST)
                .long(ARG_BCRYPT_COST)
                .help("bcrypt cost factor")
                .env("ATELIER_BCRYPT_COST")
                .default_value("10")
                .value_parser(clap::value_parser!(u32).range(4..=31)),
        );

    let command = session::with_args(command);
    let command = h5p::with_args(command);
    logging::with_args(command)
}
