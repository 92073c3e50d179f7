use clap::{Arg, Command};

pub const ARG_H5P_BASE_URL: &str = "h5p-base-url";
pub const ARG_H5P_PATH: &str = "h5p-path";
pub const ARG_PUBLIC_PATH: &str = "public-path";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_H5P_BASE_URL)
                .long(ARG_H5P_BASE_URL)
                .help("URL prefix the H5P subtree is mounted at")
                .env("ATELIER_H5P_BASE_URL")
                .default_value("/h5p"),
        )
        .arg(
            Arg::new(ARG_H5P_PATH)
                .long(ARG_H5P_PATH)
                .help("Directory holding the H5P core, editor, libraries and content")
                .env("ATELIER_H5P_PATH")
                .default_value("./h5p"),
        )
        .arg(
            Arg::new(ARG_PUBLIC_PATH)
                .long(ARG_PUBLIC_PATH)
                .help("Directory of static assets served at /public")
                .env("ATELIER_PUBLIC_PATH")
                .default_value("./public"),
        )
}
