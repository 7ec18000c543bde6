//! CLI argument parsing for plcgate services.

use std::path::PathBuf;

use clap::Parser;

/// Common CLI arguments for plcgate services.
#[derive(Parser, Debug, Clone)]
#[command(about = "plcgate service")]
pub struct ServiceArgs {
    /// Path to configuration file (JSON5). A missing file means built-in defaults.
    #[arg(short, long)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

impl ServiceArgs {
    /// Parse CLI arguments, using `default_config` when `--config` is absent.
    pub fn parse_with_default(default_config: &'static str) -> Self {
        Self::parse_from_with_default(std::env::args_os(), default_config)
    }

    /// Parse from an explicit argument list. Exits the process on invalid input.
    pub fn parse_from_with_default<I, T>(args: I, default_config: &'static str) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = <Self as clap::CommandFactory>::command()
            .mut_arg("config", |arg| arg.default_value(default_config).required(false))
            .get_matches_from(args);

        <Self as clap::FromArgMatches>::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
    }
}
