//! Command-line interface handling for the `vsk` scenario runner.
//!
//! Argument parsing uses the `clap` builder API.

use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

/// Command line arguments parsed from user input.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the scenario file
    pub scenario_path: PathBuf,
    /// Log level filter, overridden by `RUST_LOG`
    pub log_level: String,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Whether to pretty-print the report
    pub pretty: bool,
}

impl CliArgs {
    /// Builds the clap command definition.
    pub fn command() -> Command {
        Command::new("vsk")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Replays tagged event scenarios against a venttiseiska emitter")
            .arg(
                Arg::new("scenario")
                    .short('s')
                    .long("scenario")
                    .value_name("FILE")
                    .help("Scenario file path")
                    .default_value("scenario.toml"),
            )
            .arg(
                Arg::new("log-level")
                    .short('l')
                    .long("log-level")
                    .value_name("LEVEL")
                    .help("Log level (trace, debug, info, warn, error)")
                    .default_value("info"),
            )
            .arg(
                Arg::new("json-logs")
                    .long("json-logs")
                    .help("Output logs in JSON format")
                    .action(clap::ArgAction::SetTrue),
            )
            .arg(
                Arg::new("pretty")
                    .short('p')
                    .long("pretty")
                    .help("Pretty-print the JSON report")
                    .action(clap::ArgAction::SetTrue),
            )
    }

    /// Parses the process arguments, exiting with usage on error.
    pub fn parse() -> Self {
        Self::from_matches(&Self::command().get_matches())
    }

    /// Parses an explicit argument list.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = Self::command().try_get_matches_from(args)?;
        Ok(Self::from_matches(&matches))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            scenario_path: matches
                .get_one::<String>("scenario")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("scenario.toml")),
            log_level: matches
                .get_one::<String>("log-level")
                .cloned()
                .unwrap_or_else(|| "info".to_string()),
            json_logs: matches.get_flag("json-logs"),
            pretty: matches.get_flag("pretty"),
        }
    }
}
