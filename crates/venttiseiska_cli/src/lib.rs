//! # vsk - Venttiseiska Scenario Runner
//!
//! Replays a TOML scenario against a [`venttiseiska::Emitter`] and prints a
//! JSON report of every callback invocation, the events still bound and the
//! emitter statistics.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run the default scenario.toml
//! vsk
//!
//! # Pick a scenario and show emitter debug logs
//! vsk --scenario demo.toml --log-level debug --pretty
//!
//! # JSON logging on stderr
//! vsk --json-logs
//! ```
//!
//! See [`config`] for the scenario format.

use tracing::error;

pub mod cli;
pub mod config;
pub mod logging;
pub mod runner;

pub use cli::CliArgs;
pub use config::{BindSpec, Scenario, Step};
pub use runner::{run_scenario, Invocation, Report, ScenarioRunner};

/// Entry point used by the `vsk` binary.
///
/// Parses arguments, initializes logging, replays the scenario and writes the
/// report to stdout.
pub fn init() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    if let Err(e) = logging::setup_logging(&args.log_level, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    let report = Scenario::load_from_file(&args.scenario_path)
        .and_then(|scenario| run_scenario(&scenario));

    match report {
        Ok(report) => {
            let output = if args.pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{output}");
            Ok(())
        }
        Err(e) => {
            error!("❌ Scenario failed: {e:#}");
            Err(e)
        }
    }
}
