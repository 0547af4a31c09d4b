//! The `schema-harness` command line.
//!
//! This module is the entry point for all CLI commands and orchestrates the
//! library: configuration, loading, discovery, running, and reporting.

use std::process::ExitCode;

use clap::Parser;
use miette::Report;
use tracing_subscriber::EnvFilter;

use crate::errors::HarnessError;
use crate::loader::YamlLoader;
use crate::runner::{load_suite, run_cases};

pub mod args;
pub mod output;

use args::{Command, HarnessArgs};

/// Parses arguments, runs the command, and maps the result to an exit code:
/// success, or 1 when any case failed or the suite could not be loaded.
pub fn run() -> ExitCode {
    let args = HarnessArgs::parse();
    init_logging(args.verbose);

    match execute(args.command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            print_error(error);
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr. `RUST_LOG` wins over `--verbose`.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "schema_harness=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A subscriber may already be installed when embedded.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn print_error(error: HarnessError) {
    let report = Report::new(error);
    eprintln!("{report:?}");
}

fn execute(command: Command) -> Result<bool, HarnessError> {
    match command {
        Command::Test {
            suite,
            filter,
            json,
        } => {
            let mut config = suite.config()?;
            if filter.is_some() {
                config.filter = filter;
            }
            let (document, discovered) = load_suite(&YamlLoader, &config)?;
            let summary = run_cases(&document, &discovered, &config);
            let printed = if json {
                output::print_json(&summary)
            } else {
                output::print_report(&summary, config.use_colors)
            };
            if let Err(error) = printed {
                tracing::error!(%error, "failed to write report");
            }
            Ok(summary.is_success())
        }
        Command::List { suite } => {
            let config = suite.config()?;
            let (_, discovered) = load_suite(&YamlLoader, &config)?;
            if let Err(error) = output::print_listing(&discovered, config.use_colors) {
                tracing::error!(%error, "failed to write listing");
            }
            Ok(true)
        }
    }
}
