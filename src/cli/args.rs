//! Command-line arguments and subcommands.
//!
//! Uses the `clap` derive API. Suite flags override values read from the
//! suite's `harness.yaml`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::HarnessConfig;
use crate::errors::HarnessError;
use crate::model::DefinitionMode;

#[derive(Debug, Parser)]
#[command(
    name = "schema-harness",
    version,
    about = "Run declarative test suites against schema definitions."
)]
pub struct HarnessArgs {
    /// Log loading and discovery details to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load a suite, run every case, and report the results.
    Test {
        #[command(flatten)]
        suite: SuiteArgs,

        /// Only run cases whose name contains this text (case-insensitive).
        #[arg(long)]
        filter: Option<String>,

        /// Print the summary as JSON instead of the colored report.
        #[arg(long)]
        json: bool,
    },
    /// List discovered groups and cases without running them.
    List {
        #[command(flatten)]
        suite: SuiteArgs,
    },
}

/// Flags shared by every subcommand that loads a suite.
#[derive(Debug, Args)]
pub struct SuiteArgs {
    /// Suite root: schema files live here, test files under the pattern.
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    /// Test package directory, relative to the suite root.
    #[arg(long)]
    pub pattern: Option<String>,

    /// Active build tag; repeat for several. Replaces the configured tags.
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// How `definition` fields are read.
    #[arg(long, value_enum)]
    pub definition_mode: Option<DefinitionMode>,

    /// Disable colored output.
    #[arg(long)]
    pub no_color: bool,
}

impl SuiteArgs {
    /// The suite's configuration with these flags applied on top.
    pub fn config(&self) -> Result<HarnessConfig, HarnessError> {
        let mut config = HarnessConfig::load(&self.dir)?;
        if let Some(pattern) = &self.pattern {
            config.pattern = pattern.clone();
        }
        if !self.tags.is_empty() {
            config.tags = self.tags.clone();
        }
        if let Some(mode) = self.definition_mode {
            config.definition_mode = mode;
        }
        if self.no_color {
            config.use_colors = false;
        }
        Ok(config)
    }
}
