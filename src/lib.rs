//! A declarative test harness for schema definitions.
//!
//! Test suites live next to the schema as data: a `#tests` field maps group
//! names to lists of cases, each naming a definition, an input, and the
//! expected outcome. The harness unifies each input with its definition,
//! validates the result, and checks it against the expectation.

pub use crate::engine::Structured;
pub use crate::errors::{ExecError, HarnessError};

pub mod assertion;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod errors;
pub mod executor;
pub mod format;
pub mod loader;
pub mod model;
pub mod path;
pub mod runner;
pub mod value;
