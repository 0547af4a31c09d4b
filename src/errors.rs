//! Error types for loading, decoding, and executing test suites.
//!
//! Three layers:
//! - [`ValueErrors`]: what the structured-value engine reports (conflicts,
//!   incomplete values), always qualified by the path where they occur.
//! - [`ExecError`]: why a single test case did not produce a valid value. It
//!   travels on the `err` channel of an execution outcome.
//! - [`HarnessError`]: fatal problems with the suite itself (unreadable
//!   files, malformed test records, configuration). Rendered with `miette`.

use std::fmt;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::path::{FieldPath, PathError};

// ============================================================================
// VALUE ERRORS - reported by the unification engine
// ============================================================================

/// A single engine error at a path.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueError {
    pub path: FieldPath,
    pub message: String,
}

impl ValueError {
    pub fn new(path: FieldPath, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_root() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Every error found in one validation pass, in traversal order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueErrors(pub Vec<ValueError>);

impl ValueErrors {
    pub fn single(path: FieldPath, message: impl Into<String>) -> Self {
        Self(vec![ValueError::new(path, message)])
    }

    pub fn push(&mut self, error: ValueError) {
        self.0.push(error);
    }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> Result<(), ValueErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValueErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValueErrors {}

// ============================================================================
// EXECUTION ERRORS - the `err` channel of an outcome
// ============================================================================

#[derive(Debug, Clone, Error)]
pub enum ExecError {
    #[error("definition {definition:?} not found")]
    DefinitionNotFound { definition: String },

    #[error("definition {definition:?} has errors: {errors}")]
    DefinitionErrored {
        definition: String,
        errors: ValueErrors,
    },

    #[error(transparent)]
    DefinitionPath(#[from] PathError),

    #[error("cannot convert input to open value: {0}")]
    OpenInput(ValueErrors),

    #[error("{0}")]
    Validation(ValueErrors),
}

impl ExecError {
    /// Execution stopped before validation. Only [`ExecError::Validation`]
    /// comes from the engine judging the input.
    pub fn stopped_execution(&self) -> bool {
        !matches!(self, ExecError::Validation(_))
    }
}

// ============================================================================
// HARNESS ERRORS - fatal for loading a suite
// ============================================================================

#[derive(Debug, Error, Diagnostic)]
pub enum HarnessError {
    #[error("failed to read {path}")]
    #[diagnostic(code(schema_harness::load::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk {dir}")]
    #[diagnostic(code(schema_harness::load::walk))]
    Walk {
        dir: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to parse {path}")]
    #[diagnostic(code(schema_harness::load::yaml))]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{path}: {message}")]
    #[diagnostic(code(schema_harness::load::compile))]
    Compile { path: String, message: String },

    #[error("no suite files selected in {dir}")]
    #[diagnostic(
        code(schema_harness::load::empty),
        help("suite files end in .yaml or .yml; check the pattern and the build tags")
    )]
    NoSources { dir: PathBuf },

    #[error("no tests found: `#tests` is not defined")]
    #[diagnostic(
        code(schema_harness::decode::no_tests),
        help("declare test groups as lists under a top-level `#tests` key")
    )]
    NoTests,

    #[error("#tests has errors:\n{errors}")]
    #[diagnostic(code(schema_harness::decode::tests))]
    TestsErrored { errors: ValueErrors },

    #[error("{location}: {message}")]
    #[diagnostic(code(schema_harness::decode))]
    Decode { location: String, message: String },

    #[error("invalid configuration in {path}")]
    #[diagnostic(code(schema_harness::config))]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl HarnessError {
    pub fn decode(location: impl fmt::Display, message: impl Into<String>) -> Self {
        HarnessError::Decode {
            location: location.to_string(),
            message: message.into(),
        }
    }
}
