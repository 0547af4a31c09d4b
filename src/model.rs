//! The in-memory test model.
//!
//! Built once by [`crate::discovery::discover`], then read by the executor
//! and the assertion engine. Nothing here is mutated after decoding.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::path::FieldPath;

/// How a test case names its definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionMode {
    /// `definition` is the schema value itself (`!ref "#Port"`).
    #[default]
    Value,
    /// `definition` is a string path looked up in the loaded document.
    Path,
}

/// The schema a case applies.
#[derive(Debug, Clone)]
pub enum Definition<V> {
    Value(V),
    Path(String),
}

impl<V> Definition<V> {
    /// How the definition is named in diagnostics.
    pub fn label<'a>(&'a self, case_name: &'a str) -> &'a str {
        match self {
            Definition::Value(_) => case_name,
            Definition::Path(path) => path,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TestCase<V> {
    pub group: String,
    pub name: String,
    pub definition: Definition<V>,
    pub input: V,
    pub assert: AssertSpec<V>,
}

impl<V> TestCase<V> {
    /// The definition label shown in diagnostics.
    pub fn definition_label(&self) -> &str {
        self.definition.label(&self.name)
    }
}

impl<V> fmt::Display for TestCase<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.name)
    }
}

#[derive(Debug, Clone)]
pub struct AssertSpec<V> {
    /// Demand a fully concrete result. Defaults to true.
    pub concrete: bool,
    pub expect: Expect<V>,
}

impl<V> Default for AssertSpec<V> {
    fn default() -> Self {
        Self {
            concrete: true,
            expect: Expect::Valid(OutputChecks::default()),
        }
    }
}

impl<V> AssertSpec<V> {
    pub fn expects_valid(&self) -> bool {
        matches!(self.expect, Expect::Valid(_))
    }
}

/// The two disjoint assertion modes, selected by `valid`.
#[derive(Debug, Clone)]
pub enum Expect<V> {
    Valid(OutputChecks<V>),
    Invalid(ErrorChecks<V>),
}

/// Checks on a successfully produced value.
#[derive(Debug, Clone)]
pub struct OutputChecks<V> {
    /// Partial expected tree, walked field by field.
    pub output: Option<V>,
    /// Deprecated: the whole result must unify with this.
    pub equal: Option<V>,
    /// Deprecated: the result must contain these fields and values.
    pub contains: Option<V>,
    /// Deprecated: per-path checks, in declaration order.
    pub fields: Vec<FieldCheck<V>>,
}

impl<V> Default for OutputChecks<V> {
    fn default() -> Self {
        Self {
            output: None,
            equal: None,
            contains: None,
            fields: Vec::new(),
        }
    }
}

impl<V> OutputChecks<V> {
    pub fn uses_legacy(&self) -> bool {
        self.equal.is_some() || self.contains.is_some() || !self.fields.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct FieldCheck<V> {
    pub path: FieldPath,
    pub equals: Option<V>,
}

/// Checks on the error of an invalid case.
#[derive(Debug, Clone)]
pub struct ErrorChecks<V> {
    /// Constraint unified with the error string.
    pub error: Option<V>,
    /// Deprecated: substring of the error string.
    pub contains: Option<String>,
    /// Deprecated: path expected to appear in the error string.
    pub path: Option<String>,
}

impl<V> Default for ErrorChecks<V> {
    fn default() -> Self {
        Self {
            error: None,
            contains: None,
            path: None,
        }
    }
}

impl<V> ErrorChecks<V> {
    pub fn uses_legacy(&self) -> bool {
        self.contains.is_some() || self.path.is_some()
    }
}
