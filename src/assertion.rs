//! Deciding whether an outcome meets a case's expectations.
//!
//! A case expecting a valid result fails outright when execution reported
//! an error. Otherwise one output strategy runs, picked from a table by the
//! checks the case declares: the `output` tree walk, or the deprecated
//! `equal`/`contains`/`fields` family. A case expecting an invalid result
//! has its error string checked against `error`, `errorContains` and
//! `errorPath`.
//!
//! Every failure carries the definition label and the path, expected and
//! actual values that explain it.

use std::fmt;

use serde::Serialize;

use crate::engine::{Lookup, Shape, Structured, Validation};
use crate::errors::{ExecError, ValueErrors};
use crate::executor::Outcome;
use crate::format::{format_value, preview, pretty, render_value, DEFAULT_PREVIEW_LIMIT};
use crate::model::{ErrorChecks, Expect, OutputChecks, TestCase};
use crate::path::FieldPath;

// ============================================================================
// FAILURES
// ============================================================================

/// Why a case failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Failure {
    ExpectedValid {
        definition: String,
        concrete: bool,
        input: String,
        error: String,
    },
    ExpectedInvalid {
        definition: String,
        concrete: bool,
        input: String,
        output: String,
    },
    /// Execution stopped before validation: the definition did not resolve
    /// or the input could not be reopened.
    ExecutionFailed {
        definition: String,
        error: String,
    },
    FieldNotFound {
        definition: String,
        field: FieldPath,
    },
    FieldError {
        definition: String,
        field: FieldPath,
        error: String,
    },
    /// A list in the `output` tree has a different number of elements.
    LengthMismatch {
        definition: String,
        field: FieldPath,
        expected: usize,
        actual: usize,
    },
    /// A leaf of the `output` tree did not unify with the actual value.
    OutputMismatch {
        definition: String,
        field: FieldPath,
        expected: String,
        actual: String,
        error: String,
    },
    EqualMismatch {
        definition: String,
        expected: String,
        actual: String,
        error: String,
    },
    ContainsMismatch {
        definition: String,
        error: String,
    },
    /// `expected` and `actual` are absent when either side has no literal
    /// rendering; `error` then explains the mismatch.
    FieldValueMismatch {
        definition: String,
        field: FieldPath,
        expected: Option<String>,
        actual: Option<String>,
        error: String,
    },
    ErrorMismatch {
        definition: String,
        expected: String,
        error: String,
        reason: String,
    },
    ErrorContains {
        definition: String,
        expected: String,
        error: String,
    },
    ErrorPath {
        definition: String,
        expected: String,
        error: String,
    },
    /// The harness itself could not complete a check.
    Internal {
        definition: String,
        message: String,
    },
}

/// How a detail line is highlighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Definition,
    Expected,
    Actual,
    Muted,
    Plain,
}

/// One `label: value` line of a failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Detail {
    pub label: &'static str,
    pub value: String,
    pub tone: Tone,
}

fn detail(label: &'static str, value: impl Into<String>, tone: Tone) -> Detail {
    Detail {
        label,
        value: value.into(),
        tone,
    }
}

impl Failure {
    pub fn title(&self) -> &'static str {
        match self {
            Failure::ExpectedValid { .. } => "expected valid, but got error",
            Failure::ExpectedInvalid { .. } => "expected invalid, but validation passed",
            Failure::ExecutionFailed { .. } => "execution failed",
            Failure::LengthMismatch { .. } => "list length mismatch",
            Failure::FieldNotFound { .. } => "field not found",
            Failure::FieldError { .. } => "field error",
            Failure::OutputMismatch { .. } | Failure::EqualMismatch { .. } => "output mismatch",
            Failure::ContainsMismatch { .. } => "output does not contain expected values",
            Failure::FieldValueMismatch { .. } => "field value mismatch",
            Failure::ErrorMismatch { .. } => "error does not satisfy constraint",
            Failure::ErrorContains { .. } => "error message mismatch",
            Failure::ErrorPath { .. } => "error path mismatch",
            Failure::Internal { .. } => "internal error",
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Failure::Internal { .. })
    }

    pub fn definition(&self) -> &str {
        match self {
            Failure::ExpectedValid { definition, .. }
            | Failure::ExpectedInvalid { definition, .. }
            | Failure::ExecutionFailed { definition, .. }
            | Failure::LengthMismatch { definition, .. }
            | Failure::FieldNotFound { definition, .. }
            | Failure::FieldError { definition, .. }
            | Failure::OutputMismatch { definition, .. }
            | Failure::EqualMismatch { definition, .. }
            | Failure::ContainsMismatch { definition, .. }
            | Failure::FieldValueMismatch { definition, .. }
            | Failure::ErrorMismatch { definition, .. }
            | Failure::ErrorContains { definition, .. }
            | Failure::ErrorPath { definition, .. }
            | Failure::Internal { definition, .. } => definition,
        }
    }

    /// The lines printed under the title, definition first.
    pub fn details(&self) -> Vec<Detail> {
        let mut lines = vec![detail("definition", self.definition(), Tone::Definition)];
        match self {
            Failure::ExpectedValid {
                concrete,
                input,
                error,
                ..
            } => {
                lines.push(detail("concrete", concrete.to_string(), Tone::Plain));
                lines.push(detail("input", input, Tone::Muted));
                lines.push(detail("error", error, Tone::Actual));
            }
            Failure::ExpectedInvalid {
                concrete,
                input,
                output,
                ..
            } => {
                lines.push(detail("concrete", concrete.to_string(), Tone::Plain));
                lines.push(detail("input", input, Tone::Muted));
                lines.push(detail("output", output, Tone::Muted));
            }
            Failure::ExecutionFailed { error, .. } => {
                lines.push(detail("error", error, Tone::Actual));
            }
            Failure::LengthMismatch {
                field,
                expected,
                actual,
                ..
            } => {
                lines.push(detail("field", field.to_string(), Tone::Plain));
                lines.push(detail("expected", format!("{expected} elements"), Tone::Expected));
                lines.push(detail("actual", format!("{actual} elements"), Tone::Actual));
            }
            Failure::FieldNotFound { field, .. } => {
                lines.push(detail("field", field.to_string(), Tone::Actual));
            }
            Failure::FieldError { field, error, .. } => {
                lines.push(detail("field", field.to_string(), Tone::Plain));
                lines.push(detail("error", error, Tone::Actual));
            }
            Failure::OutputMismatch {
                field,
                expected,
                actual,
                error,
                ..
            } => {
                lines.push(detail("field", field.to_string(), Tone::Plain));
                lines.push(detail("expected", expected, Tone::Expected));
                lines.push(detail("actual", actual, Tone::Actual));
                lines.push(detail("error", error, Tone::Muted));
            }
            Failure::EqualMismatch {
                expected,
                actual,
                error,
                ..
            } => {
                lines.push(detail("expected", expected, Tone::Expected));
                lines.push(detail("actual", actual, Tone::Actual));
                lines.push(detail("error", error, Tone::Muted));
            }
            Failure::ContainsMismatch { error, .. } => {
                lines.push(detail("error", error, Tone::Actual));
            }
            Failure::FieldValueMismatch {
                field,
                expected,
                actual,
                error,
                ..
            } => {
                lines.push(detail("field", field.to_string(), Tone::Plain));
                match (expected, actual) {
                    (Some(expected), Some(actual)) => {
                        lines.push(detail("expected", expected, Tone::Expected));
                        lines.push(detail("actual", actual, Tone::Actual));
                    }
                    _ => lines.push(detail("error", error, Tone::Actual)),
                }
            }
            Failure::ErrorMismatch {
                expected,
                error,
                reason,
                ..
            } => {
                lines.push(detail("expected", format!("error matching {expected}"), Tone::Expected));
                lines.push(detail("got", error, Tone::Actual));
                lines.push(detail("reason", reason, Tone::Muted));
            }
            Failure::ErrorContains { expected, error, .. } => {
                lines.push(detail("expected", format!("error containing {expected:?}"), Tone::Expected));
                lines.push(detail("got", error, Tone::Actual));
            }
            Failure::ErrorPath { expected, error, .. } => {
                lines.push(detail("expected", format!("error at path {expected:?}"), Tone::Expected));
                lines.push(detail("got", error, Tone::Actual));
            }
            Failure::Internal { message, .. } => {
                lines.push(detail("error", message, Tone::Actual));
            }
        }
        lines
    }
}

/// Width of the label column, `definition:` plus a space.
pub const LABEL_WIDTH: usize = 12;

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title())?;
        for line in self.details() {
            let label = format!("{}:", line.label);
            let continuation = format!("\n  {:width$}", "", width = LABEL_WIDTH);
            write!(
                f,
                "\n  {label:<width$}{}",
                line.value.replace('\n', &continuation),
                width = LABEL_WIDTH
            )?;
        }
        Ok(())
    }
}

/// Every failure of one case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureReport {
    pub group: String,
    pub case: String,
    pub failures: Vec<Failure>,
}

impl FailureReport {
    /// Whether any failure came from the harness rather than the case.
    pub fn is_internal(&self) -> bool {
        self.failures.iter().any(Failure::is_internal)
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.case)?;
        for failure in &self.failures {
            write!(f, "\n{failure}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Pass,
    Fail(FailureReport),
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

// ============================================================================
// CHECKER
// ============================================================================

/// Checks outcomes against expectations.
#[derive(Debug, Clone, Copy)]
pub struct Checker {
    preview_limit: usize,
}

impl Default for Checker {
    fn default() -> Self {
        Self::new(DEFAULT_PREVIEW_LIMIT)
    }
}

/// Checks with default settings.
pub fn check<V: Structured>(outcome: &Outcome<V>, case: &TestCase<V>) -> Verdict {
    Checker::default().check(outcome, case)
}

/// What every check needs to know about the case under test.
struct Scope<'a, V> {
    checker: &'a Checker,
    case: &'a TestCase<V>,
}

impl<V: Structured> Scope<'_, V> {
    fn definition(&self) -> String {
        self.case.definition_label().to_string()
    }

    fn input_preview(&self) -> String {
        preview(&self.case.input, self.checker.preview_limit)
    }

    fn internal(&self, message: impl Into<String>) -> Failure {
        Failure::Internal {
            definition: self.definition(),
            message: message.into(),
        }
    }
}

/// An output strategy: applies when `applies` holds, first match wins.
struct Strategy<V> {
    name: &'static str,
    applies: fn(&OutputChecks<V>) -> bool,
    run: fn(&Scope<'_, V>, &V, &OutputChecks<V>) -> Vec<Failure>,
}

fn output_strategies<V: Structured>() -> [Strategy<V>; 2] {
    [
        Strategy {
            name: "output",
            applies: |checks| checks.output.is_some(),
            run: walk_output,
        },
        Strategy {
            name: "legacy",
            applies: OutputChecks::uses_legacy,
            run: legacy_output,
        },
    ]
}

impl Checker {
    pub fn new(preview_limit: usize) -> Self {
        Self { preview_limit }
    }

    pub fn check<V: Structured>(&self, outcome: &Outcome<V>, case: &TestCase<V>) -> Verdict {
        let scope = Scope {
            checker: self,
            case,
        };
        let failures = match &case.assert.expect {
            Expect::Valid(checks) => check_valid(&scope, outcome, checks),
            Expect::Invalid(checks) => check_invalid(&scope, outcome, checks),
        };
        if failures.is_empty() {
            Verdict::Pass
        } else {
            Verdict::Fail(FailureReport {
                group: case.group.clone(),
                case: case.name.clone(),
                failures,
            })
        }
    }
}

fn check_valid<V: Structured>(scope: &Scope<'_, V>, outcome: &Outcome<V>, checks: &OutputChecks<V>) -> Vec<Failure> {
    if let Some(failure) = execution_failure(scope, outcome) {
        return vec![failure];
    }
    if let Some(err) = &outcome.err {
        return vec![Failure::ExpectedValid {
            definition: scope.definition(),
            concrete: scope.case.assert.concrete,
            input: scope.input_preview(),
            error: err.to_string(),
        }];
    }
    let Some(actual) = &outcome.value else {
        return vec![scope.internal("execution produced neither a value nor an error")];
    };
    match output_strategies::<V>()
        .into_iter()
        .find(|strategy| (strategy.applies)(checks))
    {
        Some(strategy) => {
            tracing::trace!(case = %scope.case, strategy = strategy.name, "checking output");
            (strategy.run)(scope, actual, checks)
        }
        None => Vec::new(),
    }
}

// ============================================================================
// OUTPUT TREE WALK
// ============================================================================

fn walk_output<V: Structured>(scope: &Scope<'_, V>, actual: &V, checks: &OutputChecks<V>) -> Vec<Failure> {
    let mut failures = Vec::new();
    if let Some(expected) = &checks.output {
        walk(scope, actual, expected, &FieldPath::root(), &mut failures);
    }
    failures
}

/// Branches (structs and lists) recurse per declared child and are never
/// unified wholesale, so undeclared fields of the actual value are ignored.
fn walk<V: Structured>(
    scope: &Scope<'_, V>,
    actual: &V,
    expected: &V,
    path: &FieldPath,
    failures: &mut Vec<Failure>,
) {
    match expected.shape() {
        Shape::Struct => {}
        Shape::List => return walk_list(scope, actual, expected, path, failures),
        _ => return check_leaf(scope, actual, expected, path, failures),
    }
    let children = expected.fields();
    if children.is_empty() {
        // `{}` still asserts the field exists.
        if !path.is_root() {
            resolve_field(scope, actual, path, failures);
        }
        return;
    }
    for (name, child) in children {
        walk(scope, actual, &child, &path.child(name), failures);
    }
}

/// Lists must match in length; elements are then walked by index.
fn walk_list<V: Structured>(
    scope: &Scope<'_, V>,
    actual: &V,
    expected: &V,
    path: &FieldPath,
    failures: &mut Vec<Failure>,
) {
    let found = if path.is_root() {
        actual.clone()
    } else {
        match resolve_field(scope, actual, path, failures) {
            Some(found) => found,
            None => return,
        }
    };
    let expected_items = expected.elements().unwrap_or_default();
    let Some(actual_items) = found.elements() else {
        failures.push(Failure::OutputMismatch {
            definition: scope.definition(),
            field: path.clone(),
            expected: render_value(expected),
            actual: render_value(&found),
            error: format!("expected a list, found {}", found.describe()),
        });
        return;
    };
    if actual_items.len() != expected_items.len() {
        failures.push(Failure::LengthMismatch {
            definition: scope.definition(),
            field: path.clone(),
            expected: expected_items.len(),
            actual: actual_items.len(),
        });
        return;
    }
    for (i, item) in expected_items.iter().enumerate() {
        walk(scope, actual, item, &path.index(i), failures);
    }
}

fn check_leaf<V: Structured>(
    scope: &Scope<'_, V>,
    actual: &V,
    expected: &V,
    path: &FieldPath,
    failures: &mut Vec<Failure>,
) {
    let Some(found) = resolve_field(scope, actual, path, failures) else {
        return;
    };
    if let Err(errors) = found.unify(expected).validate(Validation::Concrete) {
        failures.push(Failure::OutputMismatch {
            definition: scope.definition(),
            field: path.clone(),
            expected: render_value(expected),
            actual: render_value(&found),
            error: errors.to_string(),
        });
    }
}

/// Looks `path` up in the actual value, recording a failure when it is
/// missing or errored.
fn resolve_field<V: Structured>(
    scope: &Scope<'_, V>,
    actual: &V,
    path: &FieldPath,
    failures: &mut Vec<Failure>,
) -> Option<V> {
    match actual.lookup(path) {
        Lookup::Found(value) => Some(value),
        Lookup::Missing => {
            failures.push(Failure::FieldNotFound {
                definition: scope.definition(),
                field: path.clone(),
            });
            None
        }
        Lookup::Errored(errors) => {
            failures.push(Failure::FieldError {
                definition: scope.definition(),
                field: path.clone(),
                error: errors.to_string(),
            });
            None
        }
    }
}

// ============================================================================
// DEPRECATED OUTPUT CHECKS
// ============================================================================

fn legacy_output<V: Structured>(scope: &Scope<'_, V>, actual: &V, checks: &OutputChecks<V>) -> Vec<Failure> {
    let mut failures = Vec::new();

    if let Some(expected) = &checks.equal {
        if let Err(errors) = actual.unify(expected).validate(Validation::Concrete) {
            failures.push(Failure::EqualMismatch {
                definition: scope.definition(),
                expected: pretty(expected),
                actual: pretty(actual),
                error: errors.to_string(),
            });
        }
    }

    if let Some(expected) = &checks.contains {
        // Opened so fields the expectation leaves out are tolerated.
        if let Err(errors) = actual.unify(&expected.open()).validate(Validation::Concrete) {
            failures.push(Failure::ContainsMismatch {
                definition: scope.definition(),
                error: errors.to_string(),
            });
        }
    }

    for check in &checks.fields {
        let Some(found) = resolve_field(scope, actual, &check.path, &mut failures) else {
            continue;
        };
        let Some(expected) = &check.equals else {
            continue;
        };
        if let Err(errors) = found.unify(expected).validate(Validation::Concrete) {
            let rendered = format_value(expected).ok().zip(format_value(&found).ok());
            failures.push(Failure::FieldValueMismatch {
                definition: scope.definition(),
                field: check.path.clone(),
                expected: rendered.as_ref().map(|(e, _)| e.clone()),
                actual: rendered.map(|(_, a)| a),
                error: errors.to_string(),
            });
        }
    }

    failures
}

// ============================================================================
// ERROR CHECKS
// ============================================================================

fn check_invalid<V: Structured>(scope: &Scope<'_, V>, outcome: &Outcome<V>, checks: &ErrorChecks<V>) -> Vec<Failure> {
    // Only a validation error can be the error the case expects.
    if let Some(failure) = execution_failure(scope, outcome) {
        return vec![failure];
    }
    let err = match (&outcome.err, &outcome.value) {
        (Some(err), _) => err.clone(),
        (None, Some(value)) => match escalate(scope, value) {
            Some(errors) => ExecError::Validation(errors),
            None => {
                return vec![Failure::ExpectedInvalid {
                    definition: scope.definition(),
                    concrete: scope.case.assert.concrete,
                    input: scope.input_preview(),
                    output: value
                        .to_json()
                        .map(|json| json.to_string())
                        .unwrap_or_default(),
                }]
            }
        },
        (None, None) => return vec![scope.internal("execution produced neither a value nor an error")],
    };
    let message = err.to_string();
    let mut failures = Vec::new();

    if let Some(constraint) = &checks.error {
        match V::from_string(&message) {
            Ok(compiled) => {
                if let Err(errors) = compiled.unify(constraint).validate(Validation::Concrete) {
                    failures.push(Failure::ErrorMismatch {
                        definition: scope.definition(),
                        expected: render_value(constraint),
                        error: message.clone(),
                        reason: errors.to_string(),
                    });
                }
            }
            Err(errors) => failures.push(scope.internal(format!("cannot compile error message: {errors}"))),
        }
    }

    if let Some(fragment) = &checks.contains {
        if !message.contains(fragment.as_str()) {
            failures.push(Failure::ErrorContains {
                definition: scope.definition(),
                expected: fragment.clone(),
                error: message.clone(),
            });
        }
    }

    if let Some(path) = &checks.path {
        if !message.contains(path.as_str()) {
            failures.push(Failure::ErrorPath {
                definition: scope.definition(),
                expected: path.clone(),
                error: message.clone(),
            });
        }
    }

    failures
}

/// Fails the case in either mode when execution never reached validation.
fn execution_failure<V: Structured>(scope: &Scope<'_, V>, outcome: &Outcome<V>) -> Option<Failure> {
    let err = outcome.err.as_ref().filter(|err| err.stopped_execution())?;
    Some(Failure::ExecutionFailed {
        definition: scope.definition(),
        error: err.to_string(),
    })
}

/// A structurally valid result may still be invalid once concreteness is
/// required. Only cases that ask for concreteness are escalated.
fn escalate<V: Structured>(scope: &Scope<'_, V>, value: &V) -> Option<ValueErrors> {
    if !scope.case.assert.concrete {
        return None;
    }
    value.validate(Validation::Concrete).err()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Validation;
    use crate::model::{AssertSpec, Definition, FieldCheck};
    use crate::value::{Kind, Value};

    fn path(text: &str) -> FieldPath {
        FieldPath::parse(text).unwrap()
    }

    fn case(expect: Expect<Value>) -> TestCase<Value> {
        TestCase {
            group: "port".into(),
            name: "case".into(),
            definition: Definition::Path("#Port".into()),
            input: Value::structure([("number", Value::Int(8080))], false),
            assert: AssertSpec {
                concrete: true,
                expect,
            },
        }
    }

    fn valid(checks: OutputChecks<Value>) -> TestCase<Value> {
        case(Expect::Valid(checks))
    }

    fn invalid(checks: ErrorChecks<Value>) -> TestCase<Value> {
        case(Expect::Invalid(checks))
    }

    fn produced(value: Value) -> Outcome<Value> {
        Outcome {
            value: Some(value),
            err: None,
        }
    }

    fn failed(value: Value) -> Outcome<Value> {
        let err = value.validate(Validation::Structural).err().map(ExecError::Validation);
        Outcome {
            value: Some(value),
            err,
        }
    }

    fn failures(verdict: Verdict) -> Vec<Failure> {
        match verdict {
            Verdict::Pass => Vec::new(),
            Verdict::Fail(report) => report.failures,
        }
    }

    fn service() -> Value {
        Value::structure(
            [
                ("number", Value::Int(8080)),
                ("normalized", Value::Int(8080)),
                ("protocol", Value::from("TCP")),
                (
                    "metadata",
                    Value::structure([("name", Value::from("web"))], true),
                ),
            ],
            true,
        )
    }

    #[test]
    fn valid_without_checks_passes() {
        assert!(check(&produced(service()), &valid(OutputChecks::default())).is_pass());
    }

    #[test]
    fn error_when_valid_expected_is_fatal() {
        let outcome = failed(Value::structure(
            [("number", Value::bottom("conflicting values int and \"eighty\""))],
            true,
        ));
        let checks = OutputChecks {
            output: Some(Value::structure([("number", Value::Int(1))], false)),
            ..OutputChecks::default()
        };
        let found = failures(check(&outcome, &valid(checks)));
        assert_eq!(found.len(), 1);
        match &found[0] {
            Failure::ExpectedValid {
                definition,
                concrete,
                input,
                error,
            } => {
                assert_eq!(definition, "#Port");
                assert!(*concrete);
                assert_eq!(input, r#"{"number":8080}"#);
                assert!(error.contains("conflicting values"));
            }
            other => panic!("unexpected failure {other:?}"),
        }
    }

    #[test]
    fn output_walk_checks_only_declared_leaves() {
        let checks = OutputChecks {
            output: Some(Value::structure(
                [
                    ("normalized", Value::Int(8080)),
                    ("metadata", Value::structure([("name", Value::from("web"))], false)),
                ],
                false,
            )),
            ..OutputChecks::default()
        };
        assert!(check(&produced(service()), &valid(checks)).is_pass());
    }

    #[test]
    fn output_walk_collects_every_leaf_failure() {
        let checks = OutputChecks {
            output: Some(Value::structure(
                [
                    ("number", Value::Int(9090)),
                    ("protocol", Value::kind(Kind::String)),
                    ("metadata", Value::structure([("fqn", Value::from("web.default"))], false)),
                ],
                false,
            )),
            ..OutputChecks::default()
        };
        let found = failures(check(&produced(service()), &valid(checks)));
        assert_eq!(found.len(), 2, "{found:?}");
        assert!(matches!(
            &found[0],
            Failure::FieldNotFound { field, .. } if field == &path("metadata.fqn")
        ));
        match &found[1] {
            Failure::OutputMismatch {
                field,
                expected,
                actual,
                ..
            } => {
                assert_eq!(field, &path("number"));
                assert_eq!(expected, "9090");
                assert_eq!(actual, "8080");
            }
            other => panic!("unexpected failure {other:?}"),
        }
    }

    #[test]
    fn output_walk_reports_incomplete_leaves() {
        let actual = Value::structure([("protocol", Value::kind(Kind::String))], false);
        let checks = OutputChecks {
            output: Some(Value::structure([("protocol", Value::kind(Kind::String))], false)),
            ..OutputChecks::default()
        };
        let found = failures(check(&produced(actual), &valid(checks)));
        assert!(matches!(&found[..], [Failure::OutputMismatch { error, .. }] if error.contains("incomplete value")));
    }

    #[test]
    fn output_walk_reports_errored_fields() {
        let actual = Value::structure([("a", Value::bottom("conflicting values 1 and 2"))], false);
        let checks = OutputChecks {
            output: Some(Value::structure([("a", Value::Int(1))], false)),
            ..OutputChecks::default()
        };
        let outcome = produced(actual);
        let found = failures(check(&outcome, &valid(checks)));
        assert!(matches!(&found[..], [Failure::FieldError { field, .. }] if field == &path("a")));
    }

    #[test]
    fn empty_branch_requires_the_path_to_exist() {
        let checks = OutputChecks {
            output: Some(Value::structure(
                [("status", Value::Struct(Default::default()))],
                false,
            )),
            ..OutputChecks::default()
        };
        let found = failures(check(&produced(service()), &valid(checks)));
        assert!(matches!(&found[..], [Failure::FieldNotFound { .. }]));
    }

    #[test]
    fn output_takes_precedence_over_legacy_checks() {
        let checks = OutputChecks {
            output: Some(Value::structure([("number", Value::Int(8080))], false)),
            equal: Some(Value::Int(0)),
            ..OutputChecks::default()
        };
        assert!(check(&produced(service()), &valid(checks)).is_pass());
    }

    #[test]
    fn equal_requires_the_whole_value() {
        let partial = Value::structure([("number", Value::Int(8080))], true);
        let checks = OutputChecks {
            equal: Some(partial),
            ..OutputChecks::default()
        };
        let found = failures(check(&produced(service()), &valid(checks)));
        assert!(matches!(&found[..], [Failure::EqualMismatch { error, .. }] if error.contains("field not allowed")));
    }

    #[test]
    fn contains_tolerates_extra_fields() {
        let checks = OutputChecks {
            contains: Some(Value::structure([("protocol", Value::from("TCP"))], true)),
            ..OutputChecks::default()
        };
        assert!(check(&produced(service()), &valid(checks)).is_pass());

        let checks = OutputChecks {
            contains: Some(Value::structure([("protocol", Value::from("UDP"))], true)),
            ..OutputChecks::default()
        };
        let found = failures(check(&produced(service()), &valid(checks)));
        assert!(matches!(&found[..], [Failure::ContainsMismatch { .. }]));
    }

    #[test]
    fn field_checks_report_missing_paths_and_values() {
        let checks = OutputChecks {
            fields: vec![
                FieldCheck {
                    path: path("metadata.fqn"),
                    equals: None,
                },
                FieldCheck {
                    path: path("protocol"),
                    equals: Some(Value::from("UDP")),
                },
                FieldCheck {
                    path: path("number"),
                    equals: Some(Value::kind(Kind::String)),
                },
            ],
            ..OutputChecks::default()
        };
        let found = failures(check(&produced(service()), &valid(checks)));
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].to_string(), "field not found\n  definition: #Port\n  field:      metadata.fqn");
        assert!(matches!(
            &found[1],
            Failure::FieldValueMismatch { expected: Some(e), actual: Some(a), .. } if e == "\"UDP\"" && a == "\"TCP\""
        ));
        assert!(matches!(
            &found[2],
            Failure::FieldValueMismatch { expected: None, actual: None, error, .. } if error.contains("conflicting values")
        ));
    }

    #[test]
    fn invalid_without_error_fails_with_a_snapshot() {
        let found = failures(check(&produced(service()), &invalid(ErrorChecks::default())));
        match &found[..] {
            [Failure::ExpectedInvalid { output, .. }] => assert!(output.contains("\"protocol\":\"TCP\"")),
            other => panic!("unexpected failures {other:?}"),
        }
    }

    #[test]
    fn invalid_mode_escalates_to_concrete_validation() {
        let incomplete = Value::structure([("name", Value::kind(Kind::String))], false);
        let checks = ErrorChecks {
            contains: Some("incomplete value".into()),
            ..ErrorChecks::default()
        };
        assert!(check(&produced(incomplete.clone()), &invalid(checks)).is_pass());

        let mut lenient = invalid(ErrorChecks::default());
        lenient.assert.concrete = false;
        let found = failures(check(&produced(incomplete), &lenient));
        assert!(matches!(&found[..], [Failure::ExpectedInvalid { concrete: false, .. }]));
    }

    #[test]
    fn error_substring_checks() {
        let outcome = failed(Value::structure(
            [("number", Value::bottom("conflicting values int and \"eighty\""))],
            true,
        ));
        let checks = ErrorChecks {
            contains: Some("conflicting values".into()),
            path: Some("number".into()),
            ..ErrorChecks::default()
        };
        assert!(check(&outcome, &invalid(checks)).is_pass());

        let checks = ErrorChecks {
            contains: Some("out of bound".into()),
            path: Some("protocol".into()),
            ..ErrorChecks::default()
        };
        let found = failures(check(&outcome, &invalid(checks)));
        assert!(matches!(&found[..], [Failure::ErrorContains { .. }, Failure::ErrorPath { .. }]));
        assert_eq!(
            found[0].details()[1].value,
            "error containing \"out of bound\""
        );
    }

    #[test]
    fn error_constraint_is_unified_with_the_message() {
        let outcome = failed(Value::structure([("a", Value::bottom("field not allowed"))], true));
        let checks = ErrorChecks {
            error: Some(Value::Constraint(vec![crate::value::Atom::Match(
                crate::value::Pattern::new("not allowed$").unwrap(),
            )])),
            ..ErrorChecks::default()
        };
        assert!(check(&outcome, &invalid(checks)).is_pass());

        let checks = ErrorChecks {
            error: Some(Value::from("something else")),
            ..ErrorChecks::default()
        };
        let found = failures(check(&outcome, &invalid(checks)));
        assert!(matches!(&found[..], [Failure::ErrorMismatch { .. }]));
    }

    #[test]
    fn unresolved_definition_fails_in_either_mode() {
        let outcome = Outcome {
            value: None,
            err: Some(ExecError::DefinitionNotFound {
                definition: "#Prot".into(),
            }),
        };
        for case in [invalid(ErrorChecks::default()), valid(OutputChecks::default())] {
            let found = failures(check(&outcome, &case));
            match &found[..] {
                [Failure::ExecutionFailed { error, .. }] => {
                    assert_eq!(error, "definition \"#Prot\" not found")
                }
                other => panic!("unexpected failures {other:?}"),
            }
        }

        let unopened = Outcome {
            value: None,
            err: Some(ExecError::OpenInput(crate::errors::ValueErrors::single(
                path("number"),
                "cannot convert incomplete value int to JSON",
            ))),
        };
        let checks = ErrorChecks {
            contains: Some("incomplete".into()),
            ..ErrorChecks::default()
        };
        let found = failures(check(&unopened, &invalid(checks)));
        assert!(matches!(&found[..], [Failure::ExecutionFailed { .. }]));
    }

    fn with_ports(ports: Vec<Value>) -> Value {
        Value::structure([("ports", Value::List(ports))], true)
    }

    fn port(number: i64) -> Value {
        Value::structure(
            [("number", Value::Int(number)), ("protocol", Value::from("TCP"))],
            true,
        )
    }

    fn expect_ports(ports: Vec<Value>) -> TestCase<Value> {
        valid(OutputChecks {
            output: Some(with_ports(ports)),
            ..OutputChecks::default()
        })
    }

    #[test]
    fn output_walk_descends_into_lists() {
        let actual = produced(with_ports(vec![port(80), port(443)]));
        let partial = |n| Value::structure([("number", Value::Int(n))], true);

        assert!(check(&actual, &expect_ports(vec![partial(80), partial(443)])).is_pass());

        let found = failures(check(&actual, &expect_ports(vec![partial(80), partial(8443)])));
        assert!(matches!(
            &found[..],
            [Failure::OutputMismatch { field, .. }] if field == &path("ports[1].number")
        ));

        let found = failures(check(&actual, &expect_ports(vec![partial(80)])));
        assert!(matches!(
            &found[..],
            [Failure::LengthMismatch { expected: 1, actual: 2, field, .. }] if field == &path("ports")
        ));
    }

    #[test]
    fn output_walk_requires_a_list_where_one_is_expected() {
        let actual = produced(Value::structure([("ports", Value::Int(80))], true));
        let found = failures(check(&actual, &expect_ports(vec![Value::Int(80)])));
        assert!(matches!(
            &found[..],
            [Failure::OutputMismatch { error, .. }] if error.contains("expected a list")
        ));
    }

    #[test]
    fn contains_tolerates_extra_fields_around_constraints() {
        let checks = OutputChecks {
            contains: Some(Value::structure([("number", Value::kind(Kind::Int))], true)),
            ..OutputChecks::default()
        };
        assert!(check(&produced(service()), &valid(checks)).is_pass());

        let checks = OutputChecks {
            contains: Some(Value::structure([("number", Value::kind(Kind::String))], true)),
            ..OutputChecks::default()
        };
        let found = failures(check(&produced(service()), &valid(checks)));
        assert!(matches!(
            &found[..],
            [Failure::ContainsMismatch { error, .. }] if !error.contains("field not allowed")
        ));
    }

    #[test]
    fn multiline_values_stay_aligned() {
        let failure = Failure::ContainsMismatch {
            definition: "#Port".into(),
            error: "a: one\nb: two".into(),
        };
        assert_eq!(
            failure.to_string(),
            "output does not contain expected values\n  definition: #Port\n  error:      a: one\n              b: two"
        );
    }

    #[test]
    fn failures_serialize_with_a_kind_tag() {
        let failure = Failure::FieldNotFound {
            definition: "#Port".into(),
            field: path("metadata.fqn"),
        };
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["kind"], "field_not_found");
        assert_eq!(json["field"], "metadata.fqn");
    }
}
