//! Decoding `#tests` into test cases.
//!
//! The document must declare a top-level `#tests` struct. Each of its fields
//! is a group, and each group is a list of case records:
//!
//! ```yaml
//! "#tests":
//!   port:
//!     - name: valid port
//!       definition: !ref "#Port"
//!       input: {number: 8080, protocol: TCP}
//!       assert:
//!         output: {number: 8080}
//! ```
//!
//! Required fields (`name`, `definition`, `input`) are strict: a missing or
//! mistyped one aborts discovery with a decode error naming the group and
//! the case. Everything under `assert` is tolerant: an absent, errored or
//! mistyped field simply counts as not provided.

use std::collections::HashMap;

use crate::engine::{Lookup, Shape, Structured};
use crate::errors::HarnessError;
use crate::model::{
    AssertSpec, Definition, DefinitionMode, ErrorChecks, Expect, FieldCheck, OutputChecks, TestCase,
};
use crate::path::FieldPath;

/// The top-level field holding the test groups.
pub const TESTS_FIELD: &str = "#tests";

/// Discovered test groups.
#[derive(Debug, Clone)]
pub struct Suite<V> {
    groups: HashMap<String, Vec<TestCase<V>>>,
    names: Vec<String>,
}

impl<V> Suite<V> {
    /// Group names, sorted lexicographically on their raw text.
    pub fn group_names(&self) -> &[String] {
        &self.names
    }

    /// Cases of one group in declaration order.
    pub fn cases(&self, group: &str) -> &[TestCase<V>] {
        self.groups.get(group).map(Vec::as_slice).unwrap_or_default()
    }

    /// Groups in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[TestCase<V>])> {
        self.names
            .iter()
            .map(|name| (name.as_str(), self.cases(name)))
    }

    pub fn case_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Extracts every test case from a loaded document.
pub fn discover<V: Structured>(document: &V, mode: DefinitionMode) -> Result<Suite<V>, HarnessError> {
    let tests = match document.lookup(&FieldPath::root().child(TESTS_FIELD)) {
        Lookup::Missing => return Err(HarnessError::NoTests),
        Lookup::Errored(errors) => return Err(HarnessError::TestsErrored { errors }),
        Lookup::Found(tests) => tests,
    };
    if tests.shape() != Shape::Struct {
        return Err(HarnessError::decode(
            TESTS_FIELD,
            format!("expected a struct of test groups, found {}", tests.describe()),
        ));
    }

    let mut groups = HashMap::new();
    let mut names = Vec::new();
    for (group, value) in tests.fields() {
        let location = format!("group {group:?}");
        if let Lookup::Errored(errors) = tests.lookup(&FieldPath::root().child(group.as_str())) {
            return Err(HarnessError::decode(location, format!("group has errors: {errors}")));
        }
        let Some(elements) = value.elements() else {
            return Err(HarnessError::decode(location, "expected a list of test cases"));
        };
        let cases = elements
            .iter()
            .enumerate()
            .map(|(index, element)| decode_case(&group, index, element, mode))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(group = %group, cases = cases.len(), "decoded test group");
        groups.insert(group.clone(), cases);
        names.push(group);
    }
    names.sort();

    let suite = Suite { groups, names };
    tracing::info!(
        groups = suite.names.len(),
        cases = suite.case_count(),
        "discovered {} tests across {} groups",
        suite.case_count(),
        suite.names.len()
    );
    Ok(suite)
}

/// Tolerant lookup of a direct child: absent, errored, or not a field at all
/// are all `None`.
pub fn optional<V: Structured>(node: &V, field: &str) -> Option<V> {
    node.lookup(&FieldPath::root().child(field)).found()
}

fn optional_bool<V: Structured>(node: &V, field: &str) -> Option<bool> {
    optional(node, field)?.as_bool()
}

fn optional_string<V: Structured>(node: &V, field: &str) -> Option<String> {
    optional(node, field)?.as_str()
}

// ============================================================================
// CASE DECODING
// ============================================================================

fn decode_case<V: Structured>(
    group: &str,
    index: usize,
    node: &V,
    mode: DefinitionMode,
) -> Result<TestCase<V>, HarnessError> {
    let location = format!("group {group:?}, case #{index}");
    let name = match node.lookup(&FieldPath::root().child("name")) {
        Lookup::Missing => return Err(HarnessError::decode(location, "missing name")),
        Lookup::Errored(errors) => {
            return Err(HarnessError::decode(location, format!("missing name: {errors}")))
        }
        Lookup::Found(value) => value
            .as_str()
            .ok_or_else(|| HarnessError::decode(&location, "name must be a string"))?,
    };
    let location = format!("group {group:?}, case {name:?}");

    let definition = match node.lookup(&FieldPath::root().child("definition")) {
        Lookup::Missing => return Err(HarnessError::decode(location, "missing definition")),
        Lookup::Errored(errors) => {
            return Err(HarnessError::decode(
                location,
                format!("missing definition: {errors}"),
            ))
        }
        Lookup::Found(value) => match mode {
            DefinitionMode::Value => Definition::Value(value),
            DefinitionMode::Path => Definition::Path(
                value
                    .as_str()
                    .ok_or_else(|| HarnessError::decode(&location, "definition must be a string"))?,
            ),
        },
    };

    // The input only has to exist. An errored input surfaces when the case
    // runs, not here.
    let input = node
        .fields()
        .into_iter()
        .find_map(|(field, value)| (field == "input").then_some(value))
        .ok_or_else(|| HarnessError::decode(&location, "missing input"))?;

    let assert = match optional(node, "assert") {
        Some(spec) => decode_assert(&spec, &location)?,
        None => AssertSpec::default(),
    };

    Ok(TestCase {
        group: group.to_string(),
        name,
        definition,
        input,
        assert,
    })
}

fn decode_assert<V: Structured>(node: &V, location: &str) -> Result<AssertSpec<V>, HarnessError> {
    let valid = optional_bool(node, "valid").unwrap_or(true);
    let concrete = optional_bool(node, "concrete").unwrap_or(true);

    let expect = if valid {
        let checks = OutputChecks {
            output: optional(node, "output"),
            equal: optional(node, "equal"),
            contains: optional(node, "contains"),
            fields: decode_field_checks(node, location)?,
        };
        if checks.output.is_some() && checks.uses_legacy() {
            tracing::warn!(case = %location, "`output` is set; ignoring `equal`, `contains` and `fields`");
        } else if checks.uses_legacy() {
            tracing::debug!(case = %location, "deprecated output checks in use");
        }
        Expect::Valid(checks)
    } else {
        let checks = ErrorChecks {
            error: optional(node, "error"),
            contains: optional_string(node, "errorContains"),
            path: optional_string(node, "errorPath"),
        };
        if checks.uses_legacy() {
            tracing::debug!(case = %location, "deprecated error checks in use");
        }
        Expect::Invalid(checks)
    };

    Ok(AssertSpec { concrete, expect })
}

fn decode_field_checks<V: Structured>(
    node: &V,
    location: &str,
) -> Result<Vec<FieldCheck<V>>, HarnessError> {
    let Some(fields) = optional(node, "fields") else {
        return Ok(Vec::new());
    };
    fields
        .fields()
        .into_iter()
        .map(|(key, check)| {
            let path = FieldPath::from_key(&key).map_err(|err| {
                HarnessError::decode(location, format!("fields key {key:?}: {err}"))
            })?;
            Ok(FieldCheck {
                path,
                equals: optional(&check, "equals"),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Kind, Value};

    fn document(tests: Value) -> Value {
        Value::structure([(TESTS_FIELD, tests)], false)
    }

    fn case(fields: Vec<(&str, Value)>) -> Value {
        Value::structure(fields, false)
    }

    fn port_case(name: &str, assert: Option<Value>) -> Value {
        let mut fields = vec![
            ("name", Value::from(name)),
            ("definition", Value::structure([("number", Value::kind(Kind::Int))], true)),
            ("input", Value::structure([("number", Value::Int(80))], false)),
        ];
        if let Some(assert) = assert {
            fields.push(("assert", assert));
        }
        case(fields)
    }

    #[test]
    fn missing_tests_is_fatal() {
        let err = discover(&Value::structure([("#Port", Value::Top)], false), DefinitionMode::Value)
            .unwrap_err();
        assert!(matches!(err, HarnessError::NoTests));
    }

    #[test]
    fn groups_are_sorted_and_cases_keep_declaration_order() {
        let doc = document(Value::structure(
            [
                ("zeta", Value::List(vec![port_case("b", None), port_case("a", None)])),
                ("Alpha", Value::List(vec![port_case("c", None)])),
                ("alpha", Value::List(vec![])),
            ],
            false,
        ));
        let suite = discover(&doc, DefinitionMode::Value).unwrap();
        assert_eq!(suite.group_names(), ["Alpha", "alpha", "zeta"]);
        let names: Vec<_> = suite.cases("zeta").iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["b", "a"]);
        assert_eq!(suite.case_count(), 3);
    }

    #[test]
    fn non_list_group_names_the_group() {
        let doc = document(Value::structure([("ports", Value::Int(1))], false));
        let err = discover(&doc, DefinitionMode::Value).unwrap_err();
        assert_eq!(err.to_string(), "group \"ports\": expected a list of test cases");
    }

    #[test]
    fn required_fields_are_strict() {
        let doc = document(Value::structure(
            [("ports", Value::List(vec![case(vec![("definition", Value::Top)])]))],
            false,
        ));
        let err = discover(&doc, DefinitionMode::Value).unwrap_err();
        assert_eq!(err.to_string(), "group \"ports\", case #0: missing name");

        let doc = document(Value::structure(
            [("ports", Value::List(vec![case(vec![("name", Value::Int(3))])]))],
            false,
        ));
        let err = discover(&doc, DefinitionMode::Value).unwrap_err();
        assert_eq!(err.to_string(), "group \"ports\", case #0: name must be a string");

        let doc = document(Value::structure(
            [(
                "ports",
                Value::List(vec![case(vec![("name", "no input".into()), ("definition", Value::Top)])]),
            )],
            false,
        ));
        let err = discover(&doc, DefinitionMode::Value).unwrap_err();
        assert_eq!(err.to_string(), "group \"ports\", case \"no input\": missing input");
    }

    #[test]
    fn path_mode_requires_a_string_definition() {
        let doc = document(Value::structure(
            [("ports", Value::List(vec![port_case("x", None)]))],
            false,
        ));
        let err = discover(&doc, DefinitionMode::Path).unwrap_err();
        assert_eq!(err.to_string(), "group \"ports\", case \"x\": definition must be a string");

        let by_path = case(vec![
            ("name", "x".into()),
            ("definition", "#Port".into()),
            ("input", Value::Int(1)),
        ]);
        let doc = document(Value::structure([("ports", Value::List(vec![by_path]))], false));
        let suite = discover(&doc, DefinitionMode::Path).unwrap();
        assert!(matches!(&suite.cases("ports")[0].definition, Definition::Path(p) if p == "#Port"));
    }

    #[test]
    fn assert_defaults_and_tolerance() {
        let assert = Value::structure(
            [
                ("valid", Value::from("yes")),
                ("concrete", Value::bottom("conflicting values true and false")),
                ("output", Value::structure([("number", Value::Int(80))], false)),
            ],
            false,
        );
        let doc = document(Value::structure(
            [("ports", Value::List(vec![port_case("x", Some(assert))]))],
            false,
        ));
        let suite = discover(&doc, DefinitionMode::Value).unwrap();
        let spec = &suite.cases("ports")[0].assert;
        assert!(spec.concrete);
        match &spec.expect {
            Expect::Valid(checks) => assert!(checks.output.is_some()),
            Expect::Invalid(_) => panic!("mistyped `valid` must default to true"),
        }
    }

    #[test]
    fn invalid_mode_ignores_output_fields() {
        let assert = Value::structure(
            [
                ("valid", Value::Bool(false)),
                ("errorContains", Value::from("conflicting values")),
                ("errorPath", Value::Int(7)),
                ("fields", Value::structure([("\"\"", Value::Top)], false)),
            ],
            false,
        );
        let doc = document(Value::structure(
            [("ports", Value::List(vec![port_case("x", Some(assert))]))],
            false,
        ));
        let suite = discover(&doc, DefinitionMode::Value).unwrap();
        match &suite.cases("ports")[0].assert.expect {
            Expect::Invalid(checks) => {
                assert_eq!(checks.contains.as_deref(), Some("conflicting values"));
                assert_eq!(checks.path, None);
                assert!(checks.error.is_none());
            }
            Expect::Valid(_) => panic!("expected invalid mode"),
        }
    }

    #[test]
    fn field_check_keys_strip_one_layer_of_quotes() {
        let assert = Value::structure(
            [(
                "fields",
                Value::structure(
                    [
                        ("\"metadata.fqn\"", Value::structure([("equals", Value::from("a.b"))], false)),
                        ("spec.replicas", Value::Struct(Default::default())),
                    ],
                    false,
                ),
            )],
            false,
        );
        let doc = document(Value::structure(
            [("ports", Value::List(vec![port_case("x", Some(assert))]))],
            false,
        ));
        let suite = discover(&doc, DefinitionMode::Value).unwrap();
        let Expect::Valid(checks) = &suite.cases("ports")[0].assert.expect else {
            panic!("expected valid mode");
        };
        assert_eq!(checks.fields.len(), 2);
        assert_eq!(checks.fields[0].path, FieldPath::parse("metadata.fqn").unwrap());
        assert!(checks.fields[0].equals.is_some());
        assert!(checks.fields[1].equals.is_none());
    }
}
