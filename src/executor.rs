//! Running one test case through the engine.

use crate::engine::{Lookup, Structured, Validation};
use crate::errors::ExecError;
use crate::model::{Definition, TestCase};
use crate::path::FieldPath;

/// Read-only state shared by every case of a suite.
#[derive(Debug, Clone)]
pub struct Context<'a, V> {
    /// The loaded document, used to resolve definitions named by path.
    pub document: &'a V,
}

impl<'a, V: Structured> Context<'a, V> {
    pub fn new(document: &'a V) -> Self {
        Self { document }
    }

    fn resolve(&self, definition: &Definition<V>) -> Result<V, ExecError> {
        match definition {
            Definition::Value(value) => Ok(value.clone()),
            Definition::Path(path) => match self.document.lookup(&FieldPath::parse(path)?) {
                Lookup::Found(value) => Ok(value),
                Lookup::Missing => Err(ExecError::DefinitionNotFound {
                    definition: path.clone(),
                }),
                Lookup::Errored(errors) => Err(ExecError::DefinitionErrored {
                    definition: path.clone(),
                    errors,
                }),
            },
        }
    }
}

/// What executing a case produced.
///
/// `value` is absent when execution stopped before unification. `err` is
/// present when resolution, conversion or validation failed; both may be
/// present at once.
#[derive(Debug, Clone)]
pub struct Outcome<V> {
    pub value: Option<V>,
    pub err: Option<ExecError>,
}

impl<V> Outcome<V> {
    fn stopped(err: ExecError) -> Self {
        Self {
            value: None,
            err: Some(err),
        }
    }
}

/// Unifies the case's definition with its input and validates the result.
///
/// The input is reopened first: inputs declared inside `#tests` are closed,
/// and a closed input could not receive the fields a definition computes.
/// Validation is structural unless the case expects a valid result and asks
/// for concreteness.
pub fn execute<V: Structured>(ctx: &Context<'_, V>, case: &TestCase<V>) -> Outcome<V> {
    let input = match case.input.reopen() {
        Ok(input) => input,
        Err(errors) => return Outcome::stopped(ExecError::OpenInput(errors)),
    };

    let definition = match ctx.resolve(&case.definition) {
        Ok(definition) => definition,
        Err(err) => {
            tracing::debug!(case = %case, error = %err, "definition did not resolve");
            return Outcome::stopped(err);
        }
    };

    let result = definition.unify(&input);
    let mode = if case.assert.expects_valid() && case.assert.concrete {
        Validation::Concrete
    } else {
        Validation::Structural
    };
    let err = result.validate(mode).err().map(ExecError::Validation);
    Outcome {
        value: Some(result),
        err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssertSpec, ErrorChecks, Expect};
    use crate::value::{Kind, Value};

    fn port() -> Value {
        Value::structure(
            [
                ("number", Value::kind(Kind::Int)),
                ("normalized", Value::reference(FieldPath::parse("number").unwrap())),
            ],
            true,
        )
    }

    fn case(definition: Definition<Value>, input: Value) -> TestCase<Value> {
        TestCase {
            group: "port".into(),
            name: "case".into(),
            definition,
            input,
            assert: AssertSpec::default(),
        }
    }

    #[test]
    fn closed_inputs_are_reopened_before_unification() {
        let document = Value::Top;
        let ctx = Context::new(&document);
        let input = Value::structure([("number", Value::Int(8080))], true);
        let outcome = execute(&ctx, &case(Definition::Value(port()), input));
        assert!(outcome.err.is_none(), "{:?}", outcome.err);
        let value = outcome.value.unwrap();
        assert!(matches!(
            value.lookup(&FieldPath::parse("normalized").unwrap()),
            Lookup::Found(Value::Int(8080))
        ));
    }

    #[test]
    fn unmarshalable_input_stops_before_unification() {
        let document = Value::Top;
        let ctx = Context::new(&document);
        let input = Value::structure([("number", Value::kind(Kind::Int))], false);
        let outcome = execute(&ctx, &case(Definition::Value(port()), input));
        assert!(outcome.value.is_none());
        let err = outcome.err.unwrap();
        assert!(err.to_string().starts_with("cannot convert input to open value: "));
    }

    #[test]
    fn path_definitions_resolve_against_the_document() {
        let document = Value::structure([("#Port", port())], false);
        let ctx = Context::new(&document);
        let input = Value::structure([("number", Value::Int(1))], false);

        let found = execute(&ctx, &case(Definition::Path("#Port".into()), input.clone()));
        assert!(found.err.is_none());

        let missing = execute(&ctx, &case(Definition::Path("#Nope".into()), input));
        assert!(missing.value.is_none());
        assert!(matches!(missing.err, Some(ExecError::DefinitionNotFound { .. })));
    }

    #[test]
    fn validation_is_structural_for_invalid_cases() {
        let document = Value::Top;
        let ctx = Context::new(&document);
        let definition = Value::structure([("name", Value::kind(Kind::String))], false);
        let mut incomplete = case(Definition::Value(definition), Value::Struct(Default::default()));

        let outcome = execute(&ctx, &incomplete);
        assert!(matches!(outcome.err, Some(ExecError::Validation(_))));

        incomplete.assert = AssertSpec {
            concrete: true,
            expect: Expect::Invalid(ErrorChecks::default()),
        };
        let outcome = execute(&ctx, &incomplete);
        assert!(outcome.err.is_none());
        assert!(outcome.value.is_some());
    }

    #[test]
    fn executing_twice_is_deterministic() {
        let document = Value::Top;
        let ctx = Context::new(&document);
        let input = Value::structure([("number", Value::from("eighty"))], false);
        let case = case(Definition::Value(port()), input);
        let first = execute(&ctx, &case);
        let second = execute(&ctx, &case);
        assert_eq!(first.value, second.value);
        assert_eq!(
            first.err.map(|e| e.to_string()),
            second.err.map(|e| e.to_string())
        );
    }
}
