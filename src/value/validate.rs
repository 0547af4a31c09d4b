use super::Value;
use crate::engine::Validation;
use crate::errors::{ValueError, ValueErrors};
use crate::path::{FieldPath, Segment};

/// Collects every error below `value`, in field order.
pub(super) fn collect(
    value: &Value,
    mode: Validation,
    path: &mut FieldPath,
    errors: &mut ValueErrors,
) {
    match value {
        Value::Bottom(message) => errors.push(ValueError::new(path.clone(), message.clone())),
        Value::Struct(s) => {
            for (name, field) in s.fields.iter() {
                path.push(Segment::Field(name.clone()));
                collect(field, mode, path, errors);
                path.pop();
            }
        }
        Value::List(items) => {
            for (i, item) in items.iter().enumerate() {
                path.push(Segment::Index(i));
                collect(item, mode, path, errors);
                path.pop();
            }
        }
        Value::Ref { path: target, .. } if mode == Validation::Concrete => errors.push(
            ValueError::new(path.clone(), format!("unresolved reference {target}")),
        ),
        Value::Top | Value::Constraint(_) | Value::Any(_) | Value::ListOf(_)
            if mode == Validation::Concrete =>
        {
            errors.push(ValueError::new(
                path.clone(),
                format!("incomplete value {value}"),
            ))
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::{Structured, Validation};
    use crate::value::{Kind, Value};

    fn partial_port() -> Value {
        Value::structure(
            [
                ("number", Value::Int(8080)),
                ("protocol", Value::kind(Kind::String)),
            ],
            true,
        )
    }

    #[test]
    fn structural_validation_ignores_incomplete_leaves() {
        assert!(partial_port().validate(Validation::Structural).is_ok());
    }

    #[test]
    fn concrete_validation_reports_incomplete_leaves_with_paths() {
        let errors = partial_port().validate(Validation::Concrete).unwrap_err();
        assert_eq!(errors.to_string(), "protocol: incomplete value string");
    }

    #[test]
    fn conflicts_fail_both_modes() {
        let value = Value::structure(
            [(
                "ports",
                Value::List(vec![Value::Int(1), Value::bottom("conflicting values 1 and 2")]),
            )],
            false,
        );
        for mode in [Validation::Structural, Validation::Concrete] {
            let errors = value.validate(mode).unwrap_err();
            assert_eq!(errors.to_string(), "ports[1]: conflicting values 1 and 2");
        }
    }
}
