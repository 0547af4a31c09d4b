//! Reference resolution.
//!
//! References are looked up lexically: starting from the struct that
//! contains the reference and moving outward to the root, the first struct
//! declaring the reference's first field wins.
//!
//! Two passes use the same walk:
//! - [`link`] runs once over a loaded document. References that leave their
//!   top-level declaration (a test pointing at `#Port`) are substituted.
//!   References within the same declaration stay late-bound so they can see
//!   whatever the declaration is later unified with.
//! - [`finalize`] runs after unification and substitutes everything.

use super::unify::{disjoin, meet};
use super::{Struct, Value};
use crate::path::FieldPath;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Pass {
    Link,
    Finalize,
}

struct Resolver<'a> {
    root: &'a Value,
    pass: Pass,
    active: Vec<FieldPath>,
}

/// Substitutes references that cross top-level declarations.
pub fn link(document: &Value) -> Value {
    Resolver::new(document, Pass::Link).resolve(document, &FieldPath::root())
}

/// Substitutes every reference, using `value` itself as the root scope.
pub fn finalize(value: &Value) -> Value {
    if !contains_refs(value) {
        return value.clone();
    }
    Resolver::new(value, Pass::Finalize).resolve(value, &FieldPath::root())
}

fn contains_refs(value: &Value) -> bool {
    match value {
        Value::Ref { .. } => true,
        Value::Struct(s) => s.fields.values().any(contains_refs),
        Value::List(items) | Value::Any(items) => items.iter().any(contains_refs),
        Value::ListOf(elem) => contains_refs(elem),
        _ => false,
    }
}

impl<'a> Resolver<'a> {
    fn new(root: &'a Value, pass: Pass) -> Self {
        Self {
            root,
            pass,
            active: Vec::new(),
        }
    }

    fn resolve(&mut self, node: &Value, here: &FieldPath) -> Value {
        match node {
            Value::Struct(s) => Value::Struct(Struct {
                fields: s
                    .fields
                    .iter()
                    .map(|(name, value)| (name.clone(), self.resolve(value, &here.child(name.clone()))))
                    .collect(),
                closed: s.closed,
            }),
            Value::List(items) => Value::List(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.resolve(item, &here.index(i)))
                    .collect(),
            ),
            Value::ListOf(elem) => Value::ListOf(Box::new(self.resolve(elem, here))),
            Value::Any(branches) => disjoin(
                branches
                    .iter()
                    .map(|branch| self.resolve(branch, here))
                    .collect(),
            ),
            Value::Ref { path, with } => self.dereference(path, with, here),
            other => other.clone(),
        }
    }

    fn dereference(&mut self, path: &FieldPath, with: &Value, here: &FieldPath) -> Value {
        let with = self.resolve(with, here);
        let Some(target) = self.locate(path, here) else {
            return Value::bottom(format!("reference {:?} not found", path.to_string()));
        };

        if self.pass == Pass::Link && target.first_field() == here.first_field() {
            return Value::Ref {
                path: path.clone(),
                with: Box::new(with),
            };
        }
        if self.active.contains(&target) {
            return Value::bottom(format!("reference cycle through {target}"));
        }
        let Some(raw) = self.root.get(&target) else {
            return Value::bottom(format!("reference {:?} not found", path.to_string()));
        };

        self.active.push(target.clone());
        let resolved = self.resolve(raw, &target);
        self.active.pop();
        meet(&resolved, &with)
    }

    /// Absolute path of the field `path` refers to, seen from `here`.
    fn locate(&self, path: &FieldPath, here: &FieldPath) -> Option<FieldPath> {
        let first = path.first_field()?;
        (0..here.len().max(1)).rev().find_map(|depth| {
            let scope = here.prefix(depth);
            match self.root.get(&scope) {
                Some(Value::Struct(s)) if s.fields.contains_key(first) => Some(scope.join(path)),
                _ => None,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Kind;

    fn path(text: &str) -> FieldPath {
        FieldPath::parse(text).unwrap()
    }

    fn reference(text: &str) -> Value {
        Value::reference(path(text))
    }

    #[test]
    fn link_substitutes_cross_declaration_references() {
        let document = Value::structure(
            [
                ("#Port", Value::structure([("number", Value::kind(Kind::Int))], true)),
                ("#tests", Value::structure([("definition", reference("#Port"))], true)),
            ],
            false,
        );
        let linked = link(&document);
        assert_eq!(
            linked.get(&path("#tests.definition")),
            document.get(&path("#Port"))
        );
    }

    #[test]
    fn link_keeps_references_within_a_declaration() {
        let document = Value::structure(
            [(
                "#Computed",
                Value::structure(
                    [("number", Value::kind(Kind::Int)), ("normalized", reference("number"))],
                    true,
                ),
            )],
            false,
        );
        let linked = link(&document);
        assert!(matches!(
            linked.get(&path("#Computed.normalized")),
            Some(Value::Ref { .. })
        ));
    }

    #[test]
    fn finalize_looks_outward_from_the_enclosing_struct() {
        let value = Value::structure(
            [
                ("limit", Value::Int(10)),
                ("spec", Value::structure([("max", reference("limit"))], false)),
            ],
            false,
        );
        assert_eq!(finalize(&value).get(&path("spec.max")), Some(&Value::Int(10)));
    }

    #[test]
    fn finalize_reports_missing_references_and_cycles() {
        let value = Value::structure(
            [
                ("a", reference("b")),
                ("b", reference("a")),
                ("c", reference("nowhere")),
            ],
            false,
        );
        let resolved = finalize(&value);
        assert!(matches!(resolved.get(&path("a")), Some(Value::Bottom(m)) if m.starts_with("reference cycle")));
        assert_eq!(
            resolved.get(&path("c")),
            Some(&Value::bottom("reference \"nowhere\" not found"))
        );
    }

    #[test]
    fn finalize_unifies_the_target_with_accumulated_constraints() {
        let value = Value::structure(
            [
                ("number", Value::Int(8080)),
                ("normalized", meet(&reference("number"), &Value::kind(Kind::Int))),
                ("wrong", meet(&reference("number"), &Value::kind(Kind::String))),
            ],
            false,
        );
        let resolved = finalize(&value);
        assert_eq!(resolved.get(&path("normalized")), Some(&Value::Int(8080)));
        assert!(resolved.get(&path("wrong")).is_some_and(Value::is_bottom));
    }
}
