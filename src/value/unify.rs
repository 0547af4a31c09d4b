//! Unification (meet) over the value lattice.
//!
//! Conflicts never abort: they become `Bottom` nodes at the position where
//! they occur, so validation can report every one of them with its path.

use super::{Atom, Kind, Struct, Value};

/// Greatest lower bound of `a` and `b`. References are kept, not resolved.
pub fn meet(a: &Value, b: &Value) -> Value {
    use Value::*;

    match (a, b) {
        (Bottom(_), _) => a.clone(),
        (_, Bottom(_)) => b.clone(),
        (Top, _) => b.clone(),
        (_, Top) => a.clone(),

        (Ref { path, with }, other) | (other, Ref { path, with }) => {
            let inner = meet(with, other);
            if inner.is_bottom() {
                inner
            } else {
                Ref {
                    path: path.clone(),
                    with: Box::new(inner),
                }
            }
        }

        (Any(branches), other) | (other, Any(branches)) => {
            disjoin(branches.iter().map(|branch| meet(branch, other)).collect())
        }

        (Constraint(xs), Constraint(ys)) => merge_atoms(a, xs, b, ys),
        (Constraint(atoms), other) => apply_atoms(atoms, a, other, false),
        (other, Constraint(atoms)) => apply_atoms(atoms, b, other, true),

        (Null, Null) => Null,
        (Bool(x), Bool(y)) if x == y => a.clone(),
        (Int(x), Int(y)) if x == y => a.clone(),
        (Float(x), Float(y)) if x == y => a.clone(),
        (String(x), String(y)) if x == y => a.clone(),

        (Struct(x), Struct(y)) => merge_structs(x, y),

        (List(xs), List(ys)) if xs.len() == ys.len() => {
            List(xs.iter().zip(ys).map(|(x, y)| meet(x, y)).collect())
        }
        (List(xs), List(ys)) => Value::bottom(format!(
            "incompatible list lengths ({} and {})",
            xs.len(),
            ys.len()
        )),
        (ListOf(elem), List(items)) | (List(items), ListOf(elem)) => {
            List(items.iter().map(|item| meet(elem, item)).collect())
        }
        (ListOf(x), ListOf(y)) => {
            let elem = meet(x, y);
            if elem.is_bottom() {
                elem
            } else {
                ListOf(Box::new(elem))
            }
        }

        _ => conflict(a, b),
    }
}

/// Merges two declarations of one package. Struct fields from either side
/// are kept: closedness constrains what the declarations are unified with
/// later, not each other.
pub fn combine(a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Struct(x), Value::Struct(y)) => {
            let mut fields = x.fields.clone();
            for (name, theirs) in y.fields.iter() {
                let merged = match x.fields.get(name) {
                    Some(ours) => combine(ours, theirs),
                    None => theirs.clone(),
                };
                fields.insert(name.clone(), merged);
            }
            Value::Struct(Struct {
                fields,
                closed: x.closed || y.closed,
            })
        }
        _ => meet(a, b),
    }
}

/// `conflicting values A and B`, with the type clash spelled out when the
/// two sides are of different types.
pub(crate) fn conflict(a: &Value, b: &Value) -> Value {
    let (ta, tb) = (a.type_name(), b.type_name());
    if ta == tb {
        Value::bottom(format!("conflicting values {a} and {b}"))
    } else {
        Value::bottom(format!(
            "conflicting values {a} and {b} (mismatched types {ta} and {tb})"
        ))
    }
}

/// Collapses alternatives: failed branches drop out, duplicates merge, a
/// single survivor stands alone.
pub(crate) fn disjoin(candidates: Vec<Value>) -> Value {
    let mut survivors: Vec<Value> = Vec::new();
    let mut first_error = None;
    for candidate in candidates {
        match candidate {
            Value::Bottom(message) => {
                first_error.get_or_insert(message);
            }
            Value::Any(inner) => {
                for branch in inner {
                    if !survivors.contains(&branch) {
                        survivors.push(branch);
                    }
                }
            }
            other => {
                if !survivors.contains(&other) {
                    survivors.push(other);
                }
            }
        }
    }
    match survivors.len() {
        0 => Value::bottom(format!(
            "empty disjunction: {}",
            first_error.unwrap_or_else(|| "no alternatives".to_string())
        )),
        1 => survivors.remove(0),
        _ => Value::Any(survivors),
    }
}

fn merge_atoms(a: &Value, xs: &[Atom], b: &Value, ys: &[Atom]) -> Value {
    let implied = xs
        .iter()
        .chain(ys)
        .map(Atom::implied_kind)
        .try_fold(None::<Kind>, |acc, kind| match acc {
            None => Some(Some(kind)),
            Some(current) => current.meet(kind).map(Some),
        });
    let Some(Some(kind)) = implied else {
        return conflict(a, b);
    };

    let mut atoms = Vec::with_capacity(xs.len() + ys.len());
    if xs.iter().chain(ys).any(|atom| matches!(atom, Atom::Kind(_))) {
        atoms.push(Atom::Kind(kind));
    }
    for atom in xs.iter().chain(ys) {
        if !matches!(atom, Atom::Kind(_)) && !atoms.contains(atom) {
            atoms.push(atom.clone());
        }
    }
    Value::Constraint(atoms)
}

/// Checks a concrete value against every atom. `swapped` records that the
/// constraint was the right-hand operand, to keep messages in source order.
fn apply_atoms(atoms: &[Atom], constraint: &Value, value: &Value, swapped: bool) -> Value {
    let clash = || {
        if swapped {
            conflict(value, constraint)
        } else {
            conflict(constraint, value)
        }
    };
    if !value.is_scalar() {
        return clash();
    }
    for atom in atoms {
        match atom {
            Atom::Kind(kind) if !kind.admits(value) => {
                let single = Value::kind(*kind);
                return if swapped {
                    conflict(value, &single)
                } else {
                    conflict(&single, value)
                };
            }
            Atom::Kind(_) => {}
            Atom::Bound(bound) => match bound.admits(value) {
                None => return clash(),
                Some(false) => {
                    return Value::bottom(format!("invalid value {value} (out of bound {bound})"))
                }
                Some(true) => {}
            },
            Atom::Match(pattern) => {
                let Value::String(s) = value else {
                    return clash();
                };
                if !pattern.is_match(s) {
                    return Value::bottom(format!(
                        "invalid value {value} (out of bound {pattern})"
                    ));
                }
            }
        }
    }
    value.clone()
}

fn merge_structs(x: &Struct, y: &Struct) -> Value {
    let mut fields = x.fields.clone();
    for (name, theirs) in y.fields.iter() {
        let merged = match x.fields.get(name) {
            Some(ours) => meet(ours, theirs),
            None if x.closed => Value::bottom("field not allowed"),
            None => theirs.clone(),
        };
        fields.insert(name.clone(), merged);
    }
    if y.closed {
        for (name, _) in x.fields.iter() {
            if !y.fields.contains_key(name) {
                fields.insert(name.clone(), Value::bottom("field not allowed"));
            }
        }
    }
    Value::Struct(Struct {
        fields,
        closed: x.closed || y.closed,
    })
}
