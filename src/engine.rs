//! The capability boundary between the harness and a unification engine.
//!
//! The harness never solves constraints itself. Everything it needs from an
//! engine is expressed by [`Structured`]: unify two values, validate one
//! (structurally, or demanding full concreteness), look up a sub-value by
//! path, enumerate fields, and move values in and out of JSON. The bundled
//! [`crate::value::Value`] implements it; tests and other engines can
//! provide their own.

use std::fmt;

use crate::errors::ValueErrors;
use crate::path::FieldPath;

/// How strict a validation pass is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    /// Only hard errors (conflicts, disallowed fields) fail.
    Structural,
    /// Additionally every leaf must be fully resolved.
    Concrete,
}

/// A fully resolved leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

/// What a node is, as far as the harness cares.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Composite with enumerable named children.
    Struct,
    List,
    Scalar(Scalar),
    /// Constrained but not yet concrete (`int`, `>=0`, `"a" | "b"`, ...).
    Incomplete,
    /// The node itself is an error.
    Error,
}

/// The result of resolving a path.
#[derive(Debug, Clone)]
pub enum Lookup<V> {
    Missing,
    /// The path exists but its value is an error.
    Errored(ValueErrors),
    Found(V),
}

impl<V> Lookup<V> {
    /// Collapses the tolerant case: an errored field counts as absent.
    pub fn found(self) -> Option<V> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::Missing | Lookup::Errored(_) => None,
        }
    }
}

/// A partially evaluated, immutable tree of scalars, structs and lists.
pub trait Structured: Clone + fmt::Debug + Send + Sync + Sized + 'static {
    /// Greatest lower bound of both values. Never fails: conflicts become
    /// error nodes reported by [`Structured::validate`].
    fn unify(&self, other: &Self) -> Self;

    fn validate(&self, mode: Validation) -> Result<(), ValueErrors>;

    fn lookup(&self, path: &FieldPath) -> Lookup<Self>;

    fn shape(&self) -> Shape;

    /// Named children of a struct, empty for anything else.
    fn fields(&self) -> Vec<(String, Self)>;

    /// Elements of a list, `None` for anything else.
    fn elements(&self) -> Option<Vec<Self>>;

    /// Canonical interchange form. Fails on errors and incomplete values.
    fn to_json(&self) -> Result<serde_json::Value, ValueErrors>;

    /// Compiles plain data. The result is open: it may gain fields when
    /// unified.
    fn from_json(json: &serde_json::Value) -> Self;

    /// Compiles a string literal into a single-value node.
    fn from_string(text: &str) -> Result<Self, ValueErrors>;

    /// Engine-native rendering, used when a value has no JSON form.
    fn describe(&self) -> String;

    fn as_str(&self) -> Option<String> {
        match self.shape() {
            Shape::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self.shape() {
            Shape::Scalar(Scalar::Bool(b)) => Some(b),
            _ => None,
        }
    }

    /// The same value with every struct in it open. Constraints are kept.
    fn open(&self) -> Self;

    /// Round-trips through JSON to drop closedness. Fails on anything not
    /// concrete; see [`Structured::open`] for constrained values.
    fn reopen(&self) -> Result<Self, ValueErrors> {
        self.to_json().map(|json| Self::from_json(&json))
    }
}
