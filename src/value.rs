//! The bundled structured-value engine.
//!
//! A deliberately small constraint lattice: scalars, kind constraints
//! (`int`, `string`, ...), numeric bounds, regular-expression matches,
//! disjunctions, open and closed structs, lists, and late-bound references.
//! It is enough to express schemas such as
//!
//! ```yaml
//! "#Port":
//!   number: !all [!kind int, !bound ">0", !bound "<65536"]
//!   protocol: !or [TCP, UDP]
//! ```
//!
//! and is what the harness runs suites against unless another engine is
//! plugged in through [`crate::engine::Structured`].

use std::cmp::Ordering;
use std::fmt;

use im::OrdMap;
use regex::Regex;

use crate::engine::{Lookup, Scalar, Shape, Structured, Validation};
use crate::errors::ValueErrors;
use crate::format::format_float;
use crate::path::{FieldPath, Segment};

mod json;
mod resolve;
mod unify;
mod validate;

pub use resolve::{finalize, link};
pub use unify::meet;

// ============================================================================
// CONSTRAINT ATOMS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Null,
    Bool,
    Int,
    Float,
    Number,
    String,
}

impl Kind {
    pub fn parse(name: &str) -> Option<Kind> {
        Some(match name {
            "null" => Kind::Null,
            "bool" => Kind::Bool,
            "int" => Kind::Int,
            "float" => Kind::Float,
            "number" => Kind::Number,
            "string" => Kind::String,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Kind::Null => "null",
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Float => "float",
            Kind::Number => "number",
            Kind::String => "string",
        }
    }

    /// Intersection of two kinds, `None` when disjoint.
    pub fn meet(self, other: Kind) -> Option<Kind> {
        match (self, other) {
            (a, b) if a == b => Some(a),
            (Kind::Number, k @ (Kind::Int | Kind::Float))
            | (k @ (Kind::Int | Kind::Float), Kind::Number) => Some(k),
            _ => None,
        }
    }

    pub fn admits(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Kind::Null, Value::Null)
                | (Kind::Bool, Value::Bool(_))
                | (Kind::Int, Value::Int(_))
                | (Kind::Float, Value::Float(_))
                | (Kind::Number, Value::Int(_) | Value::Float(_))
                | (Kind::String, Value::String(_))
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundOp {
    Gt,
    Ge,
    Lt,
    Le,
    Ne,
}

impl BoundOp {
    fn symbol(self) -> &'static str {
        match self {
            BoundOp::Gt => ">",
            BoundOp::Ge => ">=",
            BoundOp::Lt => "<",
            BoundOp::Le => "<=",
            BoundOp::Ne => "!=",
        }
    }
}

/// The number a [`Bound`] compares against. Integer limits are kept exact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Limit {
    Int(i64),
    Float(f64),
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Int(n) => write!(f, "{n}"),
            Limit::Float(x) => write!(f, "{}", format_float(*x)),
        }
    }
}

/// A numeric bound such as `>=0` or `<65536`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bound {
    pub op: BoundOp,
    pub limit: Limit,
}

impl Bound {
    /// Parses `>=0`, `< 10`, `!=3.5`.
    pub fn parse(text: &str) -> Option<Bound> {
        let text = text.trim();
        let (op, rest) = [
            (">=", BoundOp::Ge),
            ("<=", BoundOp::Le),
            ("!=", BoundOp::Ne),
            (">", BoundOp::Gt),
            ("<", BoundOp::Lt),
        ]
        .into_iter()
        .find_map(|(symbol, op)| text.strip_prefix(symbol).map(|rest| (op, rest)))?;
        let rest = rest.trim();
        let limit = match rest.parse::<i64>() {
            Ok(n) => Limit::Int(n),
            Err(_) => {
                let x: f64 = rest.parse().ok()?;
                if !x.is_finite() {
                    return None;
                }
                Limit::Float(x)
            }
        };
        Some(Bound { op, limit })
    }

    /// Whether a number satisfies the bound, `None` for anything else.
    pub fn admits(&self, value: &Value) -> Option<bool> {
        let ordering = match (value, self.limit) {
            (Value::Int(n), Limit::Int(limit)) => (*n).cmp(&limit),
            (Value::Int(n), Limit::Float(limit)) => compare_int(*n, limit),
            (Value::Float(x), Limit::Int(limit)) => x.partial_cmp(&(limit as f64))?,
            (Value::Float(x), Limit::Float(limit)) => x.partial_cmp(&limit)?,
            _ => return None,
        };
        Some(match self.op {
            BoundOp::Gt => ordering == Ordering::Greater,
            BoundOp::Ge => ordering != Ordering::Less,
            BoundOp::Lt => ordering == Ordering::Less,
            BoundOp::Le => ordering != Ordering::Greater,
            BoundOp::Ne => ordering != Ordering::Equal,
        })
    }
}

/// Exact comparison of an integer with a finite float, without rounding
/// the integer to `f64`.
fn compare_int(n: i64, limit: f64) -> Ordering {
    let n = i128::from(n);
    if limit.fract() == 0.0 {
        // Saturates for magnitudes beyond i128, which still orders correctly.
        return n.cmp(&(limit as i128));
    }
    if n <= limit.floor() as i128 {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op.symbol(), self.limit)
    }
}

/// A regular-expression constraint on strings (`=~"^[a-z]+$"`).
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(source: &str) -> Result<Pattern, regex::Error> {
        Regex::new(source).map(Pattern)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "=~{}", quote(self.as_str()))
    }
}

/// One conjunct of an incomplete scalar constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Kind(Kind),
    Bound(Bound),
    Match(Pattern),
}

impl Atom {
    /// The kind of scalar this atom can ever accept.
    pub fn implied_kind(&self) -> Kind {
        match self {
            Atom::Kind(kind) => *kind,
            Atom::Bound(_) => Kind::Number,
            Atom::Match(_) => Kind::String,
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Kind(kind) => write!(f, "{}", kind.name()),
            Atom::Bound(bound) => write!(f, "{bound}"),
            Atom::Match(pattern) => write!(f, "{pattern}"),
        }
    }
}

// ============================================================================
// VALUES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Struct {
    pub fields: OrdMap<String, Value>,
    /// A closed struct rejects fields it does not declare.
    pub closed: bool,
}

/// A node of the value lattice.
///
/// ```rust
/// use schema_harness::value::{Kind, Value};
/// let port = Value::kind(Kind::Int).meet(&Value::Int(8080));
/// assert_eq!(port, Value::Int(8080));
/// assert!(Value::kind(Kind::Int).meet(&Value::from("eighty")).is_bottom());
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// `_`, unifies with anything.
    #[default]
    Top,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Conjunction of scalar constraints, never empty.
    Constraint(Vec<Atom>),
    /// Two or more surviving alternatives.
    Any(Vec<Value>),
    Struct(Struct),
    List(Vec<Value>),
    /// Open list `[...T]`: any length, every element unified with `T`.
    ListOf(Box<Value>),
    /// Reference to another field, resolved after unification. `with` holds
    /// whatever the reference has been unified with so far.
    Ref { path: FieldPath, with: Box<Value> },
    /// A conflict.
    Bottom(String),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl Value {
    pub fn kind(kind: Kind) -> Value {
        Value::Constraint(vec![Atom::Kind(kind)])
    }

    pub fn reference(path: FieldPath) -> Value {
        Value::Ref {
            path,
            with: Box::new(Value::Top),
        }
    }

    pub fn bottom(message: impl Into<String>) -> Value {
        Value::Bottom(message.into())
    }

    /// A disjunction of `branches`, collapsed the same way unification does.
    pub fn any(branches: Vec<Value>) -> Value {
        unify::disjoin(branches)
    }

    /// Builds a struct from `(name, value)` pairs.
    pub fn structure<K: Into<String>>(
        fields: impl IntoIterator<Item = (K, Value)>,
        closed: bool,
    ) -> Value {
        Value::Struct(Struct {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            closed,
        })
    }

    pub fn is_bottom(&self) -> bool {
        matches!(self, Value::Bottom(_))
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_)
        )
    }

    /// The type name used in "mismatched types" messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Top => "_",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Constraint(atoms) => atoms
                .iter()
                .map(Atom::implied_kind)
                .try_fold(Kind::Number, |acc, kind| match acc {
                    Kind::Number => Some(kind),
                    other => other.meet(kind),
                })
                .map_or("_|_", Kind::name),
            Value::Any(_) => "disjunction",
            Value::Struct(_) => "struct",
            Value::List(_) | Value::ListOf(_) => "list",
            Value::Ref { .. } => "reference",
            Value::Bottom(_) => "_|_",
        }
    }

    /// Unifies without resolving references. Use this when assembling
    /// documents; [`Structured::unify`] additionally resolves references
    /// against the result.
    pub fn meet(&self, other: &Value) -> Value {
        unify::meet(self, other)
    }

    /// Merges another declaration of the same package into this one. Unlike
    /// [`Value::meet`], closed structs do not reject each other's fields.
    pub fn combine(&self, other: &Value) -> Value {
        unify::combine(self, other)
    }

    /// Walks `path` without resolving references.
    pub fn get(&self, path: &FieldPath) -> Option<&Value> {
        let mut node = self;
        for segment in path.segments() {
            node = match (segment, node) {
                (Segment::Field(name), Value::Struct(s)) => s.fields.get(name)?,
                (Segment::Index(i), Value::List(items)) => items.get(*i)?,
                _ => return None,
            };
        }
        Some(node)
    }
}

pub(crate) fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}

fn join<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, "{sep}")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Top => write!(f, "_"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{}", format_float(*x)),
            Value::String(s) => write!(f, "{}", quote(s)),
            Value::Constraint(atoms) => join(f, atoms, " & "),
            Value::Any(branches) => join(f, branches, " | "),
            Value::Struct(s) => {
                write!(f, "{{")?;
                for (i, (name, value)) in s.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {value}", Segment::Field(name.clone()))?;
                }
                write!(f, "}}")
            }
            Value::List(items) => {
                write!(f, "[")?;
                join(f, items, ", ")?;
                write!(f, "]")
            }
            Value::ListOf(elem) => write!(f, "[...{elem}]"),
            Value::Ref { path, with } => match with.as_ref() {
                Value::Top => write!(f, "{path}"),
                other => write!(f, "{path} & {other}"),
            },
            Value::Bottom(_) => write!(f, "_|_"),
        }
    }
}

// ============================================================================
// ENGINE CAPABILITY
// ============================================================================

impl Structured for Value {
    fn unify(&self, other: &Self) -> Self {
        finalize(&unify::meet(self, other))
    }

    fn validate(&self, mode: Validation) -> Result<(), ValueErrors> {
        let mut errors = ValueErrors::default();
        validate::collect(self, mode, &mut FieldPath::root(), &mut errors);
        errors.into_result()
    }

    fn lookup(&self, path: &FieldPath) -> Lookup<Self> {
        let mut node = self;
        let mut walked = FieldPath::root();
        for segment in path.segments() {
            if let Value::Bottom(message) = node {
                return Lookup::Errored(ValueErrors::single(walked, message.clone()));
            }
            let next = match (segment, node) {
                (Segment::Field(name), Value::Struct(s)) => s.fields.get(name),
                (Segment::Index(i), Value::List(items)) => items.get(*i),
                _ => None,
            };
            match next {
                Some(child) => node = child,
                None => return Lookup::Missing,
            }
            walked.push(segment.clone());
        }
        match node {
            Value::Bottom(message) => Lookup::Errored(ValueErrors::single(walked, message.clone())),
            other => Lookup::Found(other.clone()),
        }
    }

    fn shape(&self) -> Shape {
        match self {
            Value::Null => Shape::Scalar(Scalar::Null),
            Value::Bool(b) => Shape::Scalar(Scalar::Bool(*b)),
            Value::Int(n) => Shape::Scalar(Scalar::Int(*n)),
            Value::Float(x) => Shape::Scalar(Scalar::Float(*x)),
            Value::String(s) => Shape::Scalar(Scalar::String(s.clone())),
            Value::Struct(_) => Shape::Struct,
            Value::List(_) => Shape::List,
            Value::Bottom(_) => Shape::Error,
            Value::Top
            | Value::Constraint(_)
            | Value::Any(_)
            | Value::ListOf(_)
            | Value::Ref { .. } => Shape::Incomplete,
        }
    }

    fn fields(&self) -> Vec<(String, Self)> {
        match self {
            Value::Struct(s) => s
                .fields
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn elements(&self) -> Option<Vec<Self>> {
        match self {
            Value::List(items) => Some(items.clone()),
            _ => None,
        }
    }

    fn to_json(&self) -> Result<serde_json::Value, ValueErrors> {
        json::to_json(self, &mut FieldPath::root())
    }

    fn from_json(value: &serde_json::Value) -> Self {
        json::from_json(value)
    }

    fn open(&self) -> Self {
        match self {
            Value::Struct(s) => Value::Struct(Struct {
                fields: s
                    .fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.open()))
                    .collect(),
                closed: false,
            }),
            Value::List(items) => Value::List(items.iter().map(Structured::open).collect()),
            Value::ListOf(elem) => Value::ListOf(Box::new(elem.open())),
            Value::Any(branches) => Value::Any(branches.iter().map(Structured::open).collect()),
            Value::Ref { path, with } => Value::Ref {
                path: path.clone(),
                with: Box::new(with.open()),
            },
            other => other.clone(),
        }
    }

    fn from_string(text: &str) -> Result<Self, ValueErrors> {
        Ok(Value::String(text.to_string()))
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}
