//! A canonical, type-safe representation of a path into a structured value.
//!
//! Paths are written as dotted selectors with optional list indices, e.g.
//! `metadata.labels[0]`. A segment wrapped in double quotes may contain dots
//! or brackets: `annotations."app.kubernetes.io/name"`.

use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Field(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FieldPath(pub Vec<Segment>);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid field path {path:?}: {reason}")]
pub struct PathError {
    pub path: String,
    pub reason: String,
}

impl PathError {
    fn new(path: &str, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Strips exactly one layer of wrapping double quotes, and only when both a
/// leading and a trailing quote are present.
///
/// ```rust
/// use schema_harness::path::strip_quotes;
/// assert_eq!(strip_quotes("\"metadata.fqn\""), "metadata.fqn");
/// assert_eq!(strip_quotes("\"half"), "\"half");
/// assert_eq!(strip_quotes("plain"), "plain");
/// ```
pub fn strip_quotes(key: &str) -> &str {
    if key.len() >= 2 && key.starts_with('"') && key.ends_with('"') {
        &key[1..key.len() - 1]
    } else {
        key
    }
}

impl FieldPath {
    /// The empty path, addressing the value itself.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parses a dotted path. The empty string parses to the root path.
    pub fn parse(text: &str) -> Result<Self, PathError> {
        let mut segments = Vec::new();
        let mut chars = text.chars().peekable();
        if chars.peek().is_none() {
            return Ok(Self::root());
        }
        loop {
            match chars.peek() {
                Some('"') => {
                    chars.next();
                    let mut name = String::new();
                    let mut closed = false;
                    while let Some(c) = chars.next() {
                        match c {
                            '\\' => match chars.next() {
                                Some(escaped) => name.push(escaped),
                                None => return Err(PathError::new(text, "dangling escape")),
                            },
                            '"' => {
                                closed = true;
                                break;
                            }
                            _ => name.push(c),
                        }
                    }
                    if !closed {
                        return Err(PathError::new(text, "unterminated quoted segment"));
                    }
                    segments.push(Segment::Field(name));
                }
                Some('[') => {
                    segments.push(Segment::Index(parse_index(text, &mut chars)?));
                }
                Some(_) => {
                    let mut name = String::new();
                    while let Some(&c) = chars.peek() {
                        if c == '.' || c == '[' {
                            break;
                        }
                        name.push(c);
                        chars.next();
                    }
                    if name.is_empty() {
                        return Err(PathError::new(text, "empty segment"));
                    }
                    segments.push(Segment::Field(name));
                }
                None => return Err(PathError::new(text, "trailing '.'")),
            }

            // Indices may follow any segment directly: `items[0][1]`.
            while chars.peek() == Some(&'[') {
                segments.push(Segment::Index(parse_index(text, &mut chars)?));
            }

            match chars.next() {
                None => break,
                Some('.') => continue,
                Some(c) => {
                    return Err(PathError::new(text, format!("unexpected character {c:?}")));
                }
            }
        }
        Ok(Self(segments))
    }

    /// Parses a path given as a record key, which may arrive wrapped in one
    /// layer of literal quotes. `"a.b"` and `a.b` address the same field.
    pub fn from_key(key: &str) -> Result<Self, PathError> {
        let cleaned = strip_quotes(key);
        if cleaned.is_empty() {
            return Err(PathError::new(key, "empty path"));
        }
        Self::parse(cleaned)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first_field(&self) -> Option<&str> {
        match self.0.first() {
            Some(Segment::Field(name)) => Some(name),
            _ => None,
        }
    }

    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.0.push(Segment::Field(name.into()));
        next
    }

    pub fn index(&self, index: usize) -> Self {
        let mut next = self.clone();
        next.0.push(Segment::Index(index));
        next
    }

    pub fn push(&mut self, segment: Segment) {
        self.0.push(segment);
    }

    pub fn pop(&mut self) -> Option<Segment> {
        self.0.pop()
    }

    /// The first `len` segments of this path.
    pub fn prefix(&self, len: usize) -> Self {
        Self(self.0[..len.min(self.0.len())].to_vec())
    }

    pub fn join(&self, other: &FieldPath) -> Self {
        let mut next = self.clone();
        next.0.extend(other.0.iter().cloned());
        next
    }
}

fn parse_index(
    text: &str,
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
) -> Result<usize, PathError> {
    chars.next(); // '['
    let mut digits = String::new();
    for c in chars.by_ref() {
        if c == ']' {
            return digits
                .parse()
                .map_err(|_| PathError::new(text, format!("invalid list index {digits:?}")));
        }
        digits.push(c);
    }
    Err(PathError::new(text, "unterminated list index"))
}

fn needs_quotes(name: &str) -> bool {
    name.is_empty()
        || name
            .chars()
            .any(|c| matches!(c, '.' | '[' | ']' | '"' | '\\') || c.is_whitespace())
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Field(name) if needs_quotes(name) => {
                write!(f, "\"")?;
                for c in name.chars() {
                    if c == '"' || c == '\\' {
                        write!(f, "\\")?;
                    }
                    write!(f, "{c}")?;
                }
                write!(f, "\"")
            }
            Segment::Field(name) => write!(f, "{name}"),
            Segment::Index(index) => write!(f, "[{index}]"),
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 && matches!(segment, Segment::Field(_)) {
                write!(f, ".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
