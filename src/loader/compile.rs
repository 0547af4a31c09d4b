//! YAML to [`Value`] compilation.
//!
//! Plain YAML data compiles to concrete values. Constraints are written
//! with tags:
//!
//! | tag | example | meaning |
//! |---|---|---|
//! | `!kind` | `!kind int` | any value of a kind |
//! | `!bound` | `!bound ">=0"` | numeric bound |
//! | `!match` | `!match "^[a-z]+$"` | string matching a regex |
//! | `!or` | `!or [TCP, UDP]` | disjunction |
//! | `!all` | `!all [!kind int, !bound ">0"]` | conjunction |
//! | `!ref` | `!ref "#Port"` | reference to another field |
//! | `!list_of` | `!list_of !kind string` | list of any length |
//! | `!top` | `!top` | anything |
//! | `!closed` / `!open` | `!closed {a: 1}` | struct closedness |
//!
//! Fields whose key starts with `#` are definitions: every struct inside
//! them is closed unless marked `!open`.

use serde_yaml::value::TaggedValue;
use serde_yaml::{Mapping, Value as Yaml};

use super::BUILD_TAG_KEY;
use crate::errors::HarnessError;
use crate::path::{FieldPath, Segment};
use crate::value::{Atom, Bound, Kind, Pattern, Struct, Value};

/// Parses and compiles one suite file. Returns `None` when the file's
/// `"@if"` key names no tag in `tags`.
pub fn compile_document(name: &str, text: &str, tags: &[String]) -> Result<Option<Value>, HarnessError> {
    let yaml: Yaml = serde_yaml::from_str(text).map_err(|source| HarnessError::Yaml {
        path: name.to_string(),
        source,
    })?;
    let mut mapping = match yaml {
        Yaml::Mapping(mapping) => mapping,
        // An empty file.
        Yaml::Null => Mapping::new(),
        other => {
            return Err(compile_error(
                name,
                &FieldPath::root(),
                format!("top level must be a mapping, found {}", yaml_type(&other)),
            ))
        }
    };

    if let Some(condition) = mapping.remove(BUILD_TAG_KEY) {
        let wanted = build_tags(name, &condition)?;
        if !wanted.iter().any(|tag| tags.contains(tag)) {
            return Ok(None);
        }
    }

    let mut compiler = Compiler {
        file: name,
        path: FieldPath::root(),
    };
    compiler.mapping(&mapping, false).map(Some)
}

fn build_tags(name: &str, condition: &Yaml) -> Result<Vec<String>, HarnessError> {
    let invalid = || {
        compile_error(
            name,
            &FieldPath::root().child(BUILD_TAG_KEY),
            "expected a tag name or a list of tag names",
        )
    };
    match condition {
        Yaml::String(tag) => Ok(vec![tag.clone()]),
        Yaml::Sequence(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or_else(invalid))
            .collect(),
        _ => Err(invalid()),
    }
}

fn compile_error(file: &str, path: &FieldPath, message: impl Into<String>) -> HarnessError {
    let message = message.into();
    HarnessError::Compile {
        path: file.to_string(),
        message: if path.is_root() {
            message
        } else {
            format!("at {path}: {message}")
        },
    }
}

fn yaml_type(yaml: &Yaml) -> &'static str {
    match yaml {
        Yaml::Null => "null",
        Yaml::Bool(_) => "bool",
        Yaml::Number(_) => "number",
        Yaml::String(_) => "string",
        Yaml::Sequence(_) => "sequence",
        Yaml::Mapping(_) => "mapping",
        Yaml::Tagged(_) => "tagged value",
    }
}

struct Compiler<'a> {
    file: &'a str,
    path: FieldPath,
}

impl Compiler<'_> {
    fn error(&self, message: impl Into<String>) -> HarnessError {
        compile_error(self.file, &self.path, message)
    }

    fn value(&mut self, yaml: &Yaml, closed: bool) -> Result<Value, HarnessError> {
        Ok(match yaml {
            Yaml::Null => Value::Null,
            Yaml::Bool(b) => Value::Bool(*b),
            Yaml::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().ok_or_else(|| self.error(format!("unsupported number {n}")))?),
            },
            Yaml::String(s) => Value::String(s.clone()),
            Yaml::Sequence(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    self.path.push(Segment::Index(i));
                    let compiled = self.value(item, closed);
                    self.path.pop();
                    out.push(compiled?);
                }
                Value::List(out)
            }
            Yaml::Mapping(mapping) => self.mapping(mapping, closed)?,
            Yaml::Tagged(tagged) => self.tagged(tagged, closed)?,
        })
    }

    fn mapping(&mut self, mapping: &Mapping, closed: bool) -> Result<Value, HarnessError> {
        let mut fields = im::OrdMap::new();
        for (key, yaml) in mapping {
            let name = match key {
                Yaml::String(s) => s.clone(),
                Yaml::Number(n) => n.to_string(),
                Yaml::Bool(b) => b.to_string(),
                other => return Err(self.error(format!("unsupported {} as mapping key", yaml_type(other)))),
            };
            let definition = name.starts_with('#');
            self.path.push(Segment::Field(name.clone()));
            let compiled = self.value(yaml, closed || definition);
            self.path.pop();
            fields.insert(name, compiled?);
        }
        Ok(Value::Struct(Struct { fields, closed }))
    }

    fn tagged(&mut self, tagged: &TaggedValue, closed: bool) -> Result<Value, HarnessError> {
        let tag = tagged.tag.to_string();
        let name = tag.trim_start_matches('!');
        let inner = &tagged.value;
        match name {
            "kind" => {
                let text = self.string_argument(name, inner)?;
                Kind::parse(text)
                    .map(Value::kind)
                    .ok_or_else(|| self.error(format!("unknown kind {text:?}")))
            }
            "bound" => {
                let text = self.string_argument(name, inner)?;
                Bound::parse(text)
                    .map(|bound| Value::Constraint(vec![Atom::Bound(bound)]))
                    .ok_or_else(|| self.error(format!("invalid bound {text:?}")))
            }
            "match" => {
                let text = self.string_argument(name, inner)?;
                Pattern::new(text)
                    .map(|pattern| Value::Constraint(vec![Atom::Match(pattern)]))
                    .map_err(|err| self.error(format!("invalid pattern {text:?}: {err}")))
            }
            "ref" => {
                let text = self.string_argument(name, inner)?;
                FieldPath::parse(text)
                    .map(Value::reference)
                    .map_err(|err| self.error(err.to_string()))
            }
            "or" => {
                let branches = self.branches(name, inner, closed)?;
                Ok(Value::any(branches))
            }
            "all" => {
                let branches = self.branches(name, inner, closed)?;
                Ok(branches.iter().fold(Value::Top, |acc, branch| acc.meet(branch)))
            }
            "list_of" => Ok(Value::ListOf(Box::new(self.value(inner, closed)?))),
            "top" => Ok(Value::Top),
            "closed" => self.value(inner, true),
            "open" => self.value(inner, false),
            other => Err(self.error(format!("unknown tag !{other}"))),
        }
    }

    fn string_argument<'y>(&self, tag: &str, yaml: &'y Yaml) -> Result<&'y str, HarnessError> {
        yaml.as_str()
            .ok_or_else(|| self.error(format!("!{tag} expects a string, found {}", yaml_type(yaml))))
    }

    fn branches(&mut self, tag: &str, yaml: &Yaml, closed: bool) -> Result<Vec<Value>, HarnessError> {
        let Yaml::Sequence(items) = yaml else {
            return Err(self.error(format!("!{tag} expects a sequence, found {}", yaml_type(yaml))));
        };
        if items.is_empty() {
            return Err(self.error(format!("!{tag} needs at least one branch")));
        }
        items.iter().map(|item| self.value(item, closed)).collect()
    }
}
