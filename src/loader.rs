//! Locating and loading suite documents.
//!
//! A suite is a directory of YAML files. Files directly inside the suite
//! root form the schema package; files anywhere under `root/pattern` form
//! the test package. Every selected file is compiled into a
//! [`Value`](crate::value::Value) and all of them are combined into a single
//! document, the way a package of source files unifies into one value.
//!
//! A file may restrict itself to certain build tags with a top-level
//! `"@if"` key:
//!
//! ```yaml
//! "@if": test
//! "#tests":
//!   port: [...]
//! ```
//!
//! The key is removed before compilation. Files whose tag is not active are
//! skipped.

use std::fs;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::engine::Structured;
use crate::errors::HarnessError;
use crate::value::{self, Value};

mod compile;

pub use compile::compile_document;

/// Name of the build-tag key in a suite file.
pub const BUILD_TAG_KEY: &str = "@if";

/// File name of the optional configuration file, never treated as a source.
pub const CONFIG_FILE_NAMES: [&str; 2] = ["harness.yaml", "harness.yml"];

/// Loads a suite directory into one structured document.
pub trait DocumentLoader {
    type Value: Structured;

    fn load(&self, dir: &Path, pattern: &str, tags: &[String]) -> Result<Self::Value, HarnessError>;
}

/// The bundled YAML loader, producing [`Value`] documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct YamlLoader;

impl DocumentLoader for YamlLoader {
    type Value = Value;

    fn load(&self, dir: &Path, pattern: &str, tags: &[String]) -> Result<Value, HarnessError> {
        let files = select_files(dir, pattern)?;
        let mut sources = Vec::with_capacity(files.len());
        for file in files {
            let text = fs::read_to_string(&file).map_err(|source| HarnessError::Io {
                path: file.clone(),
                source,
            })?;
            sources.push((file.display().to_string(), text));
        }
        let document = load_sources(&sources, tags)?;
        document.ok_or_else(|| HarnessError::NoSources {
            dir: dir.to_path_buf(),
        })
    }
}

/// Compiles and unifies already-read sources. `None` when every source was
/// excluded by its build tag.
pub fn load_sources(sources: &[(String, String)], tags: &[String]) -> Result<Option<Value>, HarnessError> {
    let mut document: Option<Value> = None;
    for (name, text) in sources {
        match compile_document(name, text, tags)? {
            Some(compiled) => {
                tracing::debug!(file = %name, "loaded suite file");
                document = Some(match document {
                    Some(acc) => acc.combine(&compiled),
                    None => compiled,
                });
            }
            None => tracing::debug!(file = %name, "skipped suite file: build tag not active"),
        }
    }
    Ok(document.map(|doc| value::link(&doc)))
}

// ============================================================================
// FILE SELECTION
// ============================================================================

/// Suite files in `dir` (non-recursive) followed by those under
/// `dir/pattern` (recursive), each set in sorted order, without duplicates.
pub fn select_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, HarnessError> {
    let mut files = yaml_files(dir, Some(1))?;
    files.retain(|path| !is_config_file(path));

    let tests_dir = tests_dir(dir, pattern);
    if tests_dir != dir {
        if !tests_dir.is_dir() {
            return Err(HarnessError::Io {
                path: tests_dir,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "test package directory not found"),
            });
        }
        for path in yaml_files(&tests_dir, None)? {
            if !files.contains(&path) {
                files.push(path);
            }
        }
    }
    Ok(files)
}

fn tests_dir(dir: &Path, pattern: &str) -> PathBuf {
    let relative: PathBuf = Path::new(pattern)
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if relative.as_os_str().is_empty() {
        dir.to_path_buf()
    } else {
        dir.join(relative)
    }
}

fn yaml_files(dir: &Path, max_depth: Option<usize>) -> Result<Vec<PathBuf>, HarnessError> {
    let mut walker = WalkDir::new(dir).sort_by_file_name();
    if let Some(depth) = max_depth {
        walker = walker.max_depth(depth);
    }
    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|source| HarnessError::Walk {
            dir: dir.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() && is_yaml(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext == "yaml" || ext == "yml")
        .unwrap_or(false)
}

fn is_config_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| CONFIG_FILE_NAMES.contains(&name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Lookup;
    use crate::path::FieldPath;

    fn sources(files: &[(&str, &str)]) -> Vec<(String, String)> {
        files
            .iter()
            .map(|(name, text)| (name.to_string(), text.to_string()))
            .collect()
    }

    fn tags(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn files_unify_into_one_document() {
        let files = sources(&[
            ("schema.yaml", "\"#Port\":\n  number: !kind int\n"),
            ("tests/port.yaml", "\"#tests\":\n  port:\n    - name: ok\n      definition: !ref \"#Port\"\n      input: {number: 1}\n"),
        ]);
        let document = load_sources(&files, &tags(&["test"])).unwrap().unwrap();
        let definition = FieldPath::parse("#tests.port[0].definition").unwrap();
        match document.lookup(&definition) {
            Lookup::Found(Value::Struct(s)) => assert!(s.closed),
            other => panic!("expected linked definition, got {other:?}"),
        }
    }

    #[test]
    fn definitions_may_span_files() {
        let files = sources(&[
            ("tests/a.yaml", "\"#tests\":\n  first:\n    - name: a\n"),
            ("tests/b.yaml", "\"#tests\":\n  second:\n    - name: b\n"),
        ]);
        let document = load_sources(&files, &[]).unwrap().unwrap();
        assert!(matches!(document.lookup(&FieldPath::parse("#tests.first[0].name").unwrap()), Lookup::Found(_)));
        assert!(matches!(document.lookup(&FieldPath::parse("#tests.second[0].name").unwrap()), Lookup::Found(_)));
    }

    #[test]
    fn inactive_build_tags_exclude_files() {
        let files = sources(&[
            ("a.yaml", "\"@if\": test\nonly_in_tests: 1\n"),
            ("b.yaml", "always: 2\n"),
        ]);
        let without = load_sources(&files, &[]).unwrap().unwrap();
        assert!(matches!(without.lookup(&FieldPath::parse("only_in_tests").unwrap()), Lookup::Missing));
        let with = load_sources(&files, &tags(&["test"])).unwrap().unwrap();
        assert!(matches!(with.lookup(&FieldPath::parse("only_in_tests").unwrap()), Lookup::Found(Value::Int(1))));
    }

    #[test]
    fn everything_excluded_yields_nothing() {
        let files = sources(&[("a.yaml", "\"@if\": [test, ci]\nx: 1\n")]);
        assert!(load_sources(&files, &tags(&["dev"])).unwrap().is_none());
        assert!(load_sources(&files, &tags(&["ci"])).unwrap().is_some());
    }

    #[test]
    fn conflicting_files_produce_errors_not_failures() {
        let files = sources(&[("a.yaml", "x: 1\n"), ("b.yaml", "x: 2\n")]);
        let document = load_sources(&files, &[]).unwrap().unwrap();
        assert!(matches!(document.lookup(&FieldPath::parse("x").unwrap()), Lookup::Errored(_)));
    }

    #[test]
    fn pattern_is_relative_to_the_suite_root() {
        let root = Path::new("suite");
        assert_eq!(tests_dir(root, "./tests"), root.join("tests"));
        assert_eq!(tests_dir(root, "."), root.to_path_buf());
        assert_eq!(tests_dir(root, ""), root.to_path_buf());
        assert!(is_config_file(Path::new("suite/harness.yaml")));
        assert!(!is_config_file(Path::new("suite/schema.yaml")));
    }
}
