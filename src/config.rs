//! Harness configuration.
//!
//! Defaults, overridden by an optional `harness.yaml` in the suite root,
//! overridden in turn by command-line flags.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::HarnessError;
use crate::format::DEFAULT_PREVIEW_LIMIT;
use crate::loader::CONFIG_FILE_NAMES;
use crate::model::DefinitionMode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Suite root. Set from the command line, never from the file.
    #[serde(skip)]
    pub root: PathBuf,
    /// Test package, relative to the root.
    pub pattern: String,
    /// Active build tags.
    pub tags: Vec<String>,
    pub definition_mode: DefinitionMode,
    /// Only run cases whose name contains this, ignoring case.
    pub filter: Option<String>,
    pub use_colors: bool,
    /// Longest input preview in a diagnostic.
    pub preview_limit: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            pattern: "./tests".to_string(),
            tags: vec!["test".to_string()],
            definition_mode: DefinitionMode::Value,
            filter: None,
            use_colors: atty::is(atty::Stream::Stderr),
            preview_limit: DEFAULT_PREVIEW_LIMIT,
        }
    }
}

impl HarnessConfig {
    /// Reads `harness.yaml` (or `.yml`) from `root` when present.
    pub fn load(root: &Path) -> Result<Self, HarnessError> {
        let file = CONFIG_FILE_NAMES
            .iter()
            .map(|name| root.join(name))
            .find(|path| path.is_file());
        let mut config = match file {
            Some(path) => {
                let text = fs::read_to_string(&path).map_err(|source| HarnessError::Io {
                    path: path.clone(),
                    source,
                })?;
                tracing::debug!(file = %path.display(), "loaded harness configuration");
                Self::from_yaml(&text, &path)?
            }
            None => Self::default(),
        };
        config.root = root.to_path_buf();
        Ok(config)
    }

    pub fn from_yaml(text: &str, path: &Path) -> Result<Self, HarnessError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|source| HarnessError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Whether a case is excluded by [`HarnessConfig::filter`].
    pub fn filters_out(&self, case_name: &str) -> bool {
        match &self.filter {
            Some(filter) => !case_name.to_lowercase().contains(&filter.to_lowercase()),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_conventional_layout() {
        let config = HarnessConfig::default();
        assert_eq!(config.pattern, "./tests");
        assert_eq!(config.tags, ["test"]);
        assert_eq!(config.definition_mode, DefinitionMode::Value);
        assert_eq!(config.preview_limit, 200);
    }

    #[test]
    fn file_values_override_defaults() {
        let config = HarnessConfig::from_yaml(
            "pattern: ./cases\ntags: [test, ci]\ndefinition_mode: path\npreview_limit: 80\n",
            Path::new("harness.yaml"),
        )
        .unwrap();
        assert_eq!(config.pattern, "./cases");
        assert_eq!(config.tags, ["test", "ci"]);
        assert_eq!(config.definition_mode, DefinitionMode::Path);
        assert_eq!(config.preview_limit, 80);
        assert_eq!(config.filter, None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = HarnessConfig::from_yaml("patern: ./cases\n", Path::new("harness.yaml")).unwrap_err();
        assert!(matches!(err, HarnessError::Config { .. }));
        assert!(HarnessConfig::from_yaml("", Path::new("harness.yaml")).is_ok());
    }

    #[test]
    fn filter_is_a_case_insensitive_substring() {
        let config = HarnessConfig {
            filter: Some("Port".into()),
            ..HarnessConfig::default()
        };
        assert!(!config.filters_out("valid port"));
        assert!(config.filters_out("service name"));
        assert!(!HarnessConfig::default().filters_out("anything"));
    }
}
