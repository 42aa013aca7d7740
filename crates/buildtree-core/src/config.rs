use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::filter::NodeFilter;
use crate::{Error, Result};

/// File name looked up when no explicit config path is given.
pub const CONFIG_FILE_NAME: &str = "buildtree.yaml";

/// View configuration read from `buildtree.yaml`.
///
/// ```yaml
/// workingDir: /home/me/project
/// sideBySide: false
/// navigateToFirstError: true
/// filter:
///   errorsOnly: true
///   name: "compile*"
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ViewConfig {
    /// Directory that file paths in messages are shown relative to.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Show failure details next to their node instead of after the tree.
    #[serde(default)]
    pub side_by_side: bool,

    /// Emit a one-shot navigation request for the first error with a location.
    #[serde(default = "default_true")]
    pub navigate_to_first_error: bool,

    /// Initial node filter.
    #[serde(default)]
    pub filter: FilterConfig,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            working_dir: None,
            side_by_side: false,
            navigate_to_first_error: true,
            filter: FilterConfig::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// The `filter` section.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    /// Show only failed nodes and their ancestors.
    #[serde(default)]
    pub errors_only: bool,

    /// Show only nodes with errors or warnings.
    #[serde(default)]
    pub problems_only: bool,

    /// Glob matched against node display text.
    #[serde(default)]
    pub name: Option<String>,
}

impl FilterConfig {
    /// Returns true if no filter criteria are set.
    pub fn is_empty(&self) -> bool {
        !self.errors_only && !self.problems_only && self.name.is_none()
    }

    /// Build the node filter these settings describe, or `None` when empty.
    ///
    /// Multiple criteria are combined with AND.
    pub fn to_filter(&self) -> Result<Option<NodeFilter>> {
        let mut filters = Vec::new();
        if self.errors_only {
            filters.push(NodeFilter::errors_only());
        }
        if self.problems_only {
            filters.push(NodeFilter::problems_only());
        }
        if let Some(ref pattern) = self.name {
            filters.push(NodeFilter::name_matches(pattern)?);
        }
        Ok(match filters.len() {
            0 => None,
            1 => filters.pop(),
            _ => Some(NodeFilter::all(filters)),
        })
    }
}

impl ViewConfig {
    /// Parse a config from YAML text.
    pub fn from_yaml(yaml: &str, path: &Path) -> Result<Self> {
        // An empty document means "all defaults".
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        yaml_serde::from_str(yaml).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load a config file from an explicit path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml(&content, path)?;

        // Relative working dirs are relative to the config file.
        if let Some(ref dir) = config.working_dir
            && dir.is_relative()
            && let Some(parent) = path.parent()
        {
            config.working_dir = Some(parent.join(dir));
        }
        Ok(config)
    }

    /// Find `buildtree.yaml` by walking up from `start` and load it.
    ///
    /// Returns defaults when no config file exists anywhere above `start`.
    pub fn find_and_load(start: &Path) -> Result<Self> {
        match find_config(start) {
            Some(path) => {
                tracing::debug!("loading config from {}", path.display());
                Self::load(&path)
            }
            None => Ok(Self::default()),
        }
    }
}

/// Walk up from `start` looking for [`CONFIG_FILE_NAME`].
pub fn find_config(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|candidate| candidate.is_file())
}
