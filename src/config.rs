//! Run configuration.
//!
//! Every field has a default, so a YAML file only needs to name what it
//! overrides:
//!
//! ```yaml
//! specialize_threshold: 25
//! module_suffix: ".pa"
//! module_dir: lib
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

pub const DEFAULT_SPECIALIZE_THRESHOLD: usize = 10;
pub const DEFAULT_MODULE_SUFFIX: &str = ".pa";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Call count at which a function is considered for the arithmetic fast
    /// path.
    pub specialize_threshold: usize,
    /// Appended to a module name to form its file name.
    pub module_suffix: String,
    /// Directory searched for imported modules. Falls back to the entry
    /// file's directory, then to the working directory.
    pub module_dir: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            specialize_threshold: DEFAULT_SPECIALIZE_THRESHOLD,
            module_suffix: DEFAULT_MODULE_SUFFIX.to_string(),
            module_dir: None,
        }
    }
}

impl RunConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let config: RunConfig = serde_yaml::from_str(raw).context("Parsing run configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
        Self::from_yaml_str(&raw).with_context(|| format!("Loading {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.specialize_threshold >= 1,
            "specialize_threshold must be at least 1"
        );
        ensure!(
            !self.module_suffix.is_empty(),
            "module_suffix must not be empty"
        );
        Ok(())
    }

    /// Module directory to use for a program loaded from `entry`.
    pub fn module_dir_for(&self, entry: Option<&Path>) -> PathBuf {
        if let Some(dir) = &self.module_dir {
            return dir.clone();
        }
        entry
            .and_then(Path::parent)
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
