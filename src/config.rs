//! Run configuration for a project import.
//!
//! A [`ProjectImportOptions`] value is built once per migration run, either
//! in code or loaded from a YAML file, and handed to
//! [`crate::manager::ProjectImportManager`]. Selecting *which* project to
//! import and wiring this into a UI or CLI is the embedder's job.

use crate::error::{ImportError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Consecutive persistence errors tolerated before the import aborts.
const DEFAULT_ERROR_THRESHOLD: usize = 10;
/// Worker threads for the bounded persist executor.
const DEFAULT_WORKER_COUNT: usize = 10;

/// Options describing a single project import run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectImportOptions {
    /// Path to the full-system backup XML document.
    pub backup_path: PathBuf,
    /// Key of the project to extract from the backup.
    pub project_key: String,
    /// Root of the backed-up attachment directory tree. `None` disables
    /// attachment partitioning, validation and persistence.
    #[serde(default)]
    pub attachment_path: Option<PathBuf>,
    /// When the project already exists in the target, overwrite its details
    /// (name, description, lead) instead of leaving them untouched.
    #[serde(default)]
    pub overwrite_project_details: bool,
    /// How many persistence errors are tolerated before the run aborts.
    #[serde(default = "default_error_threshold")]
    pub error_threshold: usize,
    /// Worker threads for entity creation. `0` means all creation calls run
    /// inline on the parsing thread.
    #[serde(default = "default_worker_count")]
    pub workers: usize,
}

fn default_error_threshold() -> usize {
    DEFAULT_ERROR_THRESHOLD
}

fn default_worker_count() -> usize {
    DEFAULT_WORKER_COUNT
}

impl ProjectImportOptions {
    /// Options for importing `project_key` from the backup at `backup_path`.
    pub fn new(backup_path: impl Into<PathBuf>, project_key: impl Into<String>) -> Self {
        Self {
            backup_path: backup_path.into(),
            project_key: project_key.into(),
            attachment_path: None,
            overwrite_project_details: false,
            error_threshold: DEFAULT_ERROR_THRESHOLD,
            workers: DEFAULT_WORKER_COUNT,
        }
    }

    /// Load options from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let options: Self = serde_yaml::from_str(&contents)
            .map_err(|e| ImportError::Config(format!("Invalid options file: {e}")))?;
        options.validate()?;
        Ok(options)
    }

    /// Check the options for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns a config error for an empty project key or backup path.
    pub fn validate(&self) -> Result<()> {
        if self.project_key.trim().is_empty() {
            return Err(ImportError::Config(
                "A project key must be provided to select the project to import.".to_string(),
            ));
        }
        if self.backup_path.as_os_str().is_empty() {
            return Err(ImportError::Config(
                "A backup path must be provided.".to_string(),
            ));
        }
        Ok(())
    }

    /// True when attachments should be partitioned, validated and persisted.
    #[must_use]
    pub fn importing_attachments(&self) -> bool {
        self.attachment_path
            .as_ref()
            .is_some_and(|p| !p.as_os_str().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied_when_loading_minimal_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.yaml");
        fs::write(&path, "backup_path: /tmp/backup.xml\nproject_key: MKY\n").unwrap();

        let options = ProjectImportOptions::load(&path).unwrap();
        assert_eq!(options.project_key, "MKY");
        assert_eq!(options.error_threshold, DEFAULT_ERROR_THRESHOLD);
        assert_eq!(options.workers, DEFAULT_WORKER_COUNT);
        assert!(!options.importing_attachments());
    }

    #[test]
    fn empty_project_key_is_rejected() {
        let options = ProjectImportOptions::new("/tmp/backup.xml", "  ");
        let err = options.validate().unwrap_err();
        assert!(err.to_string().contains("project key"));
    }
}
