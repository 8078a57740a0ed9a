//! Crate-wide error type.

use std::path::PathBuf;
use thiserror::Error;

/// Failures that end an import run.
///
/// Recoverable per-record problems never surface here; they accumulate in
/// [`crate::persist::ProjectImportResults`] or a
/// [`crate::validation::MessageSet`] instead.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Unable to parse {entity}: {message}")]
    Parse { entity: String, message: String },

    #[error("{0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("The backup file '{0}' does not contain a project with key '{1}'.")]
    ProjectNotFound(PathBuf, String),

    #[error("The data mappings have validation errors; the import cannot proceed.")]
    ValidationFailed,

    #[error("The import was aborted after too many records failed to save.")]
    Aborted,
}

impl ImportError {
    /// A structural problem with one record of the backup document.
    pub fn parse(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            entity: entity.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_names_the_record_kind() {
        let err = ImportError::parse("Issue", "missing 'id' attribute");
        assert_eq!(err.to_string(), "Unable to parse Issue: missing 'id' attribute");
    }
}
