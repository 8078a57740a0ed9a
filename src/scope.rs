//! Project scope: the immutable snapshot every pass consults.
//!
//! A [`BackupProject`] is computed once, during the overview pass, and
//! answers every downstream "is this record inside the project?" question
//! against its issue-id set or the project's own key/id. It is never
//! recomputed from raw data.

use crate::model::{
    ExternalComponent, ExternalCustomFieldConfiguration, ExternalProject, ExternalVersion,
};
use std::collections::{HashMap, HashSet};

/// One project as found in the backup, with everything owned by it.
#[derive(Debug, Clone, Default)]
pub struct BackupProject {
    project: ExternalProject,
    versions: Vec<ExternalVersion>,
    components: Vec<ExternalComponent>,
    custom_field_configurations: Vec<ExternalCustomFieldConfiguration>,
    issue_ids: HashSet<String>,
}

impl BackupProject {
    #[must_use]
    pub fn new(
        project: ExternalProject,
        versions: Vec<ExternalVersion>,
        components: Vec<ExternalComponent>,
        custom_field_configurations: Vec<ExternalCustomFieldConfiguration>,
        issue_ids: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            project,
            versions,
            components,
            custom_field_configurations,
            issue_ids: issue_ids.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn project(&self) -> &ExternalProject {
        &self.project
    }

    /// The project key, e.g. `MKY`.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.project.key
    }

    #[must_use]
    pub fn versions(&self) -> &[ExternalVersion] {
        &self.versions
    }

    #[must_use]
    pub fn components(&self) -> &[ExternalComponent] {
        &self.components
    }

    #[must_use]
    pub fn custom_field_configurations(&self) -> &[ExternalCustomFieldConfiguration] {
        &self.custom_field_configurations
    }

    /// Configuration for one custom field, if the field is relevant to this
    /// project.
    #[must_use]
    pub fn custom_field_configuration(
        &self,
        custom_field_id: &str,
    ) -> Option<&ExternalCustomFieldConfiguration> {
        self.custom_field_configurations
            .iter()
            .find(|config| config.custom_field_id == custom_field_id)
    }

    #[must_use]
    pub fn issue_ids(&self) -> &HashSet<String> {
        &self.issue_ids
    }

    /// Membership test used by every partition and mapping decision.
    #[must_use]
    pub fn contains_issue(&self, issue_id: &str) -> bool {
        self.issue_ids.contains(issue_id)
    }
}

/// System-wide facts from the backup that outlive any single project.
#[derive(Debug, Clone, Default)]
pub struct BackupSystemInformation {
    version: Option<String>,
    entity_count: u64,
    issue_keys: HashMap<String, String>,
}

impl BackupSystemInformation {
    #[must_use]
    pub fn new(version: Option<String>, entity_count: u64) -> Self {
        Self {
            version,
            entity_count,
            issue_keys: HashMap::new(),
        }
    }

    /// Source-system version string, when the backup declared one.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Total records in the backup document.
    #[must_use]
    pub fn entity_count(&self) -> u64 {
        self.entity_count
    }

    pub fn register_issue_key(&mut self, old_issue_id: impl Into<String>, key: impl Into<String>) {
        self.issue_keys.insert(old_issue_id.into(), key.into());
    }

    /// The issue key an *old* issue id had in the backup. Used to phrase
    /// persistence error messages in terms a human can find.
    #[must_use]
    pub fn issue_key_for_id(&self, old_issue_id: &str) -> Option<&str> {
        self.issue_keys.get(old_issue_id).map(String::as_str)
    }
}

/// Everything learned from the overview pass.
#[derive(Debug, Clone, Default)]
pub struct BackupOverview {
    projects: Vec<BackupProject>,
    system_information: BackupSystemInformation,
}

impl BackupOverview {
    #[must_use]
    pub fn new(projects: Vec<BackupProject>, system_information: BackupSystemInformation) -> Self {
        Self {
            projects,
            system_information,
        }
    }

    #[must_use]
    pub fn projects(&self) -> &[BackupProject] {
        &self.projects
    }

    /// Find a project by key.
    #[must_use]
    pub fn project(&self, key: &str) -> Option<&BackupProject> {
        self.projects.iter().find(|project| project.key() == key)
    }

    #[must_use]
    pub fn system_information(&self) -> &BackupSystemInformation {
        &self.system_information
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope_with_issues(ids: &[&str]) -> BackupProject {
        BackupProject::new(
            ExternalProject {
                id: "10000".to_string(),
                key: "MKY".to_string(),
                name: "Monkey".to_string(),
                ..ExternalProject::default()
            },
            Vec::new(),
            Vec::new(),
            Vec::new(),
            ids.iter().map(ToString::to_string),
        )
    }

    #[test]
    fn issue_membership_is_exact() {
        let scope = scope_with_issues(&["12", "14"]);
        assert!(scope.contains_issue("12"));
        assert!(scope.contains_issue("14"));
        assert!(!scope.contains_issue("10"));
        assert!(!scope.contains_issue("140"));
    }

    #[test]
    fn issue_key_lookup_round_trips() {
        let mut info = BackupSystemInformation::new(None, 0);
        info.register_issue_key("12", "MKY-1");
        assert_eq!(info.issue_key_for_id("12"), Some("MKY-1"));
        assert_eq!(info.issue_key_for_id("99"), None);
    }
}
