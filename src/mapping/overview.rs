//! First traversal of the backup: build the overview the run is scoped by.
//!
//! Collects every project with its versions, components, issue id set and
//! resolved custom field configurations, plus document-wide facts: the
//! total record count (for progress pre-counts) and the old issue id to
//! issue key table that persistence error messages resolve through.

use crate::error::Result;
use crate::model::ExternalCustomFieldConfiguration;
use crate::parser::{self, custom_field::ConfigurationContext, kind};
use crate::scope::{BackupOverview, BackupProject, BackupSystemInformation};
use crate::xml::{Attributes, EntityHandler};
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Default)]
pub struct BackupOverviewHandler {
    projects: Vec<crate::model::ExternalProject>,
    versions: Vec<crate::model::ExternalVersion>,
    components: Vec<crate::model::ExternalComponent>,
    issue_ids: HashMap<String, HashSet<String>>,
    issue_keys: HashMap<String, String>,
    custom_fields: HashMap<String, (String, String)>,
    contexts: Vec<ConfigurationContext>,
    scheme_issue_types: HashMap<String, Vec<Option<String>>>,
    entity_count: u64,
}

impl BackupOverviewHandler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn configurations_for(&self, project_id: &str) -> Vec<ExternalCustomFieldConfiguration> {
        // Project-specific contexts win over global ones for the same field.
        let mut by_field: HashMap<&str, &ConfigurationContext> = HashMap::new();
        for context in &self.contexts {
            let Some(field_id) = parser::custom_field::field_id_from_key(&context.field_key) else {
                continue;
            };
            match context.project_id.as_deref() {
                Some(id) if id == project_id => {
                    by_field.insert(field_id, context);
                }
                None => {
                    by_field.entry(field_id).or_insert(context);
                }
                Some(_) => {}
            }
        }
        let mut configurations: Vec<ExternalCustomFieldConfiguration> = by_field
            .into_iter()
            .filter_map(|(field_id, context)| {
                let (name, type_key) = self.custom_fields.get(field_id)?;
                // A scheme with no rows, or any row without an issue type,
                // applies to all issue types.
                let issue_type_ids = match self.scheme_issue_types.get(&context.scheme_id) {
                    None => None,
                    Some(rows) if rows.iter().any(Option::is_none) => None,
                    Some(rows) => Some(rows.iter().flatten().cloned().collect()),
                };
                Some(ExternalCustomFieldConfiguration {
                    custom_field_id: field_id.to_string(),
                    custom_field_name: name.clone(),
                    type_key: type_key.clone(),
                    issue_type_ids,
                })
            })
            .collect();
        configurations.sort_by(|a, b| a.custom_field_id.cmp(&b.custom_field_id));
        configurations
    }

    /// Assemble the overview, consuming the collected rows.
    #[must_use]
    pub fn build(self) -> BackupOverview {
        let mut projects = Vec::with_capacity(self.projects.len());
        for project in &self.projects {
            let versions = self
                .versions
                .iter()
                .filter(|v| v.project_id == project.id)
                .cloned()
                .collect();
            let components = self
                .components
                .iter()
                .filter(|c| c.project_id == project.id)
                .cloned()
                .collect();
            let issue_ids = self.issue_ids.get(&project.id).cloned().unwrap_or_default();
            let configurations = self.configurations_for(&project.id);
            projects.push(BackupProject::new(
                project.clone(),
                versions,
                components,
                configurations,
                issue_ids,
            ));
        }
        debug!(
            projects = projects.len(),
            entities = self.entity_count,
            "backup overview assembled"
        );
        let mut system_information = BackupSystemInformation::new(None, self.entity_count);
        for (issue_id, key) in self.issue_keys {
            system_information.register_issue_key(issue_id, key);
        }
        BackupOverview::new(projects, system_information)
    }
}

impl EntityHandler for BackupOverviewHandler {
    fn handle_entity(&mut self, kind_name: &str, attributes: &Attributes) -> Result<()> {
        self.entity_count += 1;
        match kind_name {
            kind::PROJECT => self.projects.push(parser::project::parse(attributes)?),
            kind::VERSION => self
                .versions
                .push(parser::project::parse_version(attributes)?),
            kind::COMPONENT => self
                .components
                .push(parser::project::parse_component(attributes)?),
            kind::ISSUE => {
                let issue = parser::issue::parse(attributes)?;
                self.issue_keys.insert(issue.id.clone(), issue.key);
                self.issue_ids
                    .entry(issue.project_id)
                    .or_default()
                    .insert(issue.id);
            }
            kind::CUSTOM_FIELD => {
                let (id, name, type_key) = parser::custom_field::parse_field(attributes)?;
                self.custom_fields.insert(id, (name, type_key));
            }
            kind::CONFIGURATION_CONTEXT => self
                .contexts
                .push(parser::custom_field::parse_configuration_context(
                    attributes,
                )?),
            kind::FIELD_CONFIG_SCHEME_ISSUE_TYPE => {
                let (scheme_id, issue_type) =
                    parser::custom_field::parse_scheme_issue_type(attributes)?;
                self.scheme_issue_types
                    .entry(scheme_id)
                    .or_default()
                    .push(issue_type);
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn feed(handler: &mut BackupOverviewHandler, kind_name: &str, pairs: &[(&str, &str)]) {
        handler.handle_entity(kind_name, &attrs(pairs)).unwrap();
    }

    #[test]
    fn groups_issues_and_satellites_by_project() {
        let mut handler = BackupOverviewHandler::new();
        feed(
            &mut handler,
            kind::PROJECT,
            &[("id", "10001"), ("key", "MKY"), ("name", "Monkey")],
        );
        feed(
            &mut handler,
            kind::PROJECT,
            &[("id", "10002"), ("key", "HSP"), ("name", "Homosapien")],
        );
        feed(
            &mut handler,
            kind::VERSION,
            &[("id", "20000"), ("project", "10001"), ("name", "1.0")],
        );
        feed(
            &mut handler,
            kind::ISSUE,
            &[
                ("id", "10000"),
                ("key", "MKY-1"),
                ("project", "10001"),
                ("type", "1"),
            ],
        );
        feed(
            &mut handler,
            kind::ISSUE,
            &[
                ("id", "10010"),
                ("key", "HSP-1"),
                ("project", "10002"),
                ("type", "1"),
            ],
        );
        let overview = handler.build();
        let monkey = overview.project("MKY").unwrap();
        assert_eq!(monkey.versions().len(), 1);
        assert!(monkey.contains_issue("10000"));
        assert!(!monkey.contains_issue("10010"));
        assert_eq!(
            overview.system_information().issue_key_for_id("10010"),
            Some("HSP-1")
        );
        assert_eq!(overview.system_information().entity_count(), 5);
    }

    #[test]
    fn project_context_beats_global_and_resolves_issue_types() {
        let mut handler = BackupOverviewHandler::new();
        feed(
            &mut handler,
            kind::PROJECT,
            &[("id", "10001"), ("key", "MKY"), ("name", "Monkey")],
        );
        feed(
            &mut handler,
            kind::CUSTOM_FIELD,
            &[
                ("id", "10001"),
                ("name", "Severity"),
                ("customfieldtypekey", "select"),
            ],
        );
        feed(
            &mut handler,
            kind::CONFIGURATION_CONTEXT,
            &[("fieldconfigscheme", "100"), ("key", "customfield_10001")],
        );
        feed(
            &mut handler,
            kind::CONFIGURATION_CONTEXT,
            &[
                ("fieldconfigscheme", "101"),
                ("key", "customfield_10001"),
                ("project", "10001"),
            ],
        );
        feed(
            &mut handler,
            kind::FIELD_CONFIG_SCHEME_ISSUE_TYPE,
            &[("fieldconfigscheme", "100")],
        );
        feed(
            &mut handler,
            kind::FIELD_CONFIG_SCHEME_ISSUE_TYPE,
            &[("fieldconfigscheme", "101"), ("issuetype", "1")],
        );
        let overview = handler.build();
        let configurations = overview.project("MKY").unwrap().custom_field_configurations();
        assert_eq!(configurations.len(), 1);
        assert_eq!(
            configurations[0].issue_type_ids,
            Some(vec!["1".to_string()])
        );
        assert!(configurations[0].applies_to("1"));
        assert!(!configurations[0].applies_to("2"));
    }
}
