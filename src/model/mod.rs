//! External record beans.
//!
//! An "external" value is one decoded from the backup document: every
//! identifier in it is an *old* id (the source system's id space). Records
//! are immutable units of dispatch; the persister handlers build transformed
//! copies with new ids rather than mutating these in place.
//!
//! Identifiers are kept as strings throughout, exactly as they appear in the
//! backup, so a round trip through a partition never reformats them.

use serde::{Deserialize, Serialize};

/// A project record from the backup, the anchor of the import scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalProject {
    pub id: String,
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Username of the project lead, an old user reference.
    #[serde(default)]
    pub lead: Option<String>,
    #[serde(default)]
    pub assignee_type: Option<String>,
    /// Highest issue number ever allocated in the source project.
    #[serde(default)]
    pub counter: Option<String>,
}

/// A project version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalVersion {
    pub id: String,
    pub project_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sequence: Option<i64>,
    #[serde(default)]
    pub released: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub release_date: Option<String>,
}

/// A project component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalComponent {
    pub id: String,
    pub project_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Old user reference for the component lead.
    #[serde(default)]
    pub lead: Option<String>,
    #[serde(default)]
    pub assignee_type: Option<String>,
}

/// A user known to the source system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalUser {
    pub name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl ExternalUser {
    /// Best human-readable name for messages.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.name)
    }
}

/// An issue record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIssue {
    pub id: String,
    pub key: String,
    pub project_id: String,
    pub issue_type: String,
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub reporter: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub security_level: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub resolution_date: Option<String>,
    #[serde(default)]
    pub votes: Option<String>,
    #[serde(default)]
    pub original_estimate: Option<String>,
    #[serde(default)]
    pub time_spent: Option<String>,
    #[serde(default)]
    pub estimate: Option<String>,
}

/// A comment on an issue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalComment {
    pub id: String,
    pub issue_id: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    /// Group-level visibility restriction, an old group name.
    #[serde(default)]
    pub group_level: Option<String>,
    /// Role-level visibility restriction, an old project role id.
    #[serde(default)]
    pub role_level: Option<String>,
}

/// A worklog entry on an issue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalWorklog {
    pub id: String,
    pub issue_id: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub time_spent: Option<String>,
    #[serde(default)]
    pub group_level: Option<String>,
    #[serde(default)]
    pub role_level: Option<String>,
}

/// A file attachment record. `file_name` is the natural key used in
/// validation warnings and persistence error messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalAttachment {
    pub id: String,
    pub issue_id: String,
    pub file_name: String,
    #[serde(default)]
    pub attacher: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
}

/// A link between two issues.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIssueLink {
    pub id: String,
    pub link_type_id: String,
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub destination_id: Option<String>,
    #[serde(default)]
    pub sequence: Option<String>,
}

/// A generic association between an issue and another entity (version,
/// component). The association type tells the two apart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalNodeAssociation {
    pub source_node_id: String,
    pub source_node_entity: String,
    pub sink_node_id: String,
    pub sink_node_entity: String,
    pub association_type: String,
}

/// A user-to-issue association (vote or watch).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalUserAssociation {
    /// Old username.
    pub source_name: String,
    pub sink_node_id: String,
    pub sink_node_entity: String,
    pub association_type: String,
}

/// A change-history group. Change items reference it by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalChangeGroup {
    pub id: String,
    pub issue_id: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
}

/// A single field change inside a change group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalChangeItem {
    pub id: String,
    pub group_id: String,
    pub field_type: String,
    pub field: String,
    #[serde(default)]
    pub old_value: Option<String>,
    #[serde(default)]
    pub old_string: Option<String>,
    #[serde(default)]
    pub new_value: Option<String>,
    #[serde(default)]
    pub new_string: Option<String>,
}

/// A custom field value attached to an issue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalCustomFieldValue {
    pub id: String,
    pub custom_field_id: String,
    pub issue_id: String,
    #[serde(default)]
    pub string_value: Option<String>,
    #[serde(default)]
    pub number_value: Option<String>,
    #[serde(default)]
    pub date_value: Option<String>,
    #[serde(default)]
    pub text_value: Option<String>,
    /// Distinguishes parent from child rows for cascading option fields.
    #[serde(default)]
    pub parent_key: Option<String>,
}

impl ExternalCustomFieldValue {
    /// The value payload, whichever column it was stored in.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.string_value
            .as_deref()
            .or(self.number_value.as_deref())
            .or(self.date_value.as_deref())
            .or(self.text_value.as_deref())
    }
}

/// A selectable option of a custom field, possibly a child of another option.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalCustomFieldOption {
    pub id: String,
    pub custom_field_id: String,
    pub field_config_id: String,
    #[serde(default)]
    pub parent_option_id: Option<String>,
    pub value: String,
}

/// The configuration a custom field carries for the imported project:
/// which field it is and which issue types it applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalCustomFieldConfiguration {
    pub custom_field_id: String,
    pub custom_field_name: String,
    pub type_key: String,
    /// Old issue-type ids the configuration is constrained to; `None`
    /// means it applies to all issue types.
    #[serde(default)]
    pub issue_type_ids: Option<Vec<String>>,
}

impl ExternalCustomFieldConfiguration {
    /// True if this configuration covers the given old issue type.
    #[must_use]
    pub fn applies_to(&self, issue_type_id: &str) -> bool {
        match &self.issue_type_ids {
            None => true,
            Some(ids) => ids.iter().any(|id| id == issue_type_id),
        }
    }
}

/// Membership of a user or group in a project role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalProjectRoleActor {
    #[serde(default)]
    pub id: Option<String>,
    pub project_id: String,
    pub role_id: String,
    pub role_type: String,
    /// Username or group name depending on `role_type`.
    pub role_actor: String,
}

pub(crate) const ROLE_TYPE_USER: &str = "atlassian-user-role-actor";
pub(crate) const ROLE_TYPE_GROUP: &str = "atlassian-group-role-actor";

impl ExternalProjectRoleActor {
    #[must_use]
    pub fn is_user_actor(&self) -> bool {
        self.role_type == ROLE_TYPE_USER
    }

    #[must_use]
    pub fn is_group_actor(&self) -> bool {
        self.role_type == ROLE_TYPE_GROUP
    }
}

/// An arbitrary keyed property attached to an entity (issue, comment,
/// change group).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalEntityProperty {
    pub id: String,
    pub entity_name: String,
    pub entity_id: String,
    pub property_key: String,
    #[serde(default)]
    pub value: Option<String>,
}

/// A label on an issue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalLabel {
    pub id: String,
    pub issue_id: String,
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_field_configuration_with_no_constraint_applies_everywhere() {
        let config = ExternalCustomFieldConfiguration {
            custom_field_id: "10001".to_string(),
            custom_field_name: "Severity".to_string(),
            type_key: "select".to_string(),
            issue_type_ids: None,
        };
        assert!(config.applies_to("1"));
        assert!(config.applies_to("99"));
    }

    #[test]
    fn custom_field_configuration_respects_issue_type_constraint() {
        let config = ExternalCustomFieldConfiguration {
            issue_type_ids: Some(vec!["1".to_string(), "3".to_string()]),
            ..ExternalCustomFieldConfiguration::default()
        };
        assert!(config.applies_to("1"));
        assert!(!config.applies_to("2"));
    }

    #[test]
    fn role_actor_type_discrimination() {
        let actor = ExternalProjectRoleActor {
            role_type: ROLE_TYPE_GROUP.to_string(),
            ..ExternalProjectRoleActor::default()
        };
        assert!(actor.is_group_actor());
        assert!(!actor.is_user_actor());
    }
}
