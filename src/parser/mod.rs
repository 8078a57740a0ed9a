//! Per-kind record parsers.
//!
//! Each submodule converts between the raw ordered attribute map of one
//! record kind and its typed external bean, in both directions: `parse`
//! for reading the backup, `representation` for handing a transformed
//! record back to the target for creation.
//!
//! Attribute names here are the backup document's names, not ours, so
//! a partitioned document stays byte-compatible with the original.

pub mod association;
pub mod attachment;
pub mod change;
pub mod comment;
pub mod custom_field;
pub mod issue;
pub mod link;
pub mod project;
pub mod property;
pub mod user;
pub mod worklog;

use crate::error::{ImportError, Result};
use crate::xml::Attributes;

/// Record kind discriminators as they appear in the backup document.
pub mod kind {
    pub const PROJECT: &str = "Project";
    pub const VERSION: &str = "Version";
    pub const COMPONENT: &str = "Component";
    pub const ISSUE: &str = "Issue";
    /// Comments; the backup calls them actions.
    pub const COMMENT: &str = "Action";
    pub const WORKLOG: &str = "Worklog";
    pub const ATTACHMENT: &str = "FileAttachment";
    pub const ISSUE_LINK: &str = "IssueLink";
    pub const ISSUE_LINK_TYPE: &str = "IssueLinkType";
    pub const NODE_ASSOCIATION: &str = "NodeAssociation";
    pub const USER_ASSOCIATION: &str = "UserAssociation";
    pub const CHANGE_GROUP: &str = "ChangeGroup";
    pub const CHANGE_ITEM: &str = "ChangeItem";
    pub const CUSTOM_FIELD: &str = "CustomField";
    pub const CUSTOM_FIELD_VALUE: &str = "CustomFieldValue";
    pub const CUSTOM_FIELD_OPTION: &str = "CustomFieldOption";
    pub const CONFIGURATION_CONTEXT: &str = "ConfigurationContext";
    pub const FIELD_CONFIG_SCHEME_ISSUE_TYPE: &str = "FieldConfigSchemeIssueType";
    pub const ISSUE_TYPE: &str = "IssueType";
    pub const PRIORITY: &str = "Priority";
    pub const RESOLUTION: &str = "Resolution";
    pub const STATUS: &str = "Status";
    pub const SECURITY_LEVEL: &str = "SchemeIssueSecurityLevels";
    pub const PROJECT_ROLE: &str = "ProjectRole";
    pub const PROJECT_ROLE_ACTOR: &str = "ProjectRoleActor";
    pub const USER: &str = "User";
    pub const GROUP: &str = "Group";
    pub const ENTITY_PROPERTY: &str = "EntityProperty";
    pub const LABEL: &str = "Label";
}

/// A record ready to be created in the target: its kind plus the ordered
/// attribute map, with every foreign id already rewritten to a new id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRepresentation {
    entity_name: String,
    values: Attributes,
}

impl EntityRepresentation {
    #[must_use]
    pub fn new(entity_name: impl Into<String>, values: Attributes) -> Self {
        Self {
            entity_name: entity_name.into(),
            values,
        }
    }

    #[must_use]
    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    #[must_use]
    pub fn values(&self) -> &Attributes {
        &self.values
    }
}

/// A non-empty attribute the record cannot be understood without.
pub(crate) fn required<'a>(kind: &str, attrs: &'a Attributes, name: &str) -> Result<&'a str> {
    match attrs.get(name).map(String::as_str) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ImportError::parse(
            kind,
            format!("missing '{name}' attribute"),
        )),
    }
}

pub(crate) fn optional(attrs: &Attributes, name: &str) -> Option<String> {
    attrs
        .get(name)
        .filter(|value| !value.is_empty())
        .cloned()
}

/// Push an attribute only when it has a value; absent fields are omitted
/// rather than written empty.
pub(crate) fn push_optional(values: &mut Attributes, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        values.insert(name.to_string(), value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_rejects_empty_attribute() {
        let mut attrs = Attributes::new();
        attrs.insert("id".to_string(), String::new());
        let err = required("Issue", &attrs, "id").unwrap_err();
        assert_eq!(err.to_string(), "Unable to parse Issue: missing 'id' attribute");
    }

    #[test]
    fn optional_treats_empty_as_absent() {
        let mut attrs = Attributes::new();
        attrs.insert("assignee".to_string(), String::new());
        assert_eq!(optional(&attrs, "assignee"), None);
        attrs.insert("assignee".to_string(), "fred".to_string());
        assert_eq!(optional(&attrs, "assignee").as_deref(), Some("fred"));
    }
}
