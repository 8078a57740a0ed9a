//! Project records and their satellites: versions, components, role actors.

use super::{kind, optional, push_optional, required, EntityRepresentation};
use crate::error::Result;
use crate::model::{
    ExternalComponent, ExternalProject, ExternalProjectRoleActor, ExternalVersion,
};
use crate::xml::Attributes;

pub fn parse(attrs: &Attributes) -> Result<ExternalProject> {
    Ok(ExternalProject {
        id: required(kind::PROJECT, attrs, "id")?.to_string(),
        key: required(kind::PROJECT, attrs, "key")?.to_string(),
        name: required(kind::PROJECT, attrs, "name")?.to_string(),
        description: optional(attrs, "description"),
        url: optional(attrs, "url"),
        lead: optional(attrs, "lead"),
        assignee_type: optional(attrs, "assigneetype"),
        counter: optional(attrs, "counter"),
    })
}

#[must_use]
pub fn representation(project: &ExternalProject) -> EntityRepresentation {
    let mut values = Attributes::new();
    values.insert("id".to_string(), project.id.clone());
    values.insert("key".to_string(), project.key.clone());
    values.insert("name".to_string(), project.name.clone());
    push_optional(&mut values, "description", project.description.as_deref());
    push_optional(&mut values, "url", project.url.as_deref());
    push_optional(&mut values, "lead", project.lead.as_deref());
    push_optional(&mut values, "assigneetype", project.assignee_type.as_deref());
    push_optional(&mut values, "counter", project.counter.as_deref());
    EntityRepresentation::new(kind::PROJECT, values)
}

pub fn parse_version(attrs: &Attributes) -> Result<ExternalVersion> {
    Ok(ExternalVersion {
        id: required(kind::VERSION, attrs, "id")?.to_string(),
        project_id: required(kind::VERSION, attrs, "project")?.to_string(),
        name: required(kind::VERSION, attrs, "name")?.to_string(),
        description: optional(attrs, "description"),
        sequence: optional(attrs, "sequence").and_then(|s| s.parse().ok()),
        released: attrs.get("released").map(String::as_str) == Some("true"),
        archived: attrs.get("archived").map(String::as_str) == Some("true"),
        release_date: optional(attrs, "releasedate"),
    })
}

pub fn parse_component(attrs: &Attributes) -> Result<ExternalComponent> {
    Ok(ExternalComponent {
        id: required(kind::COMPONENT, attrs, "id")?.to_string(),
        project_id: required(kind::COMPONENT, attrs, "project")?.to_string(),
        name: required(kind::COMPONENT, attrs, "name")?.to_string(),
        description: optional(attrs, "description"),
        lead: optional(attrs, "lead"),
        assignee_type: optional(attrs, "assigneetype"),
    })
}

pub fn parse_role_actor(attrs: &Attributes) -> Result<ExternalProjectRoleActor> {
    let kind_name = kind::PROJECT_ROLE_ACTOR;
    Ok(ExternalProjectRoleActor {
        id: optional(attrs, "id"),
        project_id: required(kind_name, attrs, "pid")?.to_string(),
        role_id: required(kind_name, attrs, "projectroleid")?.to_string(),
        role_type: required(kind_name, attrs, "roletype")?.to_string(),
        role_actor: required(kind_name, attrs, "roletypeparameter")?.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_flags_parse_from_text_booleans() {
        let mut attrs = Attributes::new();
        attrs.insert("id".to_string(), "20000".to_string());
        attrs.insert("project".to_string(), "10001".to_string());
        attrs.insert("name".to_string(), "1.0".to_string());
        attrs.insert("released".to_string(), "true".to_string());
        attrs.insert("sequence".to_string(), "3".to_string());
        let version = parse_version(&attrs).unwrap();
        assert!(version.released);
        assert!(!version.archived);
        assert_eq!(version.sequence, Some(3));
    }

    #[test]
    fn role_actor_reads_membership_fields() {
        let mut attrs = Attributes::new();
        attrs.insert("id".to_string(), "1".to_string());
        attrs.insert("pid".to_string(), "10001".to_string());
        attrs.insert("projectroleid".to_string(), "10050".to_string());
        attrs.insert(
            "roletype".to_string(),
            "atlassian-group-role-actor".to_string(),
        );
        attrs.insert("roletypeparameter".to_string(), "jira-developers".to_string());
        let actor = parse_role_actor(&attrs).unwrap();
        assert!(actor.is_group_actor());
        assert_eq!(actor.role_actor, "jira-developers");
    }
}
