//! Issue records.
//!
//! An issue row carries every built-in field as a flat attribute. Long
//! text fields (description, environment) arrive folded in from nested
//! elements but are indistinguishable from plain attributes by the time
//! they get here.

use super::{kind, optional, push_optional, required, EntityRepresentation};
use crate::error::Result;
use crate::model::ExternalIssue;
use crate::xml::Attributes;

pub fn parse(attrs: &Attributes) -> Result<ExternalIssue> {
    Ok(ExternalIssue {
        id: required(kind::ISSUE, attrs, "id")?.to_string(),
        key: required(kind::ISSUE, attrs, "key")?.to_string(),
        project_id: required(kind::ISSUE, attrs, "project")?.to_string(),
        issue_type: required(kind::ISSUE, attrs, "type")?.to_string(),
        summary: attrs.get("summary").cloned().unwrap_or_default(),
        description: optional(attrs, "description"),
        environment: optional(attrs, "environment"),
        reporter: optional(attrs, "reporter"),
        assignee: optional(attrs, "assignee"),
        priority: optional(attrs, "priority"),
        status: optional(attrs, "status"),
        resolution: optional(attrs, "resolution"),
        security_level: optional(attrs, "security"),
        created: optional(attrs, "created"),
        updated: optional(attrs, "updated"),
        due_date: optional(attrs, "duedate"),
        resolution_date: optional(attrs, "resolutiondate"),
        votes: optional(attrs, "votes"),
        original_estimate: optional(attrs, "timeoriginalestimate"),
        estimate: optional(attrs, "timeestimate"),
        time_spent: optional(attrs, "timespent"),
    })
}

#[must_use]
pub fn representation(issue: &ExternalIssue) -> EntityRepresentation {
    let mut values = Attributes::new();
    values.insert("id".to_string(), issue.id.clone());
    values.insert("key".to_string(), issue.key.clone());
    values.insert("project".to_string(), issue.project_id.clone());
    values.insert("type".to_string(), issue.issue_type.clone());
    values.insert("summary".to_string(), issue.summary.clone());
    push_optional(&mut values, "description", issue.description.as_deref());
    push_optional(&mut values, "environment", issue.environment.as_deref());
    push_optional(&mut values, "reporter", issue.reporter.as_deref());
    push_optional(&mut values, "assignee", issue.assignee.as_deref());
    push_optional(&mut values, "priority", issue.priority.as_deref());
    push_optional(&mut values, "status", issue.status.as_deref());
    push_optional(&mut values, "resolution", issue.resolution.as_deref());
    push_optional(&mut values, "security", issue.security_level.as_deref());
    push_optional(&mut values, "created", issue.created.as_deref());
    push_optional(&mut values, "updated", issue.updated.as_deref());
    push_optional(&mut values, "duedate", issue.due_date.as_deref());
    push_optional(
        &mut values,
        "resolutiondate",
        issue.resolution_date.as_deref(),
    );
    push_optional(&mut values, "votes", issue.votes.as_deref());
    push_optional(
        &mut values,
        "timeoriginalestimate",
        issue.original_estimate.as_deref(),
    );
    push_optional(&mut values, "timeestimate", issue.estimate.as_deref());
    push_optional(&mut values, "timespent", issue.time_spent.as_deref());
    EntityRepresentation::new(kind::ISSUE, values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_attrs() -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("id".to_string(), "10000".to_string());
        attrs.insert("key".to_string(), "MKY-1".to_string());
        attrs.insert("project".to_string(), "10001".to_string());
        attrs.insert("type".to_string(), "1".to_string());
        attrs.insert("summary".to_string(), "A monkey".to_string());
        attrs
    }

    #[test]
    fn parses_minimal_issue() {
        let issue = parse(&minimal_attrs()).unwrap();
        assert_eq!(issue.id, "10000");
        assert_eq!(issue.key, "MKY-1");
        assert_eq!(issue.issue_type, "1");
        assert_eq!(issue.assignee, None);
    }

    #[test]
    fn missing_project_is_a_parse_error() {
        let mut attrs = minimal_attrs();
        attrs.shift_remove("project");
        assert!(parse(&attrs).is_err());
    }

    #[test]
    fn representation_omits_absent_fields() {
        let issue = parse(&minimal_attrs()).unwrap();
        let rep = representation(&issue);
        assert_eq!(rep.entity_name(), "Issue");
        assert!(rep.values().get("assignee").is_none());
        assert_eq!(rep.values().get("summary").map(String::as_str), Some("A monkey"));
    }
}
