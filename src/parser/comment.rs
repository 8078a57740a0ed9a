//! Comment records, stored as generic "Action" rows in the backup.
//!
//! Only actions of type `comment` are comments; any other action type is
//! skipped by returning `None` rather than an error.

use super::{kind, optional, push_optional, required, EntityRepresentation};
use crate::error::Result;
use crate::model::ExternalComment;
use crate::xml::Attributes;

const ACTION_TYPE_COMMENT: &str = "comment";

pub fn parse(attrs: &Attributes) -> Result<Option<ExternalComment>> {
    if attrs.get("type").map(String::as_str) != Some(ACTION_TYPE_COMMENT) {
        return Ok(None);
    }
    Ok(Some(ExternalComment {
        id: required(kind::COMMENT, attrs, "id")?.to_string(),
        issue_id: required(kind::COMMENT, attrs, "issue")?.to_string(),
        author: optional(attrs, "author"),
        body: optional(attrs, "body"),
        created: optional(attrs, "created"),
        group_level: optional(attrs, "level"),
        role_level: optional(attrs, "rolelevel"),
    }))
}

#[must_use]
pub fn representation(comment: &ExternalComment) -> EntityRepresentation {
    let mut values = Attributes::new();
    values.insert("id".to_string(), comment.id.clone());
    values.insert("issue".to_string(), comment.issue_id.clone());
    values.insert("type".to_string(), ACTION_TYPE_COMMENT.to_string());
    push_optional(&mut values, "author", comment.author.as_deref());
    push_optional(&mut values, "body", comment.body.as_deref());
    push_optional(&mut values, "created", comment.created.as_deref());
    push_optional(&mut values, "level", comment.group_level.as_deref());
    push_optional(&mut values, "rolelevel", comment.role_level.as_deref());
    EntityRepresentation::new(kind::COMMENT, values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_comment_actions_are_skipped() {
        let mut attrs = Attributes::new();
        attrs.insert("id".to_string(), "200".to_string());
        attrs.insert("issue".to_string(), "10000".to_string());
        attrs.insert("type".to_string(), "worklog".to_string());
        assert_eq!(parse(&attrs).unwrap(), None);
    }

    #[test]
    fn parses_comment_with_visibility_levels() {
        let mut attrs = Attributes::new();
        attrs.insert("id".to_string(), "200".to_string());
        attrs.insert("issue".to_string(), "10000".to_string());
        attrs.insert("type".to_string(), "comment".to_string());
        attrs.insert("author".to_string(), "fred".to_string());
        attrs.insert("level".to_string(), "jira-developers".to_string());
        attrs.insert("rolelevel".to_string(), "10050".to_string());
        let comment = parse(&attrs).unwrap().unwrap();
        assert_eq!(comment.group_level.as_deref(), Some("jira-developers"));
        assert_eq!(comment.role_level.as_deref(), Some("10050"));
    }
}
