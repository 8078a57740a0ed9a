//! Worklog records.

use super::{kind, optional, push_optional, required, EntityRepresentation};
use crate::error::Result;
use crate::model::ExternalWorklog;
use crate::xml::Attributes;

pub fn parse(attrs: &Attributes) -> Result<ExternalWorklog> {
    Ok(ExternalWorklog {
        id: required(kind::WORKLOG, attrs, "id")?.to_string(),
        issue_id: required(kind::WORKLOG, attrs, "issue")?.to_string(),
        author: optional(attrs, "author"),
        body: optional(attrs, "body"),
        created: optional(attrs, "created"),
        time_spent: optional(attrs, "timeworked"),
        group_level: optional(attrs, "grouplevel"),
        role_level: optional(attrs, "rolelevel"),
    })
}

#[must_use]
pub fn representation(worklog: &ExternalWorklog) -> EntityRepresentation {
    let mut values = Attributes::new();
    values.insert("id".to_string(), worklog.id.clone());
    values.insert("issue".to_string(), worklog.issue_id.clone());
    push_optional(&mut values, "author", worklog.author.as_deref());
    push_optional(&mut values, "body", worklog.body.as_deref());
    push_optional(&mut values, "created", worklog.created.as_deref());
    push_optional(&mut values, "timeworked", worklog.time_spent.as_deref());
    push_optional(&mut values, "grouplevel", worklog.group_level.as_deref());
    push_optional(&mut values, "rolelevel", worklog.role_level.as_deref());
    EntityRepresentation::new(kind::WORKLOG, values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_time_worked() {
        let mut attrs = Attributes::new();
        attrs.insert("id".to_string(), "300".to_string());
        attrs.insert("issue".to_string(), "10000".to_string());
        attrs.insert("timeworked".to_string(), "3600".to_string());
        let worklog = parse(&attrs).unwrap();
        assert_eq!(worklog.time_spent.as_deref(), Some("3600"));
        let rep = representation(&worklog);
        assert_eq!(rep.values().get("timeworked").map(String::as_str), Some("3600"));
    }
}
