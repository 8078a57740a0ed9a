//! Issue link records and their link types.

use super::{kind, optional, push_optional, required, EntityRepresentation};
use crate::error::Result;
use crate::model::ExternalIssueLink;
use crate::xml::Attributes;

pub fn parse(attrs: &Attributes) -> Result<ExternalIssueLink> {
    Ok(ExternalIssueLink {
        id: required(kind::ISSUE_LINK, attrs, "id")?.to_string(),
        link_type_id: required(kind::ISSUE_LINK, attrs, "linktype")?.to_string(),
        source_id: optional(attrs, "source"),
        destination_id: optional(attrs, "destination"),
        sequence: optional(attrs, "sequence"),
    })
}

#[must_use]
pub fn representation(link: &ExternalIssueLink) -> EntityRepresentation {
    let mut values = Attributes::new();
    values.insert("id".to_string(), link.id.clone());
    values.insert("linktype".to_string(), link.link_type_id.clone());
    push_optional(&mut values, "source", link.source_id.as_deref());
    push_optional(&mut values, "destination", link.destination_id.as_deref());
    push_optional(&mut values, "sequence", link.sequence.as_deref());
    EntityRepresentation::new(kind::ISSUE_LINK, values)
}

/// One side of a link type row: (id, name, optional style).
pub fn parse_link_type(attrs: &Attributes) -> Result<(String, String, Option<String>)> {
    let id = required(kind::ISSUE_LINK_TYPE, attrs, "id")?.to_string();
    let name = required(kind::ISSUE_LINK_TYPE, attrs, "linkname")?.to_string();
    Ok((id, name, optional(attrs, "style")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_link_with_one_side_missing() {
        let mut attrs = Attributes::new();
        attrs.insert("id".to_string(), "500".to_string());
        attrs.insert("linktype".to_string(), "10".to_string());
        attrs.insert("source".to_string(), "10000".to_string());
        let link = parse(&attrs).unwrap();
        assert_eq!(link.source_id.as_deref(), Some("10000"));
        assert_eq!(link.destination_id, None);
    }

    #[test]
    fn link_type_carries_style() {
        let mut attrs = Attributes::new();
        attrs.insert("id".to_string(), "10".to_string());
        attrs.insert("linkname".to_string(), "Duplicate".to_string());
        attrs.insert("style".to_string(), "jira_subtask".to_string());
        let (id, name, style) = parse_link_type(&attrs).unwrap();
        assert_eq!((id.as_str(), name.as_str()), ("10", "Duplicate"));
        assert_eq!(style.as_deref(), Some("jira_subtask"));
    }
}
