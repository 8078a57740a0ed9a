//! Change history records: groups and the items inside them.

use super::{kind, optional, push_optional, required, EntityRepresentation};
use crate::error::Result;
use crate::model::{ExternalChangeGroup, ExternalChangeItem};
use crate::xml::Attributes;

pub fn parse_group(attrs: &Attributes) -> Result<ExternalChangeGroup> {
    Ok(ExternalChangeGroup {
        id: required(kind::CHANGE_GROUP, attrs, "id")?.to_string(),
        issue_id: required(kind::CHANGE_GROUP, attrs, "issue")?.to_string(),
        author: optional(attrs, "author"),
        created: optional(attrs, "created"),
    })
}

#[must_use]
pub fn group_representation(group: &ExternalChangeGroup) -> EntityRepresentation {
    let mut values = Attributes::new();
    values.insert("id".to_string(), group.id.clone());
    values.insert("issue".to_string(), group.issue_id.clone());
    push_optional(&mut values, "author", group.author.as_deref());
    push_optional(&mut values, "created", group.created.as_deref());
    EntityRepresentation::new(kind::CHANGE_GROUP, values)
}

pub fn parse_item(attrs: &Attributes) -> Result<ExternalChangeItem> {
    Ok(ExternalChangeItem {
        id: required(kind::CHANGE_ITEM, attrs, "id")?.to_string(),
        group_id: required(kind::CHANGE_ITEM, attrs, "group")?.to_string(),
        field_type: required(kind::CHANGE_ITEM, attrs, "fieldtype")?.to_string(),
        field: required(kind::CHANGE_ITEM, attrs, "field")?.to_string(),
        old_value: optional(attrs, "oldvalue"),
        old_string: optional(attrs, "oldstring"),
        new_value: optional(attrs, "newvalue"),
        new_string: optional(attrs, "newstring"),
    })
}

#[must_use]
pub fn item_representation(item: &ExternalChangeItem) -> EntityRepresentation {
    let mut values = Attributes::new();
    values.insert("id".to_string(), item.id.clone());
    values.insert("group".to_string(), item.group_id.clone());
    values.insert("fieldtype".to_string(), item.field_type.clone());
    values.insert("field".to_string(), item.field.clone());
    push_optional(&mut values, "oldvalue", item.old_value.as_deref());
    push_optional(&mut values, "oldstring", item.old_string.as_deref());
    push_optional(&mut values, "newvalue", item.new_value.as_deref());
    push_optional(&mut values, "newstring", item.new_string.as_deref());
    EntityRepresentation::new(kind::CHANGE_ITEM, values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_item_belongs_to_a_group() {
        let mut attrs = Attributes::new();
        attrs.insert("id".to_string(), "600".to_string());
        attrs.insert("fieldtype".to_string(), "jira".to_string());
        attrs.insert("field".to_string(), "status".to_string());
        assert!(parse_item(&attrs).is_err());
        attrs.insert("group".to_string(), "55".to_string());
        assert_eq!(parse_item(&attrs).unwrap().group_id, "55");
    }
}
