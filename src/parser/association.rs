//! Node and user association records.
//!
//! A node association ties an issue to a version or component; the
//! association type discriminates fix version, affected version, and
//! component. A user association is a vote or a watch on an issue.

use super::{kind, push_optional, required, EntityRepresentation};
use crate::error::Result;
use crate::model::{ExternalNodeAssociation, ExternalUserAssociation};
use crate::xml::Attributes;

pub const FIX_VERSION_TYPE: &str = "IssueFixVersion";
pub const AFFECTS_VERSION_TYPE: &str = "IssueVersion";
pub const COMPONENT_TYPE: &str = "IssueComponent";
pub const VOTE_TYPE: &str = "VoteIssue";
pub const WATCH_TYPE: &str = "WatchIssue";

pub fn parse_node_association(attrs: &Attributes) -> Result<ExternalNodeAssociation> {
    let kind_name = kind::NODE_ASSOCIATION;
    Ok(ExternalNodeAssociation {
        source_node_id: required(kind_name, attrs, "sourceNodeId")?.to_string(),
        source_node_entity: required(kind_name, attrs, "sourceNodeEntity")?.to_string(),
        sink_node_id: required(kind_name, attrs, "sinkNodeId")?.to_string(),
        sink_node_entity: required(kind_name, attrs, "sinkNodeEntity")?.to_string(),
        association_type: required(kind_name, attrs, "associationType")?.to_string(),
    })
}

#[must_use]
pub fn node_association_representation(
    association: &ExternalNodeAssociation,
) -> EntityRepresentation {
    let mut values = Attributes::new();
    values.insert("sourceNodeId".to_string(), association.source_node_id.clone());
    values.insert(
        "sourceNodeEntity".to_string(),
        association.source_node_entity.clone(),
    );
    values.insert("sinkNodeId".to_string(), association.sink_node_id.clone());
    values.insert(
        "sinkNodeEntity".to_string(),
        association.sink_node_entity.clone(),
    );
    values.insert(
        "associationType".to_string(),
        association.association_type.clone(),
    );
    EntityRepresentation::new(kind::NODE_ASSOCIATION, values)
}

pub fn parse_user_association(attrs: &Attributes) -> Result<ExternalUserAssociation> {
    let kind_name = kind::USER_ASSOCIATION;
    Ok(ExternalUserAssociation {
        source_name: required(kind_name, attrs, "sourceName")?.to_string(),
        sink_node_id: required(kind_name, attrs, "sinkNodeId")?.to_string(),
        sink_node_entity: required(kind_name, attrs, "sinkNodeEntity")?.to_string(),
        association_type: required(kind_name, attrs, "associationType")?.to_string(),
    })
}

#[must_use]
pub fn user_association_representation(
    association: &ExternalUserAssociation,
    created: Option<&str>,
) -> EntityRepresentation {
    let mut values = Attributes::new();
    values.insert("sourceName".to_string(), association.source_name.clone());
    values.insert("sinkNodeId".to_string(), association.sink_node_id.clone());
    values.insert(
        "sinkNodeEntity".to_string(),
        association.sink_node_entity.clone(),
    );
    values.insert(
        "associationType".to_string(),
        association.association_type.clone(),
    );
    push_optional(&mut values, "created", created);
    EntityRepresentation::new(kind::USER_ASSOCIATION, values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_association_requires_all_five_fields() {
        let mut attrs = Attributes::new();
        attrs.insert("sourceNodeId".to_string(), "10000".to_string());
        attrs.insert("sourceNodeEntity".to_string(), "Issue".to_string());
        attrs.insert("sinkNodeId".to_string(), "20000".to_string());
        attrs.insert("sinkNodeEntity".to_string(), "Version".to_string());
        assert!(parse_node_association(&attrs).is_err());
        attrs.insert("associationType".to_string(), FIX_VERSION_TYPE.to_string());
        let association = parse_node_association(&attrs).unwrap();
        assert_eq!(association.association_type, FIX_VERSION_TYPE);
    }

    #[test]
    fn user_association_keeps_username() {
        let mut attrs = Attributes::new();
        attrs.insert("sourceName".to_string(), "fred".to_string());
        attrs.insert("sinkNodeId".to_string(), "10000".to_string());
        attrs.insert("sinkNodeEntity".to_string(), "Issue".to_string());
        attrs.insert("associationType".to_string(), VOTE_TYPE.to_string());
        let association = parse_user_association(&attrs).unwrap();
        assert_eq!(association.source_name, "fred");
    }
}
