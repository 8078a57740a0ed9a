//! Rewrites records from the old id space into the target's.
//!
//! Every function returns `None` when a mandatory reference has no
//! mapping, which drops the whole record; optional references are dropped
//! field-wise so the rest of the record survives. Inputs are never
//! mutated.

use crate::mapper::ProjectImportMapper;
use crate::model::{
    ExternalAttachment, ExternalChangeGroup, ExternalChangeItem, ExternalComment,
    ExternalCustomFieldValue, ExternalEntityProperty, ExternalIssue, ExternalIssueLink,
    ExternalLabel, ExternalNodeAssociation, ExternalUserAssociation, ExternalWorklog,
};

fn mapped(mapper: &crate::mapper::SimpleIdMapper, old_id: &str) -> Option<String> {
    mapper.new_id_for(old_id).map(str::to_string)
}

fn user_or_drop(mapper: &ProjectImportMapper, name: Option<String>) -> Option<String> {
    name.filter(|n| mapper.user.mapped_user_key(n).is_some())
}

fn group_or_drop(mapper: &ProjectImportMapper, name: Option<String>) -> Option<String> {
    name.and_then(|n| mapped(&mapper.group, &n))
}

fn role_or_drop(mapper: &ProjectImportMapper, role_id: Option<String>) -> Option<String> {
    role_id.and_then(|id| mapped(&mapper.project_role, &id))
}

/// Project and issue type are mandatory; people and workflow fields drop
/// individually. The issue keeps its backup key.
#[must_use]
pub fn issue(mapper: &ProjectImportMapper, issue: &ExternalIssue) -> Option<ExternalIssue> {
    let project_id = mapped(&mapper.project, &issue.project_id)?;
    let issue_type = mapped(&mapper.issue_type, &issue.issue_type)?;
    Some(ExternalIssue {
        id: issue.id.clone(),
        key: issue.key.clone(),
        project_id,
        issue_type,
        summary: issue.summary.clone(),
        description: issue.description.clone(),
        environment: issue.environment.clone(),
        reporter: user_or_drop(mapper, issue.reporter.clone()),
        assignee: user_or_drop(mapper, issue.assignee.clone()),
        priority: issue.priority.as_deref().and_then(|p| mapped(&mapper.priority, p)),
        status: issue.status.as_deref().and_then(|s| mapper.status.new_id_for(s).map(str::to_string)),
        resolution: issue
            .resolution
            .as_deref()
            .and_then(|r| mapped(&mapper.resolution, r)),
        security_level: issue
            .security_level
            .as_deref()
            .and_then(|l| mapped(&mapper.issue_security_level, l)),
        created: issue.created.clone(),
        updated: issue.updated.clone(),
        due_date: issue.due_date.clone(),
        resolution_date: issue.resolution_date.clone(),
        votes: issue.votes.clone(),
        original_estimate: issue.original_estimate.clone(),
        estimate: issue.estimate.clone(),
        time_spent: issue.time_spent.clone(),
    })
}

#[must_use]
pub fn comment(mapper: &ProjectImportMapper, comment: &ExternalComment) -> Option<ExternalComment> {
    let issue_id = mapped(&mapper.issue, &comment.issue_id)?;
    Some(ExternalComment {
        id: comment.id.clone(),
        issue_id,
        author: user_or_drop(mapper, comment.author.clone()),
        body: comment.body.clone(),
        created: comment.created.clone(),
        group_level: group_or_drop(mapper, comment.group_level.clone()),
        role_level: role_or_drop(mapper, comment.role_level.clone()),
    })
}

#[must_use]
pub fn worklog(mapper: &ProjectImportMapper, worklog: &ExternalWorklog) -> Option<ExternalWorklog> {
    let issue_id = mapped(&mapper.issue, &worklog.issue_id)?;
    Some(ExternalWorklog {
        id: worklog.id.clone(),
        issue_id,
        author: user_or_drop(mapper, worklog.author.clone()),
        body: worklog.body.clone(),
        created: worklog.created.clone(),
        time_spent: worklog.time_spent.clone(),
        group_level: group_or_drop(mapper, worklog.group_level.clone()),
        role_level: role_or_drop(mapper, worklog.role_level.clone()),
    })
}

#[must_use]
pub fn attachment(
    mapper: &ProjectImportMapper,
    attachment: &ExternalAttachment,
) -> Option<ExternalAttachment> {
    let issue_id = mapped(&mapper.issue, &attachment.issue_id)?;
    Some(ExternalAttachment {
        id: attachment.id.clone(),
        issue_id,
        file_name: attachment.file_name.clone(),
        attacher: user_or_drop(mapper, attachment.attacher.clone()),
        created: attachment.created.clone(),
    })
}

/// Both ends and the link type are mandatory; a link whose far side lives
/// outside the imported project drops silently.
#[must_use]
pub fn issue_link(
    mapper: &ProjectImportMapper,
    link: &ExternalIssueLink,
) -> Option<ExternalIssueLink> {
    let link_type_id = mapper
        .issue_link_type
        .new_id_for(&link.link_type_id)?
        .to_string();
    let source_id = mapped(&mapper.issue, link.source_id.as_deref()?)?;
    let destination_id = mapped(&mapper.issue, link.destination_id.as_deref()?)?;
    Some(ExternalIssueLink {
        id: link.id.clone(),
        link_type_id,
        source_id: Some(source_id),
        destination_id: Some(destination_id),
        sequence: link.sequence.clone(),
    })
}

/// Fix/affects-version and component associations; the sink must map.
#[must_use]
pub fn node_association(
    mapper: &ProjectImportMapper,
    association: &ExternalNodeAssociation,
) -> Option<ExternalNodeAssociation> {
    let source_node_id = mapped(&mapper.issue, &association.source_node_id)?;
    let sink_mapper = match association.sink_node_entity.as_str() {
        "Version" => &mapper.version,
        "Component" => &mapper.component,
        _ => return None,
    };
    let sink_node_id = mapped(sink_mapper, &association.sink_node_id)?;
    Some(ExternalNodeAssociation {
        source_node_id,
        source_node_entity: association.source_node_entity.clone(),
        sink_node_id,
        sink_node_entity: association.sink_node_entity.clone(),
        association_type: association.association_type.clone(),
    })
}

/// Votes and watches: the whole record is the user reference, so an
/// unmapped user drops it.
#[must_use]
pub fn user_association(
    mapper: &ProjectImportMapper,
    association: &ExternalUserAssociation,
) -> Option<ExternalUserAssociation> {
    mapper.user.mapped_user_key(&association.source_name)?;
    let sink_node_id = mapped(&mapper.issue, &association.sink_node_id)?;
    Some(ExternalUserAssociation {
        source_name: association.source_name.clone(),
        sink_node_id,
        sink_node_entity: association.sink_node_entity.clone(),
        association_type: association.association_type.clone(),
    })
}

#[must_use]
pub fn change_group(
    mapper: &ProjectImportMapper,
    group: &ExternalChangeGroup,
) -> Option<ExternalChangeGroup> {
    let issue_id = mapped(&mapper.issue, &group.issue_id)?;
    Some(ExternalChangeGroup {
        id: group.id.clone(),
        issue_id,
        author: user_or_drop(mapper, group.author.clone()),
        created: group.created.clone(),
    })
}

/// The owning change group is mandatory; values inside the item are
/// historical text and stay untouched.
#[must_use]
pub fn change_item(
    mapper: &ProjectImportMapper,
    item: &ExternalChangeItem,
) -> Option<ExternalChangeItem> {
    let group_id = mapped(&mapper.change_group, &item.group_id)?;
    Some(ExternalChangeItem {
        id: item.id.clone(),
        group_id,
        field_type: item.field_type.clone(),
        field: item.field.clone(),
        old_value: item.old_value.clone(),
        old_string: item.old_string.clone(),
        new_value: item.new_value.clone(),
        new_string: item.new_string.clone(),
    })
}

/// `option_backed` says the value payload is an option id that must be
/// rewritten; an unmapped option drops the record since the payload is
/// the whole point of it.
#[must_use]
pub fn custom_field_value(
    mapper: &ProjectImportMapper,
    value: &ExternalCustomFieldValue,
    option_backed: bool,
) -> Option<ExternalCustomFieldValue> {
    if mapper.custom_field.is_ignored(&value.custom_field_id) {
        return None;
    }
    let custom_field_id = mapper
        .custom_field
        .new_id_for(&value.custom_field_id)?
        .to_string();
    let issue_id = mapped(&mapper.issue, &value.issue_id)?;
    let mut transformed = ExternalCustomFieldValue {
        id: value.id.clone(),
        custom_field_id,
        issue_id,
        string_value: value.string_value.clone(),
        number_value: value.number_value.clone(),
        date_value: value.date_value.clone(),
        text_value: value.text_value.clone(),
        parent_key: value.parent_key.clone(),
    };
    if option_backed {
        let old_option = value.value()?;
        let new_option = mapper
            .custom_field_option
            .new_id_for(old_option)?
            .to_string();
        // Option payloads live in the string column.
        transformed.string_value = Some(new_option);
        transformed.number_value = None;
        transformed.date_value = None;
        transformed.text_value = None;
        if let Some(parent) = &value.parent_key {
            transformed.parent_key = Some(
                mapper
                    .custom_field_option
                    .new_id_for(parent)?
                    .to_string(),
            );
        }
    }
    Some(transformed)
}

#[must_use]
pub fn entity_property(
    mapper: &ProjectImportMapper,
    property: &ExternalEntityProperty,
) -> Option<ExternalEntityProperty> {
    let entity_id = mapped(&mapper.issue, &property.entity_id)?;
    Some(ExternalEntityProperty {
        id: property.id.clone(),
        entity_name: property.entity_name.clone(),
        entity_id,
        property_key: property.property_key.clone(),
        value: property.value.clone(),
    })
}

#[must_use]
pub fn label(mapper: &ProjectImportMapper, label: &ExternalLabel) -> Option<ExternalLabel> {
    let issue_id = mapped(&mapper.issue, &label.issue_id)?;
    Some(ExternalLabel {
        id: label.id.clone(),
        issue_id,
        label: label.label.clone(),
    })
}
