//! Partition pass: filter the full-system backup down to one project.
//!
//! Each handler re-emits the records it owns into an intermediate document
//! when they belong to the scoped project. Nothing here consults the
//! target; inclusion is decided purely from the backup's own ids.
//!
//! Change items are the one wrinkle: their issue membership is indirect
//! through a change group, so the related-entities handler collects
//! in-scope group ids while streaming and routes items to a second
//! document that later passes traverse separately.

use crate::error::Result;
use crate::parser::{self, kind};
use crate::scope::BackupProject;
use crate::xml::writer::PartitionWriter;
use crate::xml::{Attributes, EntityHandler};
use std::collections::HashSet;
use std::io::Write;
use tracing::debug;

/// Handler side of one intermediate document.
struct Partition<W: Write> {
    writer: PartitionWriter<W>,
}

impl<W: Write> Partition<W> {
    fn new(out: W, encoding: &str) -> Self {
        Self {
            writer: PartitionWriter::new(out, encoding),
        }
    }

    fn start(&mut self) -> Result<()> {
        self.writer.start_document()
    }

    fn write(&mut self, kind: &str, attributes: &Attributes) -> Result<()> {
        self.writer.write_record(kind, attributes)
    }

    fn end(&mut self) -> Result<()> {
        self.writer.end_document()
    }

    fn count(&self) -> u64 {
        self.writer.entity_count()
    }
}

/// Writes the scoped project's issues into their own document.
pub struct IssuePartitionHandler<W: Write> {
    partition: Partition<W>,
    project_id: String,
}

impl<W: Write> IssuePartitionHandler<W> {
    pub fn new(project: &BackupProject, out: W, encoding: &str) -> Self {
        Self {
            partition: Partition::new(out, encoding),
            project_id: project.project().id.clone(),
        }
    }

    /// Number of issues written.
    #[must_use]
    pub fn entity_count(&self) -> u64 {
        self.partition.count()
    }
}

impl<W: Write> EntityHandler for IssuePartitionHandler<W> {
    fn start_document(&mut self) -> Result<()> {
        self.partition.start()
    }

    fn handle_entity(&mut self, kind_name: &str, attributes: &Attributes) -> Result<()> {
        if kind_name != kind::ISSUE {
            return Ok(());
        }
        if attributes.get("project").map(String::as_str) == Some(self.project_id.as_str()) {
            self.partition.write(kind_name, attributes)?;
        }
        Ok(())
    }

    fn end_document(&mut self) -> Result<()> {
        self.partition.end()
    }
}

/// How a record kind names the issue (or change group) it belongs to.
enum IssueSide {
    /// Direct attribute holding an old issue id.
    Attribute(&'static str),
    /// `NodeAssociation` rows: sink side must be an Issue source node.
    NodeAssociation,
    /// `UserAssociation` rows: sink entity must be Issue.
    UserAssociation,
    /// `EntityProperty` rows: entity name discriminates.
    EntityProperty,
    /// `ChangeItem` rows resolve through their change group.
    ChangeItem,
}

fn issue_side(kind_name: &str) -> Option<IssueSide> {
    match kind_name {
        kind::COMMENT | kind::WORKLOG | kind::CHANGE_GROUP | kind::LABEL => {
            Some(IssueSide::Attribute("issue"))
        }
        kind::ISSUE_LINK => Some(IssueSide::Attribute("source")),
        kind::NODE_ASSOCIATION => Some(IssueSide::NodeAssociation),
        kind::USER_ASSOCIATION => Some(IssueSide::UserAssociation),
        kind::ENTITY_PROPERTY => Some(IssueSide::EntityProperty),
        kind::CHANGE_ITEM => Some(IssueSide::ChangeItem),
        _ => None,
    }
}

/// Writes every issue-adjacent record of the scoped project: comments,
/// worklogs, links, associations, change history, properties, labels.
///
/// Issue links are included when either side is in scope, so links into
/// other projects survive partitioning and get dropped only at persist
/// time if their far side cannot be mapped.
pub struct IssueRelatedPartitionHandler<'s, W: Write> {
    partition: Partition<W>,
    change_items: Partition<W>,
    project: &'s BackupProject,
    in_scope_change_groups: HashSet<String>,
}

impl<'s, W: Write> IssueRelatedPartitionHandler<'s, W> {
    pub fn new(project: &'s BackupProject, out: W, change_item_out: W, encoding: &str) -> Self {
        Self {
            partition: Partition::new(out, encoding),
            change_items: Partition::new(change_item_out, encoding),
            project,
            in_scope_change_groups: HashSet::new(),
        }
    }

    #[must_use]
    pub fn entity_count(&self) -> u64 {
        self.partition.count()
    }

    #[must_use]
    pub fn change_item_count(&self) -> u64 {
        self.change_items.count()
    }

    fn include(&mut self, kind_name: &str, attributes: &Attributes) -> Result<bool> {
        let Some(side) = issue_side(kind_name) else {
            return Ok(false);
        };
        let included = match side {
            IssueSide::Attribute(_) if kind_name == kind::ISSUE_LINK => {
                let link = parser::link::parse(attributes)?;
                link.source_id
                    .as_deref()
                    .is_some_and(|id| self.project.contains_issue(id))
                    || link
                        .destination_id
                        .as_deref()
                        .is_some_and(|id| self.project.contains_issue(id))
            }
            IssueSide::Attribute(attribute) => attributes
                .get(attribute)
                .is_some_and(|id| self.project.contains_issue(id)),
            IssueSide::NodeAssociation => {
                let association = parser::association::parse_node_association(attributes)?;
                association.source_node_entity == kind::ISSUE
                    && self.project.contains_issue(&association.source_node_id)
            }
            IssueSide::UserAssociation => {
                let association = parser::association::parse_user_association(attributes)?;
                association.sink_node_entity == kind::ISSUE
                    && self.project.contains_issue(&association.sink_node_id)
            }
            IssueSide::EntityProperty => {
                let property = parser::property::parse_property(attributes)?;
                property.entity_name == kind::ISSUE
                    && self.project.contains_issue(&property.entity_id)
            }
            IssueSide::ChangeItem => {
                let item = parser::change::parse_item(attributes)?;
                self.in_scope_change_groups.contains(&item.group_id)
            }
        };
        if included && kind_name == kind::CHANGE_GROUP {
            let group = parser::change::parse_group(attributes)?;
            self.in_scope_change_groups.insert(group.id);
        }
        Ok(included)
    }
}

impl<W: Write> EntityHandler for IssueRelatedPartitionHandler<'_, W> {
    fn start_document(&mut self) -> Result<()> {
        self.partition.start()?;
        self.change_items.start()
    }

    fn handle_entity(&mut self, kind_name: &str, attributes: &Attributes) -> Result<()> {
        if self.include(kind_name, attributes)? {
            if kind_name == kind::CHANGE_ITEM {
                self.change_items.write(kind_name, attributes)?;
            } else {
                self.partition.write(kind_name, attributes)?;
            }
        }
        Ok(())
    }

    fn end_document(&mut self) -> Result<()> {
        debug!(
            related = self.partition.count(),
            change_items = self.change_items.count(),
            "partitioned issue-related records"
        );
        self.partition.end()?;
        self.change_items.end()
    }
}

/// Writes custom field values of in-scope issues.
pub struct CustomFieldValuePartitionHandler<'s, W: Write> {
    partition: Partition<W>,
    project: &'s BackupProject,
}

impl<'s, W: Write> CustomFieldValuePartitionHandler<'s, W> {
    pub fn new(project: &'s BackupProject, out: W, encoding: &str) -> Self {
        Self {
            partition: Partition::new(out, encoding),
            project,
        }
    }

    #[must_use]
    pub fn entity_count(&self) -> u64 {
        self.partition.count()
    }
}

impl<W: Write> EntityHandler for CustomFieldValuePartitionHandler<'_, W> {
    fn start_document(&mut self) -> Result<()> {
        self.partition.start()
    }

    fn handle_entity(&mut self, kind_name: &str, attributes: &Attributes) -> Result<()> {
        if kind_name != kind::CUSTOM_FIELD_VALUE {
            return Ok(());
        }
        if attributes
            .get("issue")
            .is_some_and(|id| self.project.contains_issue(id))
        {
            self.partition.write(kind_name, attributes)?;
        }
        Ok(())
    }

    fn end_document(&mut self) -> Result<()> {
        self.partition.end()
    }
}

/// Writes attachment records of in-scope issues.
pub struct AttachmentPartitionHandler<'s, W: Write> {
    partition: Partition<W>,
    project: &'s BackupProject,
}

impl<'s, W: Write> AttachmentPartitionHandler<'s, W> {
    pub fn new(project: &'s BackupProject, out: W, encoding: &str) -> Self {
        Self {
            partition: Partition::new(out, encoding),
            project,
        }
    }

    #[must_use]
    pub fn entity_count(&self) -> u64 {
        self.partition.count()
    }
}

impl<W: Write> EntityHandler for AttachmentPartitionHandler<'_, W> {
    fn start_document(&mut self) -> Result<()> {
        self.partition.start()
    }

    fn handle_entity(&mut self, kind_name: &str, attributes: &Attributes) -> Result<()> {
        if kind_name != kind::ATTACHMENT {
            return Ok(());
        }
        if attributes
            .get("issue")
            .is_some_and(|id| self.project.contains_issue(id))
        {
            self.partition.write(kind_name, attributes)?;
        }
        Ok(())
    }

    fn end_document(&mut self) -> Result<()> {
        self.partition.end()
    }
}
