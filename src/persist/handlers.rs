//! Persister handlers, one family per partitioned document.
//!
//! Each handler decodes a record on the parse thread, rewrites its ids
//! through the read-only [`ProjectImportMapper`], and hands the target
//! write to the executor. New ids come back through an out-mapper behind
//! a mutex; the caller folds them into the main mapper between passes,
//! never during one.
//!
//! A record whose mandatory reference did not map is skipped without an
//! error: validation already reported whatever was reportable, and the
//! remaining gaps are records outside the import scope.

use crate::mapper::{ProjectImportMapper, SimpleIdMapper};
use crate::model::ExternalAttachment;
use crate::parser::{self, EntityRepresentation, kind};
use crate::persist::{Executor, ProjectImportResults, transform};
use crate::scope::BackupSystemInformation;
use crate::storage::ImportTarget;
use crate::xml::{Attributes, EntityHandler};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

use crate::error::Result;

/// Everything a persister needs besides its own out-mapper.
pub struct PersisterContext<'a> {
    pub mapper: &'a ProjectImportMapper,
    pub system_information: &'a BackupSystemInformation,
    pub target: Arc<dyn ImportTarget>,
    pub results: Arc<ProjectImportResults>,
    pub executor: &'a dyn Executor,
}

/// New ids produced by one pass, folded back into the main mapper after
/// the executor drains.
pub type OutMapper = Arc<Mutex<SimpleIdMapper>>;

fn register(out: &OutMapper, old_id: String, new_id: String) {
    out.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .map_value(old_id, new_id);
}

fn save_error(what: &str, natural_key: &str, issue_key: &str) -> String {
    format!("There was a problem saving {what} '{natural_key}' for issue '{issue_key}'.")
}

impl PersisterContext<'_> {
    /// The backup key of the issue an old id points at, for messages.
    fn issue_key(&self, old_issue_id: &str) -> String {
        self.system_information
            .issue_key_for_id(old_issue_id)
            .unwrap_or(old_issue_id)
            .to_string()
    }

    /// Queue one target write. Skips submission once the run is aborted.
    fn persist_entity(
        &self,
        representation: EntityRepresentation,
        counted_kind: &'static str,
        error_message: String,
        out: Option<(OutMapper, String)>,
    ) {
        if self.results.is_aborted() {
            return;
        }
        let target = Arc::clone(&self.target);
        let results = Arc::clone(&self.results);
        self.executor.execute(Box::new(move || {
            match target.create_entity(&representation) {
                Ok(Some(new_id)) => {
                    if let Some((mapper, old_id)) = out {
                        register(&mapper, old_id, new_id);
                    }
                    results.increment_created(counted_kind);
                }
                Ok(None) => results.add_error(error_message),
                Err(err) => {
                    warn!(%err, entity = representation.entity_name(), "target write failed");
                    results.add_error(error_message);
                }
            }
        }));
    }
}

static ISSUE_KEY_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-(\d+)$").expect("issue key pattern to compile"));

/// Creates issues and tracks the highest issue number seen, which caps
/// the target project's counter after the pass.
pub struct IssuePersisterHandler<'a> {
    context: PersisterContext<'a>,
    out: OutMapper,
    largest_key_number: u64,
}

impl<'a> IssuePersisterHandler<'a> {
    #[must_use]
    pub fn new(context: PersisterContext<'a>, out: OutMapper) -> Self {
        Self {
            context,
            out,
            largest_key_number: 0,
        }
    }

    /// Highest numeric suffix among the keys of the issues traversed.
    #[must_use]
    pub fn largest_issue_key_number(&self) -> u64 {
        self.largest_key_number
    }
}

impl EntityHandler for IssuePersisterHandler<'_> {
    fn handle_entity(&mut self, entity_kind: &str, attributes: &Attributes) -> Result<()> {
        if entity_kind != kind::ISSUE {
            return Ok(());
        }
        let issue = parser::issue::parse(attributes)?;
        if let Some(number) = ISSUE_KEY_NUMBER
            .captures(&issue.key)
            .and_then(|captures| captures.get(1))
            .and_then(|number| number.as_str().parse::<u64>().ok())
        {
            self.largest_key_number = self.largest_key_number.max(number);
        }

        let Some(transformed) = transform::issue(self.context.mapper, &issue) else {
            debug!(issue = %issue.key, "issue does not map into the target, skipped");
            return Ok(());
        };
        if self.context.results.is_aborted() {
            return Ok(());
        }

        let target = Arc::clone(&self.context.target);
        let results = Arc::clone(&self.context.results);
        let out = Arc::clone(&self.out);
        let old_id = issue.id.clone();
        self.context.executor.execute(Box::new(move || {
            let key = transformed.key.clone();
            match target.create_issue(&transformed) {
                Ok(Some(new_id)) => {
                    register(&out, old_id, new_id);
                    results.increment_created(kind::ISSUE);
                }
                Ok(None) => {
                    results.add_error(format!("There was a problem saving issue '{key}'."));
                }
                Err(err) => {
                    warn!(%err, issue = %key, "target write failed");
                    results.add_error(format!("There was a problem saving issue '{key}'."));
                }
            }
        }));
        Ok(())
    }
}

/// Creates everything from the related-entities partition: comments,
/// worklogs, links, version and component associations, votes and
/// watches, properties, labels and change groups.
pub struct RelatedEntitiesPersisterHandler<'a> {
    context: PersisterContext<'a>,
    comment_out: OutMapper,
    issue_link_out: OutMapper,
    change_group_out: OutMapper,
}

impl<'a> RelatedEntitiesPersisterHandler<'a> {
    #[must_use]
    pub fn new(
        context: PersisterContext<'a>,
        comment_out: OutMapper,
        issue_link_out: OutMapper,
        change_group_out: OutMapper,
    ) -> Self {
        Self {
            context,
            comment_out,
            issue_link_out,
            change_group_out,
        }
    }
}

impl EntityHandler for RelatedEntitiesPersisterHandler<'_> {
    #[allow(clippy::too_many_lines)]
    fn handle_entity(&mut self, entity_kind: &str, attributes: &Attributes) -> Result<()> {
        let context = &self.context;
        match entity_kind {
            kind::COMMENT => {
                let Some(comment) = parser::comment::parse(attributes)? else {
                    return Ok(());
                };
                let Some(transformed) = transform::comment(context.mapper, &comment) else {
                    return Ok(());
                };
                context.persist_entity(
                    parser::comment::representation(&transformed),
                    kind::COMMENT,
                    save_error("comment", &comment.id, &context.issue_key(&comment.issue_id)),
                    Some((Arc::clone(&self.comment_out), comment.id)),
                );
            }
            kind::WORKLOG => {
                let worklog = parser::worklog::parse(attributes)?;
                let Some(transformed) = transform::worklog(context.mapper, &worklog) else {
                    return Ok(());
                };
                context.persist_entity(
                    parser::worklog::representation(&transformed),
                    kind::WORKLOG,
                    save_error("worklog", &worklog.id, &context.issue_key(&worklog.issue_id)),
                    None,
                );
            }
            kind::ISSUE_LINK => {
                let link = parser::link::parse(attributes)?;
                let Some(transformed) = transform::issue_link(context.mapper, &link) else {
                    return Ok(());
                };
                let issue_key = link
                    .source_id
                    .as_deref()
                    .map_or_else(String::new, |id| context.issue_key(id));
                context.persist_entity(
                    parser::link::representation(&transformed),
                    kind::ISSUE_LINK,
                    save_error("issue link", &link.id, &issue_key),
                    Some((Arc::clone(&self.issue_link_out), link.id)),
                );
            }
            kind::NODE_ASSOCIATION => {
                let association = parser::association::parse_node_association(attributes)?;
                let Some(transformed) = transform::node_association(context.mapper, &association)
                else {
                    return Ok(());
                };
                context.persist_entity(
                    parser::association::node_association_representation(&transformed),
                    kind::NODE_ASSOCIATION,
                    save_error(
                        "association",
                        &association.association_type,
                        &context.issue_key(&association.source_node_id),
                    ),
                    None,
                );
            }
            kind::USER_ASSOCIATION => {
                let association = parser::association::parse_user_association(attributes)?;
                let created = attributes.get("created").map(String::as_str);
                let Some(transformed) = transform::user_association(context.mapper, &association)
                else {
                    return Ok(());
                };
                context.persist_entity(
                    parser::association::user_association_representation(&transformed, created),
                    kind::USER_ASSOCIATION,
                    save_error(
                        "association",
                        &association.source_name,
                        &context.issue_key(&association.sink_node_id),
                    ),
                    None,
                );
            }
            kind::ENTITY_PROPERTY => {
                let property = parser::property::parse_property(attributes)?;
                let Some(transformed) = transform::entity_property(context.mapper, &property)
                else {
                    return Ok(());
                };
                context.persist_entity(
                    parser::property::property_representation(&transformed),
                    kind::ENTITY_PROPERTY,
                    save_error(
                        "property",
                        &property.property_key,
                        &context.issue_key(&property.entity_id),
                    ),
                    None,
                );
            }
            kind::LABEL => {
                let label = parser::property::parse_label(attributes)?;
                let Some(transformed) = transform::label(context.mapper, &label) else {
                    return Ok(());
                };
                context.persist_entity(
                    parser::property::label_representation(&transformed),
                    kind::LABEL,
                    save_error("label", &label.label, &context.issue_key(&label.issue_id)),
                    None,
                );
            }
            kind::CHANGE_GROUP => {
                let group = parser::change::parse_group(attributes)?;
                let Some(transformed) = transform::change_group(context.mapper, &group) else {
                    return Ok(());
                };
                context.persist_entity(
                    parser::change::group_representation(&transformed),
                    kind::CHANGE_GROUP,
                    save_error(
                        "change group",
                        &group.id,
                        &context.issue_key(&group.issue_id),
                    ),
                    Some((Arc::clone(&self.change_group_out), group.id)),
                );
            }
            _ => {}
        }
        Ok(())
    }
}

/// Creates change items. Runs after the change groups of the related pass
/// have been folded into the mapper.
pub struct ChangeItemPersisterHandler<'a> {
    context: PersisterContext<'a>,
}

impl<'a> ChangeItemPersisterHandler<'a> {
    #[must_use]
    pub fn new(context: PersisterContext<'a>) -> Self {
        Self { context }
    }
}

impl EntityHandler for ChangeItemPersisterHandler<'_> {
    fn handle_entity(&mut self, entity_kind: &str, attributes: &Attributes) -> Result<()> {
        if entity_kind != kind::CHANGE_ITEM {
            return Ok(());
        }
        let item = parser::change::parse_item(attributes)?;
        let Some(transformed) = transform::change_item(self.context.mapper, &item) else {
            return Ok(());
        };
        self.context.persist_entity(
            parser::change::item_representation(&transformed),
            kind::CHANGE_ITEM,
            format!(
                "There was a problem saving change item '{}' for change group '{}'.",
                item.field, item.group_id
            ),
            None,
        );
        Ok(())
    }
}

/// Creates custom field values, rewriting option payloads for the fields
/// whose type stores option ids.
pub struct CustomFieldValuePersisterHandler<'a> {
    context: PersisterContext<'a>,
    out: OutMapper,
    option_backed_fields: HashSet<String>,
}

impl<'a> CustomFieldValuePersisterHandler<'a> {
    /// `option_backed_fields` holds the old ids of the fields whose value
    /// payload is an option id.
    #[must_use]
    pub fn new(
        context: PersisterContext<'a>,
        out: OutMapper,
        option_backed_fields: HashSet<String>,
    ) -> Self {
        Self {
            context,
            out,
            option_backed_fields,
        }
    }
}

impl EntityHandler for CustomFieldValuePersisterHandler<'_> {
    fn handle_entity(&mut self, entity_kind: &str, attributes: &Attributes) -> Result<()> {
        if entity_kind != kind::CUSTOM_FIELD_VALUE {
            return Ok(());
        }
        let value = parser::custom_field::parse_value(attributes)?;
        let option_backed = self.option_backed_fields.contains(&value.custom_field_id);
        let Some(transformed) =
            transform::custom_field_value(self.context.mapper, &value, option_backed)
        else {
            return Ok(());
        };
        let field_name = self
            .context
            .mapper
            .custom_field
            .display_name(&value.custom_field_id);
        self.context.persist_entity(
            parser::custom_field::value_representation(&transformed),
            kind::CUSTOM_FIELD_VALUE,
            save_error(
                "custom field value",
                &field_name,
                &self.context.issue_key(&value.issue_id),
            ),
            Some((Arc::clone(&self.out), value.id)),
        );
        Ok(())
    }
}

/// Creates attachment records and hands the on-disk file to the target.
///
/// Files the validation pass already reported missing are skipped here
/// without another error.
pub struct AttachmentPersisterHandler<'a> {
    context: PersisterContext<'a>,
    out: OutMapper,
    attachment_path: PathBuf,
    project_key: String,
}

impl<'a> AttachmentPersisterHandler<'a> {
    #[must_use]
    pub fn new(
        context: PersisterContext<'a>,
        out: OutMapper,
        attachment_path: PathBuf,
        project_key: impl Into<String>,
    ) -> Self {
        Self {
            context,
            out,
            attachment_path,
            project_key: project_key.into(),
        }
    }

    fn source_path(&self, attachment: &ExternalAttachment, issue_key: &str) -> PathBuf {
        parser::attachment::file_path(&self.attachment_path, &self.project_key, issue_key, attachment)
    }
}

impl EntityHandler for AttachmentPersisterHandler<'_> {
    fn handle_entity(&mut self, entity_kind: &str, attributes: &Attributes) -> Result<()> {
        if entity_kind != kind::ATTACHMENT {
            return Ok(());
        }
        let attachment = parser::attachment::parse(attributes)?;
        let issue_key = self.context.issue_key(&attachment.issue_id);
        let Some(transformed) = transform::attachment(self.context.mapper, &attachment) else {
            return Ok(());
        };
        let source = self.source_path(&attachment, &issue_key);
        if !source.is_file() {
            debug!(path = %source.display(), "attachment file absent, record skipped");
            return Ok(());
        }
        if self.context.results.is_aborted() {
            return Ok(());
        }

        let target = Arc::clone(&self.context.target);
        let results = Arc::clone(&self.context.results);
        let out = Arc::clone(&self.out);
        let old_id = attachment.id.clone();
        let error_message = save_error("attachment", &attachment.file_name, &issue_key);
        self.context.executor.execute(Box::new(move || {
            match target.create_attachment(&transformed, &source) {
                Ok(Some(new_id)) => {
                    register(&out, old_id, new_id);
                    results.increment_created(kind::ATTACHMENT);
                }
                Ok(None) => results.add_error(error_message),
                Err(err) => {
                    warn!(%err, path = %source.display(), "target write failed");
                    results.add_error(error_message);
                }
            }
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::InlineExecutor;
    use crate::storage::sqlite::SqliteTarget;

    fn scoped_system_information() -> BackupSystemInformation {
        let mut info = BackupSystemInformation::new(None, 0);
        info.register_issue_key("10000", "MKY-1");
        info
    }

    fn mapped_mapper(target: &SqliteTarget) -> (ProjectImportMapper, String) {
        let mut mapper = ProjectImportMapper::new();
        let new_project_id = target
            .create_project(&crate::model::ExternalProject {
                id: "10001".to_string(),
                key: "MKY".to_string(),
                name: "Monkey".to_string(),
                ..crate::model::ExternalProject::default()
            })
            .unwrap()
            .unwrap();
        mapper.project.map_value("10001", new_project_id.clone());
        mapper.issue_type.map_value("1", "1");
        (mapper, new_project_id)
    }

    #[test]
    fn issue_persister_creates_maps_and_tracks_counter() {
        let target = SqliteTarget::open_memory().unwrap();
        let (mapper, _) = mapped_mapper(&target);
        let info = scoped_system_information();
        let target: Arc<dyn ImportTarget> = Arc::new(target);
        let results = Arc::new(ProjectImportResults::new(0));
        let executor = InlineExecutor;
        let out: OutMapper = Arc::default();

        let mut handler = IssuePersisterHandler::new(
            PersisterContext {
                mapper: &mapper,
                system_information: &info,
                target: Arc::clone(&target),
                results: Arc::clone(&results),
                executor: &executor,
            },
            Arc::clone(&out),
        );

        let mut attributes = Attributes::new();
        attributes.insert("id".to_string(), "10000".to_string());
        attributes.insert("key".to_string(), "MKY-7".to_string());
        attributes.insert("project".to_string(), "10001".to_string());
        attributes.insert("type".to_string(), "1".to_string());
        attributes.insert("summary".to_string(), "carry on".to_string());
        handler.handle_entity(kind::ISSUE, &attributes).unwrap();

        assert_eq!(handler.largest_issue_key_number(), 7);
        assert_eq!(results.created_count(kind::ISSUE), 1);
        assert!(results.errors().is_empty());
        let out = out.lock().unwrap();
        assert!(out.new_id_for("10000").is_some());
    }

    #[test]
    fn unmapped_issue_is_skipped_without_an_error() {
        let target = SqliteTarget::open_memory().unwrap();
        let info = scoped_system_information();
        let mapper = ProjectImportMapper::new();
        let target: Arc<dyn ImportTarget> = Arc::new(target);
        let results = Arc::new(ProjectImportResults::new(0));
        let executor = InlineExecutor;

        let mut handler = IssuePersisterHandler::new(
            PersisterContext {
                mapper: &mapper,
                system_information: &info,
                target,
                results: Arc::clone(&results),
                executor: &executor,
            },
            Arc::default(),
        );

        let mut attributes = Attributes::new();
        attributes.insert("id".to_string(), "10000".to_string());
        attributes.insert("key".to_string(), "MKY-1".to_string());
        attributes.insert("project".to_string(), "10001".to_string());
        attributes.insert("type".to_string(), "1".to_string());
        handler.handle_entity(kind::ISSUE, &attributes).unwrap();

        assert_eq!(results.created_count(kind::ISSUE), 0);
        assert!(results.errors().is_empty());
    }

    #[test]
    fn comment_persister_registers_new_id_and_worklog_needs_its_issue() {
        let target = SqliteTarget::open_memory().unwrap();
        let (mut mapper, _) = mapped_mapper(&target);
        mapper.issue.map_value("10000", "20000");
        let info = scoped_system_information();
        let target: Arc<dyn ImportTarget> = Arc::new(target);
        let results = Arc::new(ProjectImportResults::new(0));
        let executor = InlineExecutor;
        let comment_out: OutMapper = Arc::default();

        let mut handler = RelatedEntitiesPersisterHandler::new(
            PersisterContext {
                mapper: &mapper,
                system_information: &info,
                target: Arc::clone(&target),
                results: Arc::clone(&results),
                executor: &executor,
            },
            Arc::clone(&comment_out),
            Arc::default(),
            Arc::default(),
        );

        let mut comment = Attributes::new();
        comment.insert("id".to_string(), "200".to_string());
        comment.insert("issue".to_string(), "10000".to_string());
        comment.insert("type".to_string(), "comment".to_string());
        comment.insert("body".to_string(), "first".to_string());
        handler.handle_entity(kind::COMMENT, &comment).unwrap();

        // This worklog's issue is outside the mapped scope.
        let mut worklog = Attributes::new();
        worklog.insert("id".to_string(), "300".to_string());
        worklog.insert("issue".to_string(), "99999".to_string());
        handler.handle_entity(kind::WORKLOG, &worklog).unwrap();

        assert_eq!(results.created_count(kind::COMMENT), 1);
        assert_eq!(results.created_count(kind::WORKLOG), 0);
        assert!(results.errors().is_empty());
        assert!(comment_out.lock().unwrap().new_id_for("200").is_some());
    }

    #[test]
    fn option_backed_value_is_rewritten_before_the_target_sees_it() {
        let target = SqliteTarget::open_memory().unwrap();
        let (mut mapper, _) = mapped_mapper(&target);
        mapper.issue.map_value("10000", "20000");
        mapper.custom_field.map_value("10010", "40");
        mapper.custom_field_option.map_value("7", "77");
        let info = scoped_system_information();
        let target: Arc<dyn ImportTarget> = Arc::new(target);
        let results = Arc::new(ProjectImportResults::new(0));
        let executor = InlineExecutor;

        let mut handler = CustomFieldValuePersisterHandler::new(
            PersisterContext {
                mapper: &mapper,
                system_information: &info,
                target: Arc::clone(&target),
                results: Arc::clone(&results),
                executor: &executor,
            },
            Arc::default(),
            HashSet::from(["10010".to_string()]),
        );

        let mut value = Attributes::new();
        value.insert("id".to_string(), "1".to_string());
        value.insert("customfield".to_string(), "10010".to_string());
        value.insert("issue".to_string(), "10000".to_string());
        value.insert("stringvalue".to_string(), "7".to_string());
        handler.handle_entity(kind::CUSTOM_FIELD_VALUE, &value).unwrap();

        // An unmapped option drops the record entirely.
        let mut orphan = Attributes::new();
        orphan.insert("id".to_string(), "2".to_string());
        orphan.insert("customfield".to_string(), "10010".to_string());
        orphan.insert("issue".to_string(), "10000".to_string());
        orphan.insert("stringvalue".to_string(), "999".to_string());
        handler.handle_entity(kind::CUSTOM_FIELD_VALUE, &orphan).unwrap();

        assert_eq!(results.created_count(kind::CUSTOM_FIELD_VALUE), 1);
    }

    #[test]
    fn aborted_run_stops_submitting_work() {
        let target = SqliteTarget::open_memory().unwrap();
        let (mut mapper, _) = mapped_mapper(&target);
        mapper.issue.map_value("10000", "20000");
        let info = scoped_system_information();
        let target: Arc<dyn ImportTarget> = Arc::new(target);
        let results = Arc::new(ProjectImportResults::new(0));
        results.abort();
        let executor = InlineExecutor;

        let mut handler = RelatedEntitiesPersisterHandler::new(
            PersisterContext {
                mapper: &mapper,
                system_information: &info,
                target,
                results: Arc::clone(&results),
                executor: &executor,
            },
            Arc::default(),
            Arc::default(),
            Arc::default(),
        );

        let mut comment = Attributes::new();
        comment.insert("id".to_string(), "200".to_string());
        comment.insert("issue".to_string(), "10000".to_string());
        comment.insert("type".to_string(), "comment".to_string());
        handler.handle_entity(kind::COMMENT, &comment).unwrap();

        assert_eq!(results.created_count(kind::COMMENT), 0);
    }
}
