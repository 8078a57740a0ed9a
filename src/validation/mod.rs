//! Validation pass: decide whether the completed mappings are satisfiable
//! before anything is written.
//!
//! Mapper validators inspect finished mapper state. The streaming
//! validators re-traverse partitioned documents for checks that need the
//! records themselves (custom field values, attachment files). All
//! findings land in ordered, deduplicated [`MessageSet`]s; validation
//! never mutates the target.

use crate::error::Result;
use crate::mapper::{
    CustomFieldMapper, CustomFieldOptionMapper, IssueLinkTypeMapper, SimpleIdMapper, StatusMapper,
    UserMapper,
};
use crate::parser::{self, kind};
use crate::scope::BackupSystemInformation;
use crate::storage::ImportTarget;
use crate::xml::{Attributes, EntityHandler};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Ordered, deduplicated validation findings. Errors block the import;
/// warnings describe data that will be dropped or synthesized.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct MessageSet {
    errors: indexmap::IndexSet<String>,
    warnings: indexmap::IndexSet<String>,
}

impl MessageSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.insert(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.insert(message.into());
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn errors(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().map(String::as_str)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.warnings.iter().map(String::as_str)
    }

    /// Fold another set into this one, keeping first-seen order.
    pub fn merge(&mut self, other: MessageSet) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

/// Validation findings grouped by entity family, in the order the
/// families were checked.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MappingResult {
    families: indexmap::IndexMap<String, MessageSet>,
}

impl MappingResult {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one family's findings, merging if the family was already
    /// reported.
    pub fn add_family(&mut self, family: impl Into<String>, messages: MessageSet) {
        self.families
            .entry(family.into())
            .or_default()
            .merge(messages);
    }

    #[must_use]
    pub fn family(&self, family: &str) -> Option<&MessageSet> {
        self.families.get(family)
    }

    pub fn families(&self) -> impl Iterator<Item = (&str, &MessageSet)> {
        self.families
            .iter()
            .map(|(family, messages)| (family.as_str(), messages))
    }

    /// The import may proceed only when no family reported an error.
    #[must_use]
    pub fn can_import(&self) -> bool {
        self.families.values().all(|m| !m.has_errors())
    }

    pub fn errors(&self) -> impl Iterator<Item = &str> {
        self.families.values().flat_map(MessageSet::errors)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.families.values().flat_map(MessageSet::warnings)
    }
}

/// Every required id must be mapped; anything else is unsatisfiable for
/// kinds whose references cannot be dropped.
#[must_use]
pub fn validate_required(mapper: &SimpleIdMapper, what: &str) -> MessageSet {
    let mut messages = MessageSet::new();
    for old_id in mapper.required_old_ids() {
        if !mapper.is_mapped(old_id) {
            messages.add_error(format!(
                "The {what} '{}' is required for the import but does not exist in the \
                 target system.",
                mapper.display_name(old_id)
            ));
        }
    }
    messages
}

/// Like [`validate_required`] but produces warnings: references to these
/// ids are dropped field-wise rather than blocking the import.
#[must_use]
pub fn validate_optional(mapper: &SimpleIdMapper, what: &str) -> MessageSet {
    let mut messages = MessageSet::new();
    for old_id in mapper.required_old_ids() {
        if !mapper.is_mapped(old_id) {
            messages.add_warning(format!(
                "The {what} '{}' does not exist in the target system. References to it \
                 will not be imported.",
                mapper.display_name(old_id)
            ));
        }
    }
    messages
}

#[must_use]
pub fn validate_statuses(mapper: &StatusMapper, issue_type_mapper: &SimpleIdMapper) -> MessageSet {
    let mut messages = MessageSet::new();
    for old_id in mapper.required_old_ids() {
        if mapper.is_mapped(old_id) {
            continue;
        }
        let issue_types: Vec<String> = mapper
            .issue_types_requiring(old_id)
            .map(|t| issue_type_mapper.display_name(t))
            .collect();
        messages.add_error(format!(
            "The status '{}' is in use by issues of type '{}' but is not valid for them \
             in the target system.",
            mapper.display_name(old_id),
            issue_types.join("', '")
        ));
    }
    messages
}

#[must_use]
pub fn validate_link_types(mapper: &IssueLinkTypeMapper) -> MessageSet {
    let mut messages = MessageSet::new();
    for old_id in mapper.required_old_ids() {
        if mapper.new_id_for(old_id).is_none() {
            messages.add_error(format!(
                "The link type '{}' is required for the import but the target system has \
                 no link type with the same name and style.",
                mapper.display_name(old_id)
            ));
        }
    }
    messages
}

/// Users split three ways: mapped accounts are fine, registered-but-missing
/// accounts can be auto-created from their backup details, and unregistered
/// mandatory accounts block the import.
#[must_use]
pub fn validate_users(mapper: &UserMapper) -> MessageSet {
    let mut messages = MessageSet::new();
    for name in mapper.unregistered_mandatory_users() {
        messages.add_error(format!(
            "The user '{name}' is required for the import but does not exist in the \
             target system and the backup carries no details to create it from."
        ));
    }
    for user in mapper.users_to_auto_create() {
        messages.add_warning(format!(
            "The user '{}' will be automatically created from backup details.",
            user.name
        ));
    }
    messages
}

#[must_use]
pub fn validate_custom_fields(mapper: &CustomFieldMapper) -> MessageSet {
    let mut messages = MessageSet::new();
    for old_id in mapper.required_old_ids() {
        if mapper.is_ignored(old_id) {
            messages.add_warning(format!(
                "The custom field '{}' has no configuration for the project in the backup. \
                 Its values will not be imported.",
                mapper.display_name(old_id)
            ));
        } else if !mapper.is_mapped(old_id) {
            messages.add_error(format!(
                "The custom field '{}' is required for the import but the target system \
                 has no matching field of the same name and type.",
                mapper.display_name(old_id)
            ));
        }
    }
    messages
}

#[must_use]
pub fn validate_custom_field_options(
    options: &CustomFieldOptionMapper,
    custom_fields: &CustomFieldMapper,
) -> MessageSet {
    let mut messages = MessageSet::new();
    for old_id in options.required_old_ids() {
        if options.new_id_for(old_id).is_some() {
            continue;
        }
        // Options of unmapped or ignored fields are already reported at
        // field granularity.
        let field = options
            .option(old_id)
            .map(|option| option.custom_field_id.clone());
        let reportable = field.as_deref().is_none_or(|field_id| {
            custom_fields.is_mapped(field_id) && !custom_fields.is_ignored(field_id)
        });
        if reportable {
            messages.add_warning(format!(
                "The custom field option '{}' does not exist in the target system. Values \
                 carrying it will not be imported.",
                options.display_name(old_id)
            ));
        }
    }
    messages
}

/// Checks each custom field value against the target's field configuration
/// for the issue's type. The per-(field, issue type) target lookup is
/// memoized; partitions routinely carry thousands of values over a handful
/// of field and type combinations.
pub struct CustomFieldValueValidatorHandler<'m> {
    custom_fields: &'m CustomFieldMapper,
    issue_types: &'m SimpleIdMapper,
    target: &'m dyn ImportTarget,
    cache: HashMap<(String, String), bool>,
    messages: MessageSet,
}

impl<'m> CustomFieldValueValidatorHandler<'m> {
    pub fn new(
        custom_fields: &'m CustomFieldMapper,
        issue_types: &'m SimpleIdMapper,
        target: &'m dyn ImportTarget,
    ) -> Self {
        Self {
            custom_fields,
            issue_types,
            target,
            cache: HashMap::new(),
            messages: MessageSet::new(),
        }
    }

    #[must_use]
    pub fn message_set(&self) -> &MessageSet {
        &self.messages
    }

    #[must_use]
    pub fn into_message_set(self) -> MessageSet {
        self.messages
    }

    fn valid_for(&mut self, new_field_id: &str, new_issue_type_id: &str) -> Result<bool> {
        let key = (new_field_id.to_string(), new_issue_type_id.to_string());
        if let Some(&cached) = self.cache.get(&key) {
            return Ok(cached);
        }
        let valid = self
            .target
            .custom_field_valid_for_issue_type(new_field_id, new_issue_type_id)?;
        self.cache.insert(key, valid);
        Ok(valid)
    }
}

impl EntityHandler for CustomFieldValueValidatorHandler<'_> {
    fn handle_entity(&mut self, kind_name: &str, attributes: &Attributes) -> Result<()> {
        if kind_name != kind::CUSTOM_FIELD_VALUE {
            return Ok(());
        }
        let value = parser::custom_field::parse_value(attributes)?;
        if self.custom_fields.is_ignored(&value.custom_field_id) {
            return Ok(());
        }
        // An unmapped field is the field validator's finding.
        let Some(new_field_id) = self.custom_fields.new_id_for(&value.custom_field_id) else {
            return Ok(());
        };
        let Some(old_issue_type) = self
            .custom_fields
            .issue_type_for_issue(&value.issue_id)
            .map(str::to_string)
        else {
            return Ok(());
        };
        let Some(new_issue_type) = self.issue_types.new_id_for(&old_issue_type) else {
            return Ok(());
        };
        let (new_field_id, new_issue_type) =
            (new_field_id.to_string(), new_issue_type.to_string());
        if !self.valid_for(&new_field_id, &new_issue_type)? {
            self.messages.add_error(format!(
                "The custom field '{}' is not available for issues of type '{}' in the \
                 target project.",
                self.custom_fields.display_name(&value.custom_field_id),
                self.issue_types.display_name(&old_issue_type)
            ));
        }
        Ok(())
    }
}

/// Warnings stop accumulating per file after this many; one summary
/// warning stands in for the rest.
pub const MAX_MISSING_FILE_WARNINGS: usize = 20;

/// Checks that each attachment record has its file on disk under
/// `<attachment path>/<PROJECT KEY>/<ISSUE KEY>/<attachment id>`.
pub struct AttachmentFileValidatorHandler<'m> {
    attachment_path: PathBuf,
    project_key: String,
    system_information: &'m BackupSystemInformation,
    project_directory_missing: bool,
    missing_files: usize,
    messages: MessageSet,
}

impl<'m> AttachmentFileValidatorHandler<'m> {
    pub fn new(
        attachment_path: &Path,
        project_key: impl Into<String>,
        system_information: &'m BackupSystemInformation,
    ) -> Self {
        Self {
            attachment_path: attachment_path.to_path_buf(),
            project_key: project_key.into(),
            system_information,
            project_directory_missing: false,
            missing_files: 0,
            messages: MessageSet::new(),
        }
    }

    #[must_use]
    pub fn message_set(&self) -> &MessageSet {
        &self.messages
    }

    #[must_use]
    pub fn into_message_set(self) -> MessageSet {
        self.messages
    }
}

impl EntityHandler for AttachmentFileValidatorHandler<'_> {
    fn start_document(&mut self) -> Result<()> {
        let project_directory = self.attachment_path.join(&self.project_key);
        if !project_directory.is_dir() {
            self.project_directory_missing = true;
            warn!(directory = %project_directory.display(), "attachment directory missing");
            self.messages.add_warning(format!(
                "The project attachment directory '{}' does not exist. No attachments will \
                 be imported.",
                project_directory.display()
            ));
        }
        Ok(())
    }

    fn handle_entity(&mut self, kind_name: &str, attributes: &Attributes) -> Result<()> {
        if kind_name != kind::ATTACHMENT || self.project_directory_missing {
            return Ok(());
        }
        let attachment = parser::attachment::parse(attributes)?;
        let Some(issue_key) = self.system_information.issue_key_for_id(&attachment.issue_id) else {
            return Ok(());
        };
        let path = parser::attachment::file_path(
            &self.attachment_path,
            &self.project_key,
            issue_key,
            &attachment,
        );
        if path.is_file() {
            return Ok(());
        }
        self.missing_files += 1;
        match self.missing_files.cmp(&MAX_MISSING_FILE_WARNINGS) {
            std::cmp::Ordering::Less | std::cmp::Ordering::Equal => {
                self.messages.add_warning(format!(
                    "The attachment '{}' does not exist at '{}'. It will not be imported.",
                    attachment.file_name,
                    path.display()
                ));
            }
            std::cmp::Ordering::Greater => {
                self.messages.add_warning(
                    "There are more than twenty missing attachment files. Only the first \
                     twenty are listed; further missing attachments will not be imported."
                        .to_string(),
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteTarget;

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn message_set_deduplicates_and_keeps_order() {
        let mut messages = MessageSet::new();
        messages.add_error("b");
        messages.add_error("a");
        messages.add_error("b");
        let errors: Vec<&str> = messages.errors().collect();
        assert_eq!(errors, vec!["b", "a"]);
    }

    #[test]
    fn required_unmapped_value_is_an_error() {
        let mut mapper = SimpleIdMapper::new();
        mapper.register_old_value_with_key("3", "High");
        mapper.flag_value_as_required("3");
        let messages = validate_required(&mapper, "priority");
        let errors: Vec<&str> = messages.errors().collect();
        assert_eq!(
            errors,
            vec![
                "The priority 'High' is required for the import but does not exist in the \
                 target system."
            ]
        );

        mapper.map_value("3", "7");
        assert!(!validate_required(&mapper, "priority").has_errors());
    }

    #[test]
    fn unregistered_mandatory_user_is_an_error_registered_one_a_warning() {
        let mut mapper = UserMapper::new();
        mapper.flag_user_as_mandatory("ghost");
        mapper.register_user(crate::model::ExternalUser {
            name: "fred".to_string(),
            full_name: Some("Fred Flintstone".to_string()),
            email: None,
        });
        mapper.flag_user_as_mandatory("fred");
        let messages = validate_users(&mapper);
        assert_eq!(messages.errors().count(), 1);
        let warnings: Vec<&str> = messages.warnings().collect();
        assert_eq!(
            warnings,
            vec!["The user 'fred' will be automatically created from backup details."]
        );
    }

    #[test]
    fn value_validator_memoizes_target_lookups() {
        let target = SqliteTarget::open_memory().unwrap();
        let bug = target.add_issue_type("Bug").unwrap();
        let task = target.add_issue_type("Task").unwrap();
        let field = target.add_custom_field("Severity", "select", &[&bug]).unwrap();

        let mut custom_fields = CustomFieldMapper::new();
        custom_fields.register_old_value("10001", "Severity");
        custom_fields.map_value("10001", field);
        custom_fields.register_issue_type("10000", "1");
        custom_fields.register_issue_type("10002", "2");

        let mut issue_types = SimpleIdMapper::new();
        issue_types.register_old_value_with_key("1", "Bug");
        issue_types.map_value("1", bug);
        issue_types.register_old_value_with_key("2", "Task");
        issue_types.map_value("2", task);

        let mut handler =
            CustomFieldValueValidatorHandler::new(&custom_fields, &issue_types, &target);
        for (id, issue) in [("1", "10000"), ("2", "10002"), ("3", "10002")] {
            handler
                .handle_entity(
                    kind::CUSTOM_FIELD_VALUE,
                    &attrs(&[
                        ("id", id),
                        ("customfield", "10001"),
                        ("issue", issue),
                        ("stringvalue", "100"),
                    ]),
                )
                .unwrap();
        }
        let messages = handler.into_message_set();
        // Two bad values, one deduplicated finding.
        let errors: Vec<&str> = messages.errors().collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("'Severity'"));
        assert!(errors[0].contains("'Task'"));
    }

    #[test]
    fn missing_project_directory_yields_one_warning_and_skips_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut info = BackupSystemInformation::new(None, 0);
        info.register_issue_key("10000", "MKY-1");
        let mut handler = AttachmentFileValidatorHandler::new(dir.path(), "MKY", &info);
        handler.start_document().unwrap();
        handler
            .handle_entity(
                kind::ATTACHMENT,
                &attrs(&[
                    ("id", "400"),
                    ("issue", "10000"),
                    ("filename", "screenshot.png"),
                ]),
            )
            .unwrap();
        let messages = handler.into_message_set();
        assert_eq!(messages.warnings().count(), 1);
    }

    #[test]
    fn missing_file_warnings_cap_at_twenty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("MKY")).unwrap();
        let mut info = BackupSystemInformation::new(None, 0);
        info.register_issue_key("10000", "MKY-1");
        let mut handler = AttachmentFileValidatorHandler::new(dir.path(), "MKY", &info);
        handler.start_document().unwrap();
        for i in 0..30 {
            let id = format!("{}", 400 + i);
            let name = format!("file-{i}.png");
            handler
                .handle_entity(
                    kind::ATTACHMENT,
                    &attrs(&[("id", &id), ("issue", "10000"), ("filename", &name)]),
                )
                .unwrap();
        }
        let messages = handler.into_message_set();
        // Twenty individual warnings plus the single summary line.
        assert_eq!(messages.warnings().count(), 21);
        assert!(messages
            .warnings()
            .any(|w| w.contains("more than twenty")));
    }
}
