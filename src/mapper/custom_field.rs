//! Custom field and custom field option mapping.

use crate::mapper::SimpleIdMapper;
use crate::model::ExternalCustomFieldOption;
use indexmap::IndexSet;
use std::collections::{HashMap, HashSet};

/// Id mapper for custom fields, with the issue-type applicability side
/// table the validators need.
///
/// During the mapping pass only issue *ids* are known at the point a value
/// is seen, so usage is recorded per issue and resolved to issue types once
/// the pass completes and every issue's type has been observed.
#[derive(Debug, Clone, Default)]
pub struct CustomFieldMapper {
    inner: SimpleIdMapper,
    /// Old issue id -> old issue type id, filled from issue records.
    issue_types_by_issue: HashMap<String, String>,
    /// Old field id -> old issue ids it carries values for.
    issues_by_field: HashMap<String, IndexSet<String>>,
    /// Old field id -> old issue type ids in use. Populated by
    /// [`Self::register_issue_types_in_use`].
    issue_types_by_field: HashMap<String, IndexSet<String>>,
    ignored: HashSet<String>,
}

impl CustomFieldMapper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_old_value(&mut self, field_id: impl Into<String>, name: impl Into<String>) {
        self.inner.register_old_value_with_key(field_id, name);
    }

    /// Record that `field_id` has a value on `issue_id`.
    pub fn flag_value_as_required(
        &mut self,
        field_id: impl Into<String>,
        issue_id: impl Into<String>,
    ) {
        let field_id = field_id.into();
        self.inner.flag_value_as_required(field_id.clone());
        self.issues_by_field
            .entry(field_id)
            .or_default()
            .insert(issue_id.into());
    }

    /// Record the issue type of an in-scope issue.
    pub fn register_issue_type(
        &mut self,
        issue_id: impl Into<String>,
        issue_type_id: impl Into<String>,
    ) {
        self.issue_types_by_issue
            .insert(issue_id.into(), issue_type_id.into());
    }

    /// Resolve recorded per-issue usage into per-issue-type usage. Call
    /// once, after the mapping pass has traversed every issue record.
    pub fn register_issue_types_in_use(&mut self) {
        let mut resolved: HashMap<String, IndexSet<String>> = HashMap::new();
        for (field_id, issue_ids) in &self.issues_by_field {
            let types = resolved.entry(field_id.clone()).or_default();
            for issue_id in issue_ids {
                if let Some(issue_type) = self.issue_types_by_issue.get(issue_id) {
                    types.insert(issue_type.clone());
                }
            }
        }
        self.issue_types_by_field = resolved;
    }

    /// The old issue type recorded for an in-scope issue.
    #[must_use]
    pub fn issue_type_for_issue(&self, issue_id: &str) -> Option<&str> {
        self.issue_types_by_issue.get(issue_id).map(String::as_str)
    }

    /// Old issue type ids the field is used with, in first-seen order.
    pub fn issue_types_in_use(&self, field_id: &str) -> impl Iterator<Item = &str> {
        self.issue_types_by_field
            .get(field_id)
            .into_iter()
            .flat_map(|types| types.iter().map(String::as_str))
    }

    /// Mark a field the operator chose to leave behind. Ignored fields are
    /// skipped by validation and persistence without a finding.
    pub fn ignore_field(&mut self, field_id: impl Into<String>) {
        self.ignored.insert(field_id.into());
    }

    #[must_use]
    pub fn is_ignored(&self, field_id: &str) -> bool {
        self.ignored.contains(field_id)
    }

    pub fn map_value(&mut self, old_id: impl Into<String>, new_id: impl Into<String>) {
        self.inner.map_value(old_id, new_id);
    }

    #[must_use]
    pub fn new_id_for(&self, old_id: &str) -> Option<&str> {
        self.inner.new_id_for(old_id)
    }

    #[must_use]
    pub fn is_mapped(&self, old_id: &str) -> bool {
        self.inner.is_mapped(old_id)
    }

    pub fn required_old_ids(&self) -> impl Iterator<Item = &str> {
        self.inner.required_old_ids()
    }

    #[must_use]
    pub fn is_required(&self, old_id: &str) -> bool {
        self.inner.is_required(old_id)
    }

    #[must_use]
    pub fn display_name(&self, old_id: &str) -> String {
        self.inner.display_name(old_id)
    }

    #[must_use]
    pub fn key_for(&self, old_id: &str) -> Option<&str> {
        self.inner.key_for(old_id)
    }
}

/// Arena of custom field options keyed by old option id, with the
/// parent/child hierarchy expressed as id references resolved through the
/// arena rather than owned nesting.
#[derive(Debug, Clone, Default)]
pub struct CustomFieldOptionMapper {
    inner: SimpleIdMapper,
    options: HashMap<String, ExternalCustomFieldOption>,
    children: HashMap<String, Vec<String>>,
}

impl CustomFieldOptionMapper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_option(&mut self, option: ExternalCustomFieldOption) {
        self.inner
            .register_old_value_with_key(option.id.clone(), option.value.clone());
        if let Some(parent) = &option.parent_option_id {
            self.children
                .entry(parent.clone())
                .or_default()
                .push(option.id.clone());
        }
        self.options.insert(option.id.clone(), option);
    }

    pub fn flag_value_as_required(&mut self, old_option_id: impl Into<String>) {
        self.inner.flag_value_as_required(old_option_id);
    }

    pub fn map_value(&mut self, old_id: impl Into<String>, new_id: impl Into<String>) {
        self.inner.map_value(old_id, new_id);
    }

    #[must_use]
    pub fn new_id_for(&self, old_id: &str) -> Option<&str> {
        self.inner.new_id_for(old_id)
    }

    #[must_use]
    pub fn option(&self, old_id: &str) -> Option<&ExternalCustomFieldOption> {
        self.options.get(old_id)
    }

    /// Child option ids of a parent option, in registration order.
    #[must_use]
    pub fn children_of(&self, parent_option_id: &str) -> &[String] {
        self.children
            .get(parent_option_id)
            .map_or(&[], Vec::as_slice)
    }

    /// Options belonging to one custom field, parents and children alike.
    pub fn options_for_field<'a>(
        &'a self,
        custom_field_id: &'a str,
    ) -> impl Iterator<Item = &'a ExternalCustomFieldOption> {
        self.options
            .values()
            .filter(move |option| option.custom_field_id == custom_field_id)
    }

    pub fn required_old_ids(&self) -> impl Iterator<Item = &str> {
        self.inner.required_old_ids()
    }

    #[must_use]
    pub fn display_name(&self, old_id: &str) -> String {
        self.inner.display_name(old_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_types_resolve_through_the_issue_table() {
        let mut mapper = CustomFieldMapper::new();
        mapper.register_issue_type("12", "1");
        mapper.register_issue_type("14", "3");
        mapper.flag_value_as_required("10001", "12");
        mapper.flag_value_as_required("10001", "14");
        mapper.flag_value_as_required("10002", "14");
        // A value on an issue whose type was never seen resolves to nothing.
        mapper.flag_value_as_required("10002", "99");

        mapper.register_issue_types_in_use();

        let types: Vec<&str> = mapper.issue_types_in_use("10001").collect();
        assert_eq!(types, vec!["1", "3"]);
        let types: Vec<&str> = mapper.issue_types_in_use("10002").collect();
        assert_eq!(types, vec!["3"]);
    }

    #[test]
    fn ignored_fields_are_remembered() {
        let mut mapper = CustomFieldMapper::new();
        mapper.ignore_field("10001");
        assert!(mapper.is_ignored("10001"));
        assert!(!mapper.is_ignored("10002"));
    }

    #[test]
    fn option_hierarchy_is_an_arena() {
        let mut mapper = CustomFieldOptionMapper::new();
        mapper.register_option(ExternalCustomFieldOption {
            id: "1000".to_string(),
            custom_field_id: "10001".to_string(),
            field_config_id: "1".to_string(),
            parent_option_id: None,
            value: "Hardware".to_string(),
        });
        mapper.register_option(ExternalCustomFieldOption {
            id: "1001".to_string(),
            custom_field_id: "10001".to_string(),
            field_config_id: "1".to_string(),
            parent_option_id: Some("1000".to_string()),
            value: "CPU".to_string(),
        });

        assert_eq!(mapper.children_of("1000"), ["1001".to_string()]);
        assert_eq!(mapper.option("1001").unwrap().value, "CPU");
        assert_eq!(mapper.options_for_field("10001").count(), 2);
    }
}
