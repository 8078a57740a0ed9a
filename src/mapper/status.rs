//! Status mapping.
//!
//! A status is not required globally: workflows differ per issue type, so a
//! status must be valid for every issue type it was seen with. The mapper
//! therefore tracks required statuses together with the old issue types
//! that need them.

use crate::mapper::SimpleIdMapper;
use indexmap::IndexSet;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct StatusMapper {
    inner: SimpleIdMapper,
    issue_types_by_status: HashMap<String, IndexSet<String>>,
}

impl StatusMapper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_old_value(&mut self, status_id: impl Into<String>, name: impl Into<String>) {
        self.inner.register_old_value_with_key(status_id, name);
    }

    /// Flag `status_id` as required by an issue of `issue_type_id`.
    pub fn flag_value_as_required(
        &mut self,
        status_id: impl Into<String>,
        issue_type_id: impl Into<String>,
    ) {
        let status_id = status_id.into();
        self.inner.flag_value_as_required(status_id.clone());
        self.issue_types_by_status
            .entry(status_id)
            .or_default()
            .insert(issue_type_id.into());
    }

    /// Old issue type ids that need this status, in first-seen order.
    pub fn issue_types_requiring(&self, status_id: &str) -> impl Iterator<Item = &str> {
        self.issue_types_by_status
            .get(status_id)
            .into_iter()
            .flat_map(|types| types.iter().map(String::as_str))
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
    pub fn key_for(&self, old_id: &str) -> Option<&str> {
        self.inner.key_for(old_id)
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
    fn statuses_are_required_per_issue_type() {
        let mut mapper = StatusMapper::new();
        mapper.register_old_value("1", "Open");
        mapper.flag_value_as_required("1", "1");
        mapper.flag_value_as_required("1", "3");
        mapper.flag_value_as_required("6", "3");

        let types: Vec<&str> = mapper.issue_types_requiring("1").collect();
        assert_eq!(types, vec!["1", "3"]);
        let types: Vec<&str> = mapper.issue_types_requiring("6").collect();
        assert_eq!(types, vec!["3"]);
        assert_eq!(mapper.issue_types_requiring("99").count(), 0);
    }
}
