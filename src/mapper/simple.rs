//! The basic bidirectional id mapper shared by most entity kinds.

use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;

/// Old-to-new id mapping for one entity kind.
///
/// `registered` ids were seen as primary records in the source data;
/// `required` ids were referenced by some other record and need resolving.
/// The two sets are tracked independently: a reference can exist before or
/// without the referenced record ever appearing, and that is data outside
/// the migrated scope rather than an error.
#[derive(Debug, Clone, Default)]
pub struct SimpleIdMapper {
    /// Old id -> natural key (name or key) when one was seen.
    registered: IndexMap<String, Option<String>>,
    required: IndexSet<String>,
    old_to_new: HashMap<String, String>,
}

impl SimpleIdMapper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `old_id` exists in the source data.
    pub fn register_old_value(&mut self, old_id: impl Into<String>) {
        self.registered.entry(old_id.into()).or_insert(None);
    }

    /// Record that `old_id` exists, remembering its natural key for display
    /// and for auto-mapping by name.
    pub fn register_old_value_with_key(
        &mut self,
        old_id: impl Into<String>,
        key: impl Into<String>,
    ) {
        self.registered.insert(old_id.into(), Some(key.into()));
    }

    /// Record that some record references `old_id` and needs it resolved.
    pub fn flag_value_as_required(&mut self, old_id: impl Into<String>) {
        self.required.insert(old_id.into());
    }

    /// Associate `old_id` with the id the target system assigned.
    pub fn map_value(&mut self, old_id: impl Into<String>, new_id: impl Into<String>) {
        self.old_to_new.insert(old_id.into(), new_id.into());
    }

    /// The new id for `old_id`, when one has been assigned.
    #[must_use]
    pub fn new_id_for(&self, old_id: &str) -> Option<&str> {
        self.old_to_new.get(old_id).map(String::as_str)
    }

    #[must_use]
    pub fn is_mapped(&self, old_id: &str) -> bool {
        self.old_to_new.contains_key(old_id)
    }

    #[must_use]
    pub fn is_registered(&self, old_id: &str) -> bool {
        self.registered.contains_key(old_id)
    }

    #[must_use]
    pub fn is_required(&self, old_id: &str) -> bool {
        self.required.contains(old_id)
    }

    /// Registered old ids, in the order they were first seen.
    pub fn registered_old_ids(&self) -> impl Iterator<Item = &str> {
        self.registered.keys().map(String::as_str)
    }

    /// Required old ids, in the order they were first flagged.
    pub fn required_old_ids(&self) -> impl Iterator<Item = &str> {
        self.required.iter().map(String::as_str)
    }

    /// All new ids assigned so far.
    pub fn all_mapped_new_ids(&self) -> impl Iterator<Item = &str> {
        self.old_to_new.values().map(String::as_str)
    }

    /// Natural key registered for `old_id`, if the record carried one.
    #[must_use]
    pub fn key_for(&self, old_id: &str) -> Option<&str> {
        self.registered.get(old_id)?.as_deref()
    }

    /// Human-readable name for messages: the registered key, or the old id
    /// in brackets when no record for it was ever seen.
    #[must_use]
    pub fn display_name(&self, old_id: &str) -> String {
        self.key_for(old_id)
            .map_or_else(|| format!("[{old_id}]"), ToString::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_and_registered_are_independent() {
        let mut mapper = SimpleIdMapper::new();
        mapper.flag_value_as_required("4");
        mapper.register_old_value_with_key("5", "Improvement");

        assert!(mapper.is_required("4"));
        assert!(!mapper.is_registered("4"));
        assert!(mapper.is_registered("5"));
        assert!(!mapper.is_required("5"));
    }

    #[test]
    fn mapping_resolves_only_mapped_ids() {
        let mut mapper = SimpleIdMapper::new();
        mapper.register_old_value_with_key("1", "Bug");
        mapper.map_value("1", "10001");

        assert_eq!(mapper.new_id_for("1"), Some("10001"));
        assert!(mapper.is_mapped("1"));
        assert_eq!(mapper.new_id_for("2"), None);
    }

    #[test]
    fn display_name_falls_back_to_bracketed_id() {
        let mut mapper = SimpleIdMapper::new();
        mapper.register_old_value_with_key("1", "Bug");
        mapper.register_old_value("2");

        assert_eq!(mapper.display_name("1"), "Bug");
        assert_eq!(mapper.display_name("2"), "[2]");
        assert_eq!(mapper.display_name("3"), "[3]");
    }

    #[test]
    fn required_ids_keep_insertion_order() {
        let mut mapper = SimpleIdMapper::new();
        for id in ["30", "10", "20", "10"] {
            mapper.flag_value_as_required(id);
        }
        let ids: Vec<&str> = mapper.required_old_ids().collect();
        assert_eq!(ids, vec!["30", "10", "20"]);
    }
}
