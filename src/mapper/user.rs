//! User mapping.
//!
//! Users are keyed by username rather than numeric id, and the "mapping" is
//! identity: a user is mapped once a user with the same name is known to
//! exist in the target (pre-existing or created by the import). What the
//! mapper tracks is which usernames are *mandatory* (the record cannot be
//! represented without them, e.g. a project lead) versus merely *in use*
//! (droppable field-wise, e.g. an issue assignee), and the full user
//! details seen in the backup so missing users can be re-created.

use crate::model::ExternalUser;
use indexmap::IndexSet;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct UserMapper {
    registered: HashMap<String, ExternalUser>,
    mandatory: IndexSet<String>,
    in_use: IndexSet<String>,
    mapped: HashSet<String>,
}

impl UserMapper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the full details of a user seen in the backup.
    pub fn register_user(&mut self, user: ExternalUser) {
        self.registered.insert(user.name.clone(), user);
    }

    /// Flag a username the import cannot proceed without.
    pub fn flag_user_as_mandatory(&mut self, name: impl Into<String>) {
        self.mandatory.insert(name.into());
    }

    /// Flag a username referenced by a droppable field.
    pub fn flag_user_as_in_use(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.mandatory.contains(&name) {
            self.in_use.insert(name);
        }
    }

    /// Confirm that `name` exists in the target system.
    pub fn map_user(&mut self, name: impl Into<String>) {
        self.mapped.insert(name.into());
    }

    #[must_use]
    pub fn user_exists(&self, name: &str) -> bool {
        self.mapped.contains(name)
    }

    /// The target-side user key for an old username. Identity once mapped.
    #[must_use]
    pub fn mapped_user_key<'a>(&self, name: &'a str) -> Option<&'a str> {
        self.mapped.contains(name).then_some(name)
    }

    #[must_use]
    pub fn registered_user(&self, name: &str) -> Option<&ExternalUser> {
        self.registered.get(name)
    }

    /// Mandatory usernames in the order they were flagged.
    pub fn mandatory_users(&self) -> impl Iterator<Item = &str> {
        self.mandatory.iter().map(String::as_str)
    }

    /// In-use (optional) usernames in the order they were flagged.
    pub fn users_in_use(&self) -> impl Iterator<Item = &str> {
        self.in_use.iter().map(String::as_str)
    }

    /// Users referenced anywhere, with registered details, and not yet
    /// known to exist in the target. These are the candidates for
    /// auto-creation before the persist passes.
    #[must_use]
    pub fn users_to_auto_create(&self) -> Vec<&ExternalUser> {
        self.mandatory
            .iter()
            .chain(self.in_use.iter())
            .filter(|name| !self.mapped.contains(*name))
            .filter_map(|name| self.registered.get(name))
            .collect()
    }

    /// Mandatory usernames with no registered details; these cannot be
    /// auto-created and surface as validation findings.
    #[must_use]
    pub fn unregistered_mandatory_users(&self) -> Vec<&str> {
        self.mandatory
            .iter()
            .filter(|name| !self.registered.contains_key(*name) && !self.mapped.contains(*name))
            .map(String::as_str)
            .collect()
    }

    /// Best display name for messages.
    #[must_use]
    pub fn display_name(&self, name: &str) -> String {
        self.registered
            .get(name)
            .map_or_else(|| name.to_string(), |user| user.display_name().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> ExternalUser {
        ExternalUser {
            name: name.to_string(),
            full_name: Some(format!("{name} fullname")),
            email: None,
        }
    }

    #[test]
    fn mandatory_wins_over_in_use() {
        let mut mapper = UserMapper::new();
        mapper.flag_user_as_mandatory("fred");
        mapper.flag_user_as_in_use("fred");

        assert_eq!(mapper.mandatory_users().collect::<Vec<_>>(), vec!["fred"]);
        assert_eq!(mapper.users_in_use().count(), 0);
    }

    #[test]
    fn auto_create_excludes_existing_and_unregistered_users() {
        let mut mapper = UserMapper::new();
        mapper.register_user(user("fred"));
        mapper.register_user(user("mary"));
        mapper.flag_user_as_mandatory("fred");
        mapper.flag_user_as_in_use("mary");
        mapper.flag_user_as_in_use("ghost");
        mapper.map_user("mary");

        let names: Vec<&str> = mapper
            .users_to_auto_create()
            .iter()
            .map(|u| u.name.as_str())
            .collect();
        assert_eq!(names, vec!["fred"]);
    }

    #[test]
    fn unregistered_mandatory_users_are_reported() {
        let mut mapper = UserMapper::new();
        mapper.flag_user_as_mandatory("ghost");
        mapper.flag_user_as_mandatory("fred");
        mapper.register_user(user("fred"));

        assert_eq!(mapper.unregistered_mandatory_users(), vec!["ghost"]);
    }

    #[test]
    fn mapped_user_key_is_identity_once_mapped() {
        let mut mapper = UserMapper::new();
        assert_eq!(mapper.mapped_user_key("fred"), None);
        mapper.map_user("fred");
        assert_eq!(mapper.mapped_user_key("fred"), Some("fred"));
    }
}
