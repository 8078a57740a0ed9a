//! Id mappers: old identifiers reconciled against new ones.
//!
//! One mapper exists per entity kind, all aggregated in
//! [`ProjectImportMapper`] which lives for the whole run. An id may be
//! *required* (referenced) without ever being *registered* (seen in the
//! backup), and only ids present in the old-to-new map are resolvable.

pub mod auto;
pub mod custom_field;
pub mod simple;
pub mod status;
pub mod user;

pub use custom_field::{CustomFieldMapper, CustomFieldOptionMapper};
pub use simple::SimpleIdMapper;
pub use status::StatusMapper;
pub use user::UserMapper;

use crate::model::ExternalProjectRoleActor;
use std::collections::HashMap;

/// Issue link types carry a style side table (a "jira_subtask" style link
/// is structural, not importable as an ordinary link).
#[derive(Debug, Clone, Default)]
pub struct IssueLinkTypeMapper {
    inner: SimpleIdMapper,
    styles: HashMap<String, Option<String>>,
}

impl IssueLinkTypeMapper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_old_value(
        &mut self,
        link_type_id: impl Into<String>,
        name: impl Into<String>,
        style: Option<String>,
    ) {
        let link_type_id = link_type_id.into();
        self.inner
            .register_old_value_with_key(link_type_id.clone(), name);
        self.styles.insert(link_type_id, style);
    }

    pub fn flag_value_as_required(&mut self, link_type_id: impl Into<String>) {
        self.inner.flag_value_as_required(link_type_id);
    }

    #[must_use]
    pub fn style_for(&self, link_type_id: &str) -> Option<&str> {
        self.styles.get(link_type_id)?.as_deref()
    }

    pub fn map_value(&mut self, old_id: impl Into<String>, new_id: impl Into<String>) {
        self.inner.map_value(old_id, new_id);
    }

    #[must_use]
    pub fn new_id_for(&self, old_id: &str) -> Option<&str> {
        self.inner.new_id_for(old_id)
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

/// The aggregate of every per-kind mapper for one migration run.
///
/// Created before the mapping pass, completed by the auto-mapper and the
/// persist passes, discarded when the run ends.
#[derive(Debug, Clone, Default)]
pub struct ProjectImportMapper {
    pub project: SimpleIdMapper,
    pub issue: SimpleIdMapper,
    pub issue_type: SimpleIdMapper,
    pub priority: SimpleIdMapper,
    pub resolution: SimpleIdMapper,
    pub status: StatusMapper,
    pub issue_security_level: SimpleIdMapper,
    pub project_role: SimpleIdMapper,
    pub version: SimpleIdMapper,
    pub component: SimpleIdMapper,
    pub group: SimpleIdMapper,
    pub user: UserMapper,
    pub custom_field: CustomFieldMapper,
    pub custom_field_option: CustomFieldOptionMapper,
    pub issue_link_type: IssueLinkTypeMapper,
    /// Change groups get new ids during persistence that change items need.
    pub change_group: SimpleIdMapper,
    /// Comments get new ids that entity properties may reference.
    pub comment: SimpleIdMapper,
    pub attachment: SimpleIdMapper,
    pub custom_field_value: SimpleIdMapper,
    pub issue_link: SimpleIdMapper,
    project_role_actors: Vec<ExternalProjectRoleActor>,
}

impl ProjectImportMapper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect a role membership of the scoped project for later replay.
    pub fn add_project_role_actor(&mut self, actor: ExternalProjectRoleActor) {
        self.project_role_actors.push(actor);
    }

    #[must_use]
    pub fn project_role_actors(&self) -> &[ExternalProjectRoleActor] {
        &self.project_role_actors
    }

    /// Reverse lookup: the *old* issue id whose mapping produced `new_id`.
    #[must_use]
    pub fn old_issue_id_for_new(&self, new_id: &str) -> Option<&str> {
        self.issue
            .registered_old_ids()
            .find(|old| self.issue.new_id_for(old) == Some(new_id))
    }
}
