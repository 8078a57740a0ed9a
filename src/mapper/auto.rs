//! Automatic reconciliation of required old ids against the target.
//!
//! Runs after the mapping pass and before validation. Each method looks up
//! required old ids by their natural key and records the target's id when
//! the lookup succeeds; anything left unmapped is the validators' problem
//! to report, never this module's.

use crate::error::Result;
use crate::mapper::{
    CustomFieldMapper, CustomFieldOptionMapper, IssueLinkTypeMapper, SimpleIdMapper, StatusMapper,
    UserMapper,
};
use crate::scope::BackupProject;
use crate::storage::ImportTarget;
use tracing::debug;

pub struct AutomaticDataMapper<'a> {
    target: &'a dyn ImportTarget,
}

impl<'a> AutomaticDataMapper<'a> {
    #[must_use]
    pub fn new(target: &'a dyn ImportTarget) -> Self {
        Self { target }
    }

    fn map_by_name(
        &self,
        mapper: &mut SimpleIdMapper,
        lookup: &dyn Fn(&str) -> Result<Option<String>>,
    ) -> Result<()> {
        let required: Vec<String> = mapper.required_old_ids().map(str::to_string).collect();
        for old_id in required {
            let Some(key) = mapper.key_for(&old_id).map(str::to_string) else {
                continue;
            };
            if let Some(new_id) = lookup(&key)? {
                mapper.map_value(old_id, new_id);
            }
        }
        Ok(())
    }

    pub fn map_projects(&self, mapper: &mut SimpleIdMapper) -> Result<()> {
        self.map_by_name(mapper, &|key| self.target.project_id_by_key(key))
    }

    pub fn map_issue_types(&self, mapper: &mut SimpleIdMapper) -> Result<()> {
        self.map_by_name(mapper, &|name| self.target.issue_type_id_by_name(name))
    }

    pub fn map_priorities(&self, mapper: &mut SimpleIdMapper) -> Result<()> {
        self.map_by_name(mapper, &|name| self.target.priority_id_by_name(name))
    }

    pub fn map_resolutions(&self, mapper: &mut SimpleIdMapper) -> Result<()> {
        self.map_by_name(mapper, &|name| self.target.resolution_id_by_name(name))
    }

    pub fn map_project_roles(&self, mapper: &mut SimpleIdMapper) -> Result<()> {
        self.map_by_name(mapper, &|name| self.target.project_role_id_by_name(name))
    }

    pub fn map_security_levels(
        &self,
        mapper: &mut SimpleIdMapper,
        project_key: &str,
    ) -> Result<()> {
        self.map_by_name(mapper, &|name| {
            self.target.security_level_id_by_name(project_key, name)
        })
    }

    /// Group names are their own identity; a group maps when the target
    /// has one with the same name.
    pub fn map_groups(&self, mapper: &mut SimpleIdMapper) -> Result<()> {
        let required: Vec<String> = mapper.required_old_ids().map(str::to_string).collect();
        for name in required {
            if self.target.group_exists(&name)? {
                mapper.map_value(name.clone(), name);
            }
        }
        Ok(())
    }

    /// Usernames are their own identity; a user maps when the target has
    /// an account with the same name.
    pub fn map_users(&self, mapper: &mut UserMapper) -> Result<()> {
        let candidates: Vec<String> = mapper
            .mandatory_users()
            .chain(mapper.users_in_use())
            .map(str::to_string)
            .collect();
        for name in candidates {
            if self.target.user_exists(&name)? {
                mapper.map_user(name);
            }
        }
        Ok(())
    }

    /// A status maps only when the target status is reachable by the
    /// workflow of every issue type that carries it.
    pub fn map_statuses(
        &self,
        mapper: &mut StatusMapper,
        issue_type_mapper: &SimpleIdMapper,
    ) -> Result<()> {
        let required: Vec<String> = mapper.required_old_ids().map(str::to_string).collect();
        for old_id in required {
            let Some(name) = mapper.key_for(&old_id).map(str::to_string) else {
                continue;
            };
            let Some(new_id) = self.target.status_id_by_name(&name)? else {
                continue;
            };
            let mut valid = true;
            for old_issue_type in mapper.issue_types_requiring(&old_id) {
                match issue_type_mapper.new_id_for(old_issue_type) {
                    Some(new_issue_type) => {
                        if !self
                            .target
                            .status_valid_for_issue_type(&new_id, new_issue_type)?
                        {
                            valid = false;
                            break;
                        }
                    }
                    None => {
                        valid = false;
                        break;
                    }
                }
            }
            if valid {
                mapper.map_value(old_id, new_id);
            } else {
                debug!(status = %name, "status exists but is not reachable for all issue types");
            }
        }
        Ok(())
    }

    /// Link types must match on name and style; a subtask-style link in
    /// the backup cannot land on a plain link type of the same name.
    pub fn map_issue_link_types(&self, mapper: &mut IssueLinkTypeMapper) -> Result<()> {
        let required: Vec<String> = mapper.required_old_ids().map(str::to_string).collect();
        for old_id in required {
            let Some(name) = mapper.key_for(&old_id).map(str::to_string) else {
                continue;
            };
            if let Some(link_type) = self.target.link_type_by_name(&name)? {
                if link_type.style.as_deref() == mapper.style_for(&old_id) {
                    mapper.map_value(old_id, link_type.id);
                }
            }
        }
        Ok(())
    }

    /// A custom field maps when the scoped backup carries a configuration
    /// for it, the target has a field of the same name and type key, and
    /// that field covers every issue type using it. Fields the backup has
    /// no configuration for are marked ignored instead of unmapped.
    pub fn map_custom_fields(
        &self,
        project: &BackupProject,
        mapper: &mut CustomFieldMapper,
        issue_type_mapper: &SimpleIdMapper,
    ) -> Result<()> {
        let required: Vec<String> = mapper.required_old_ids().map(str::to_string).collect();
        for old_id in required {
            let Some(configuration) = project.custom_field_configuration(&old_id) else {
                mapper.ignore_field(old_id);
                continue;
            };
            let Some(field) = self
                .target
                .custom_field_by_name(&configuration.custom_field_name)?
            else {
                continue;
            };
            if field.type_key != configuration.type_key {
                debug!(
                    field = %configuration.custom_field_name,
                    backup_type = %configuration.type_key,
                    target_type = %field.type_key,
                    "custom field type key mismatch"
                );
                continue;
            }
            let issue_types: Vec<String> = mapper
                .issue_types_in_use(&old_id)
                .map(str::to_string)
                .collect();
            let mut valid = true;
            for old_issue_type in &issue_types {
                match issue_type_mapper.new_id_for(old_issue_type) {
                    Some(new_issue_type) => {
                        if !self
                            .target
                            .custom_field_valid_for_issue_type(&field.id, new_issue_type)?
                        {
                            valid = false;
                            break;
                        }
                    }
                    None => {
                        valid = false;
                        break;
                    }
                }
            }
            if valid {
                mapper.map_value(old_id, field.id);
            }
        }
        Ok(())
    }

    /// Options map by value within their mapped field; children only map
    /// under their mapped parent, so parents go first.
    pub fn map_custom_field_options(
        &self,
        mapper: &mut CustomFieldOptionMapper,
        custom_field_mapper: &CustomFieldMapper,
    ) -> Result<()> {
        let required: Vec<String> = mapper.required_old_ids().map(str::to_string).collect();
        let (parents, children): (Vec<String>, Vec<String>) =
            required.into_iter().partition(|old_id| {
                mapper
                    .option(old_id)
                    .is_none_or(|option| option.parent_option_id.is_none())
            });
        for old_id in parents.into_iter().chain(children) {
            let Some(option) = mapper.option(&old_id).cloned() else {
                continue;
            };
            let Some(new_field_id) = custom_field_mapper.new_id_for(&option.custom_field_id) else {
                continue;
            };
            let new_parent_id = match &option.parent_option_id {
                Some(parent) => match mapper.new_id_for(parent) {
                    Some(mapped) => Some(mapped.to_string()),
                    None => continue,
                },
                None => None,
            };
            if let Some(new_id) = self.target.custom_field_option_id(
                new_field_id,
                new_parent_id.as_deref(),
                &option.value,
            )? {
                mapper.map_value(old_id, new_id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteTarget;

    #[test]
    fn maps_required_ids_by_registered_name() {
        let target = SqliteTarget::open_memory().unwrap();
        let bug_id = target.add_issue_type("Bug").unwrap();
        let auto = AutomaticDataMapper::new(&target);

        let mut mapper = SimpleIdMapper::new();
        mapper.register_old_value_with_key("1", "Bug");
        mapper.flag_value_as_required("1");
        mapper.register_old_value_with_key("2", "Improvement");
        mapper.flag_value_as_required("2");

        auto.map_issue_types(&mut mapper).unwrap();
        assert_eq!(mapper.new_id_for("1"), Some(bug_id.as_str()));
        assert_eq!(mapper.new_id_for("2"), None);
    }

    #[test]
    fn status_only_maps_when_reachable_for_every_issue_type() {
        let target = SqliteTarget::open_memory().unwrap();
        let bug = target.add_issue_type("Bug").unwrap();
        let task = target.add_issue_type("Task").unwrap();
        let closed = target.add_status("Closed", &[&bug]).unwrap();
        let auto = AutomaticDataMapper::new(&target);

        let mut issue_types = SimpleIdMapper::new();
        issue_types.register_old_value_with_key("1", "Bug");
        issue_types.map_value("1", bug.clone());
        issue_types.register_old_value_with_key("2", "Task");
        issue_types.map_value("2", task);

        let mut statuses = StatusMapper::new();
        statuses.register_old_value("6", "Closed");
        statuses.flag_value_as_required("6", "1");
        auto.map_statuses(&mut statuses, &issue_types).unwrap();
        assert_eq!(statuses.new_id_for("6"), Some(closed.as_str()));

        let mut statuses = StatusMapper::new();
        statuses.register_old_value("6", "Closed");
        statuses.flag_value_as_required("6", "1");
        statuses.flag_value_as_required("6", "2");
        auto.map_statuses(&mut statuses, &issue_types).unwrap();
        assert_eq!(statuses.new_id_for("6"), None);
    }

    #[test]
    fn link_type_style_must_match() {
        let target = SqliteTarget::open_memory().unwrap();
        target.add_link_type("Duplicate", None).unwrap();
        let auto = AutomaticDataMapper::new(&target);

        let mut mapper = IssueLinkTypeMapper::new();
        mapper.register_old_value("10", "Duplicate", Some("jira_subtask".to_string()));
        mapper.flag_value_as_required("10");
        auto.map_issue_link_types(&mut mapper).unwrap();
        assert_eq!(mapper.new_id_for("10"), None);

        let mut mapper = IssueLinkTypeMapper::new();
        mapper.register_old_value("10", "Duplicate", None);
        mapper.flag_value_as_required("10");
        auto.map_issue_link_types(&mut mapper).unwrap();
        assert!(mapper.new_id_for("10").is_some());
    }

    #[test]
    fn child_option_maps_under_its_mapped_parent() {
        use crate::model::ExternalCustomFieldOption;

        let target = SqliteTarget::open_memory().unwrap();
        let field = target
            .add_custom_field("Region", "cascadingselect", &[])
            .unwrap();
        let europe = target
            .add_custom_field_option(&field, None, "Europe")
            .unwrap();
        let france = target
            .add_custom_field_option(&field, Some(&europe), "France")
            .unwrap();
        let auto = AutomaticDataMapper::new(&target);

        let mut fields = CustomFieldMapper::new();
        fields.register_old_value("10001", "Region");
        fields.map_value("10001", field);

        let mut options = CustomFieldOptionMapper::new();
        options.register_option(ExternalCustomFieldOption {
            id: "100".to_string(),
            custom_field_id: "10001".to_string(),
            field_config_id: "1".to_string(),
            parent_option_id: None,
            value: "Europe".to_string(),
        });
        options.register_option(ExternalCustomFieldOption {
            id: "101".to_string(),
            custom_field_id: "10001".to_string(),
            field_config_id: "1".to_string(),
            parent_option_id: Some("100".to_string()),
            value: "France".to_string(),
        });
        options.flag_value_as_required("100");
        options.flag_value_as_required("101");

        auto.map_custom_field_options(&mut options, &fields).unwrap();
        assert_eq!(options.new_id_for("100"), Some(europe.as_str()));
        assert_eq!(options.new_id_for("101"), Some(france.as_str()));
    }
}
