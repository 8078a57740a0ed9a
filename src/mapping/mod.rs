//! Mapping pass: populate the id mappers from the backup.
//!
//! Registration handlers run over the full backup, because configuration
//! records (issue types, statuses, users, fields) exist only there.
//! Required-flagging handlers run over the partitioned documents so only
//! the scoped project's references count. No handler touches the target;
//! reconciliation is the auto-mapper's job afterwards.

pub mod overview;

use crate::error::Result;
use crate::mapper::{
    CustomFieldMapper, CustomFieldOptionMapper, IssueLinkTypeMapper, SimpleIdMapper, StatusMapper,
    UserMapper,
};
use crate::model::ExternalCustomFieldConfiguration;
use crate::parser::{self, kind};
use crate::scope::BackupProject;
use crate::xml::{Attributes, EntityHandler};

/// Mappers that can absorb an (old id, natural key) registration row.
pub trait RegistersByName {
    fn register(&mut self, old_id: &str, name: &str);
}

impl RegistersByName for SimpleIdMapper {
    fn register(&mut self, old_id: &str, name: &str) {
        self.register_old_value_with_key(old_id, name);
    }
}

impl RegistersByName for StatusMapper {
    fn register(&mut self, old_id: &str, name: &str) {
        self.register_old_value(old_id, name);
    }
}

impl RegistersByName for CustomFieldMapper {
    fn register(&mut self, old_id: &str, name: &str) {
        self.register_old_value(old_id, name);
    }
}

/// Registers every row of one kind by id and a single name attribute.
/// Covers issue types, priorities, resolutions, statuses, security levels,
/// projects (keyed by `key`), versions, components and custom fields.
pub struct SimpleEntityMapperHandler<'m, M: RegistersByName> {
    entity_name: &'static str,
    name_attribute: &'static str,
    mapper: &'m mut M,
}

impl<'m, M: RegistersByName> SimpleEntityMapperHandler<'m, M> {
    pub fn new(entity_name: &'static str, mapper: &'m mut M) -> Self {
        Self {
            entity_name,
            name_attribute: "name",
            mapper,
        }
    }

    pub fn with_name_attribute(mut self, name_attribute: &'static str) -> Self {
        self.name_attribute = name_attribute;
        self
    }
}

impl<M: RegistersByName> EntityHandler for SimpleEntityMapperHandler<'_, M> {
    fn handle_entity(&mut self, kind_name: &str, attributes: &Attributes) -> Result<()> {
        if kind_name != self.entity_name {
            return Ok(());
        }
        let id = parser::required(kind_name, attributes, "id")?;
        let name = parser::required(kind_name, attributes, self.name_attribute)?;
        self.mapper.register(id, name);
        Ok(())
    }
}

/// Registers link types together with their style side table.
pub struct IssueLinkTypeMapperHandler<'m> {
    mapper: &'m mut IssueLinkTypeMapper,
}

impl<'m> IssueLinkTypeMapperHandler<'m> {
    pub fn new(mapper: &'m mut IssueLinkTypeMapper) -> Self {
        Self { mapper }
    }
}

impl EntityHandler for IssueLinkTypeMapperHandler<'_> {
    fn handle_entity(&mut self, kind_name: &str, attributes: &Attributes) -> Result<()> {
        if kind_name != kind::ISSUE_LINK_TYPE {
            return Ok(());
        }
        let (id, name, style) = parser::link::parse_link_type(attributes)?;
        self.mapper.register_old_value(id, name, style);
        Ok(())
    }
}

/// Registers every user account in the backup, details included, so
/// missing accounts can later be auto-created with their real name and
/// email instead of a bare username.
pub struct RegisterUserMapperHandler<'m> {
    mapper: &'m mut UserMapper,
}

impl<'m> RegisterUserMapperHandler<'m> {
    pub fn new(mapper: &'m mut UserMapper) -> Self {
        Self { mapper }
    }
}

impl EntityHandler for RegisterUserMapperHandler<'_> {
    fn handle_entity(&mut self, kind_name: &str, attributes: &Attributes) -> Result<()> {
        if kind_name != kind::USER {
            return Ok(());
        }
        self.mapper.register_user(parser::user::parse(attributes)?);
        Ok(())
    }
}

/// Registers every group in the backup. Group names are their own
/// identity. Runs over the full backup; the scoped requirements come from
/// [`GroupLevelMapperHandler`] over the partitioned documents.
pub struct GroupMapperHandler<'m> {
    mapper: &'m mut SimpleIdMapper,
}

impl<'m> GroupMapperHandler<'m> {
    pub fn new(mapper: &'m mut SimpleIdMapper) -> Self {
        Self { mapper }
    }
}

impl EntityHandler for GroupMapperHandler<'_> {
    fn handle_entity(&mut self, kind_name: &str, attributes: &Attributes) -> Result<()> {
        if kind_name != kind::GROUP {
            return Ok(());
        }
        let name = parser::user::parse_group(attributes)?;
        self.mapper.register_old_value_with_key(name.clone(), name);
        Ok(())
    }
}

/// Flags groups that comment and worklog visibility restrictions depend
/// on. Runs over the partitioned documents so only scoped restrictions
/// count.
pub struct GroupLevelMapperHandler<'m> {
    mapper: &'m mut SimpleIdMapper,
}

impl<'m> GroupLevelMapperHandler<'m> {
    pub fn new(mapper: &'m mut SimpleIdMapper) -> Self {
        Self { mapper }
    }
}

impl EntityHandler for GroupLevelMapperHandler<'_> {
    fn handle_entity(&mut self, kind_name: &str, attributes: &Attributes) -> Result<()> {
        let group_level = match kind_name {
            kind::COMMENT => parser::comment::parse(attributes)?.and_then(|c| c.group_level),
            kind::WORKLOG => parser::worklog::parse(attributes)?.group_level,
            _ => None,
        };
        if let Some(level) = group_level {
            self.mapper.flag_value_as_required(level);
        }
        Ok(())
    }
}

/// Flags project roles that comment and worklog visibility restrictions
/// reference.
pub struct RoleLevelMapperHandler<'m> {
    mapper: &'m mut SimpleIdMapper,
}

impl<'m> RoleLevelMapperHandler<'m> {
    pub fn new(mapper: &'m mut SimpleIdMapper) -> Self {
        Self { mapper }
    }
}

impl EntityHandler for RoleLevelMapperHandler<'_> {
    fn handle_entity(&mut self, kind_name: &str, attributes: &Attributes) -> Result<()> {
        let role_level = match kind_name {
            kind::COMMENT => parser::comment::parse(attributes)?.and_then(|c| c.role_level),
            kind::WORKLOG => parser::worklog::parse(attributes)?.role_level,
            _ => None,
        };
        if let Some(level) = role_level {
            self.mapper.flag_value_as_required(level);
        }
        Ok(())
    }
}

/// Flags every username the scoped records touch as in use. Runs over the
/// partitioned documents only, so other projects' people stay out of the
/// auto-create set.
pub struct UserMapperHandler<'m> {
    mapper: &'m mut UserMapper,
}

impl<'m> UserMapperHandler<'m> {
    pub fn new(mapper: &'m mut UserMapper) -> Self {
        Self { mapper }
    }

    fn flag(&mut self, name: Option<String>) {
        if let Some(name) = name {
            self.mapper.flag_user_as_in_use(name);
        }
    }
}

impl EntityHandler for UserMapperHandler<'_> {
    fn handle_entity(&mut self, kind_name: &str, attributes: &Attributes) -> Result<()> {
        match kind_name {
            kind::ISSUE => {
                let issue = parser::issue::parse(attributes)?;
                self.flag(issue.reporter);
                self.flag(issue.assignee);
            }
            kind::COMMENT => {
                if let Some(comment) = parser::comment::parse(attributes)? {
                    self.flag(comment.author);
                }
            }
            kind::WORKLOG => {
                self.flag(parser::worklog::parse(attributes)?.author);
            }
            kind::ATTACHMENT => {
                self.flag(parser::attachment::parse(attributes)?.attacher);
            }
            kind::CHANGE_GROUP => {
                self.flag(parser::change::parse_group(attributes)?.author);
            }
            kind::USER_ASSOCIATION => {
                let association = parser::association::parse_user_association(attributes)?;
                self.flag(Some(association.source_name));
            }
            _ => {}
        }
        Ok(())
    }
}

/// Walks the scoped project's issues: registers each issue id and flags
/// everything the issue row references. Also feeds the custom field
/// mapper the issue to issue type relation it resolves later.
pub struct IssueMapperHandler<'m> {
    issue_mapper: &'m mut SimpleIdMapper,
    issue_type_mapper: &'m mut SimpleIdMapper,
    priority_mapper: &'m mut SimpleIdMapper,
    resolution_mapper: &'m mut SimpleIdMapper,
    status_mapper: &'m mut StatusMapper,
    security_level_mapper: &'m mut SimpleIdMapper,
    custom_field_mapper: &'m mut CustomFieldMapper,
}

impl<'m> IssueMapperHandler<'m> {
    #[expect(clippy::too_many_arguments, reason = "one borrow per mapper keeps ownership disjoint")]
    pub fn new(
        issue_mapper: &'m mut SimpleIdMapper,
        issue_type_mapper: &'m mut SimpleIdMapper,
        priority_mapper: &'m mut SimpleIdMapper,
        resolution_mapper: &'m mut SimpleIdMapper,
        status_mapper: &'m mut StatusMapper,
        security_level_mapper: &'m mut SimpleIdMapper,
        custom_field_mapper: &'m mut CustomFieldMapper,
    ) -> Self {
        Self {
            issue_mapper,
            issue_type_mapper,
            priority_mapper,
            resolution_mapper,
            status_mapper,
            security_level_mapper,
            custom_field_mapper,
        }
    }
}

impl EntityHandler for IssueMapperHandler<'_> {
    fn handle_entity(&mut self, kind_name: &str, attributes: &Attributes) -> Result<()> {
        if kind_name != kind::ISSUE {
            return Ok(());
        }
        let issue = parser::issue::parse(attributes)?;
        self.issue_mapper
            .register_old_value_with_key(issue.id.clone(), issue.key.clone());
        self.issue_type_mapper
            .flag_value_as_required(issue.issue_type.clone());
        self.custom_field_mapper
            .register_issue_type(issue.id, issue.issue_type.clone());
        if let Some(priority) = issue.priority {
            self.priority_mapper.flag_value_as_required(priority);
        }
        if let Some(resolution) = issue.resolution {
            self.resolution_mapper.flag_value_as_required(resolution);
        }
        if let Some(status) = issue.status {
            self.status_mapper
                .flag_value_as_required(status, issue.issue_type);
        }
        if let Some(level) = issue.security_level {
            self.security_level_mapper.flag_value_as_required(level);
        }
        Ok(())
    }
}

/// Flags versions referenced through fix/affects associations of scoped
/// issues.
pub struct IssueVersionMapperHandler<'m> {
    mapper: &'m mut SimpleIdMapper,
}

impl<'m> IssueVersionMapperHandler<'m> {
    pub fn new(mapper: &'m mut SimpleIdMapper) -> Self {
        Self { mapper }
    }
}

impl EntityHandler for IssueVersionMapperHandler<'_> {
    fn handle_entity(&mut self, kind_name: &str, attributes: &Attributes) -> Result<()> {
        if kind_name != kind::NODE_ASSOCIATION {
            return Ok(());
        }
        let association = parser::association::parse_node_association(attributes)?;
        if association.sink_node_entity == kind::VERSION
            && matches!(
                association.association_type.as_str(),
                parser::association::FIX_VERSION_TYPE | parser::association::AFFECTS_VERSION_TYPE
            )
        {
            self.mapper.flag_value_as_required(association.sink_node_id);
        }
        Ok(())
    }
}

/// Flags components referenced through component associations of scoped
/// issues.
pub struct IssueComponentMapperHandler<'m> {
    mapper: &'m mut SimpleIdMapper,
}

impl<'m> IssueComponentMapperHandler<'m> {
    pub fn new(mapper: &'m mut SimpleIdMapper) -> Self {
        Self { mapper }
    }
}

impl EntityHandler for IssueComponentMapperHandler<'_> {
    fn handle_entity(&mut self, kind_name: &str, attributes: &Attributes) -> Result<()> {
        if kind_name != kind::NODE_ASSOCIATION {
            return Ok(());
        }
        let association = parser::association::parse_node_association(attributes)?;
        if association.sink_node_entity == kind::COMPONENT
            && association.association_type == parser::association::COMPONENT_TYPE
        {
            self.mapper.flag_value_as_required(association.sink_node_id);
        }
        Ok(())
    }
}

/// Flags link types used by partitioned issue links.
pub struct IssueLinkMapperHandler<'m> {
    mapper: &'m mut IssueLinkTypeMapper,
}

impl<'m> IssueLinkMapperHandler<'m> {
    pub fn new(mapper: &'m mut IssueLinkTypeMapper) -> Self {
        Self { mapper }
    }
}

impl EntityHandler for IssueLinkMapperHandler<'_> {
    fn handle_entity(&mut self, kind_name: &str, attributes: &Attributes) -> Result<()> {
        if kind_name != kind::ISSUE_LINK {
            return Ok(());
        }
        let link = parser::link::parse(attributes)?;
        self.mapper.flag_value_as_required(link.link_type_id);
        Ok(())
    }
}

/// Registers every custom field option so the option arena is complete
/// before values flag what they need.
pub struct CustomFieldOptionsMapperHandler<'m> {
    mapper: &'m mut CustomFieldOptionMapper,
}

impl<'m> CustomFieldOptionsMapperHandler<'m> {
    pub fn new(mapper: &'m mut CustomFieldOptionMapper) -> Self {
        Self { mapper }
    }
}

impl EntityHandler for CustomFieldOptionsMapperHandler<'_> {
    fn handle_entity(&mut self, kind_name: &str, attributes: &Attributes) -> Result<()> {
        if kind_name != kind::CUSTOM_FIELD_OPTION {
            return Ok(());
        }
        self.mapper
            .register_option(parser::custom_field::parse_option(attributes)?);
        Ok(())
    }
}

/// Field types whose stored value payload is an option id.
pub(crate) fn is_option_type(type_key: &str) -> bool {
    matches!(
        type_key,
        "select" | "multiselect" | "cascadingselect" | "radiobuttons" | "multicheckboxes"
    ) || type_key.ends_with(":select")
        || type_key.ends_with(":multiselect")
        || type_key.ends_with(":cascadingselect")
        || type_key.ends_with(":radiobuttons")
        || type_key.ends_with(":multicheckboxes")
}

/// Flags custom fields required per issue from the partitioned value
/// document, and for option-backed field types flags the option ids the
/// values carry.
pub struct CustomFieldMapperHandler<'m> {
    custom_field_mapper: &'m mut CustomFieldMapper,
    option_mapper: &'m mut CustomFieldOptionMapper,
    configurations: Vec<ExternalCustomFieldConfiguration>,
}

impl<'m> CustomFieldMapperHandler<'m> {
    pub fn new(
        project: &BackupProject,
        custom_field_mapper: &'m mut CustomFieldMapper,
        option_mapper: &'m mut CustomFieldOptionMapper,
    ) -> Self {
        Self {
            custom_field_mapper,
            option_mapper,
            configurations: project.custom_field_configurations().to_vec(),
        }
    }

    fn option_backed(&self, field_id: &str) -> bool {
        self.configurations
            .iter()
            .any(|c| c.custom_field_id == field_id && is_option_type(&c.type_key))
    }
}

impl EntityHandler for CustomFieldMapperHandler<'_> {
    fn handle_entity(&mut self, kind_name: &str, attributes: &Attributes) -> Result<()> {
        if kind_name != kind::CUSTOM_FIELD_VALUE {
            return Ok(());
        }
        let value = parser::custom_field::parse_value(attributes)?;
        self.custom_field_mapper
            .flag_value_as_required(value.custom_field_id.clone(), value.issue_id.clone());
        if self.option_backed(&value.custom_field_id) {
            if let Some(option_id) = value.value() {
                self.option_mapper.flag_value_as_required(option_id);
            }
        }
        Ok(())
    }
}

/// Collects the scoped project's role memberships and flags the roles
/// they act in. The people and groups the memberships name are flagged
/// from the collected set afterwards, once the handler releases its
/// borrow.
pub struct ProjectRoleActorMapperHandler<'m> {
    project_id: String,
    role_mapper: &'m mut SimpleIdMapper,
    actors: Vec<crate::model::ExternalProjectRoleActor>,
}

impl<'m> ProjectRoleActorMapperHandler<'m> {
    pub fn new(project: &BackupProject, role_mapper: &'m mut SimpleIdMapper) -> Self {
        Self {
            project_id: project.project().id.clone(),
            role_mapper,
            actors: Vec::new(),
        }
    }

    /// Drain the collected memberships, releasing the mapper borrow.
    #[must_use]
    pub fn finish(self) -> Vec<crate::model::ExternalProjectRoleActor> {
        self.actors
    }
}

impl EntityHandler for ProjectRoleActorMapperHandler<'_> {
    fn handle_entity(&mut self, kind_name: &str, attributes: &Attributes) -> Result<()> {
        if kind_name != kind::PROJECT_ROLE_ACTOR {
            return Ok(());
        }
        let actor = parser::project::parse_role_actor(attributes)?;
        if actor.project_id != self.project_id {
            return Ok(());
        }
        self.role_mapper.flag_value_as_required(actor.role_id.clone());
        self.actors.push(actor);
        Ok(())
    }
}

/// Flags the scoped project itself plus the people its definition and
/// satellites name: project and component leads.
pub struct ProjectMapperHandler<'m> {
    project_id: String,
    project_mapper: &'m mut SimpleIdMapper,
    user_mapper: &'m mut UserMapper,
}

impl<'m> ProjectMapperHandler<'m> {
    pub fn new(
        project: &BackupProject,
        project_mapper: &'m mut SimpleIdMapper,
        user_mapper: &'m mut UserMapper,
    ) -> Self {
        Self {
            project_id: project.project().id.clone(),
            project_mapper,
            user_mapper,
        }
    }
}

impl EntityHandler for ProjectMapperHandler<'_> {
    fn handle_entity(&mut self, kind_name: &str, attributes: &Attributes) -> Result<()> {
        match kind_name {
            kind::PROJECT => {
                let project = parser::project::parse(attributes)?;
                self.project_mapper
                    .register_old_value_with_key(project.id.clone(), project.key);
                if project.id == self.project_id {
                    self.project_mapper.flag_value_as_required(project.id);
                    if let Some(lead) = project.lead {
                        self.user_mapper.flag_user_as_mandatory(lead);
                    }
                }
            }
            kind::COMPONENT => {
                let component = parser::project::parse_component(attributes)?;
                if component.project_id == self.project_id {
                    if let Some(lead) = component.lead {
                        self.user_mapper.flag_user_as_in_use(lead);
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}
