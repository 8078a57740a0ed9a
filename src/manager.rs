//! Pass orchestration for one project import run.
//!
//! The manager owns the run's state machine and drives the four pass
//! families in order: overview and partitioning, mapper population,
//! validation, then persistence. Each pass re-traverses either the full
//! backup or one of the partitioned documents; nothing is held in memory
//! beyond the mappers, the scope and the accounting.
//!
//! Overall progress: persist passes occupy fixed slices of the 0-100
//! range (issues 0-20, related records 20-35, change history 35-40,
//! attachments 40-60, custom field values 60-80); the remainder is left
//! for the embedder's post-import work.

use crate::config::ProjectImportOptions;
use crate::error::{ImportError, Result};
use crate::mapper::auto::AutomaticDataMapper;
use crate::mapper::ProjectImportMapper;
use crate::mapping::overview::BackupOverviewHandler;
use crate::mapping::{
    self, CustomFieldMapperHandler, CustomFieldOptionsMapperHandler, GroupLevelMapperHandler,
    GroupMapperHandler, IssueComponentMapperHandler, IssueLinkMapperHandler,
    IssueLinkTypeMapperHandler, IssueMapperHandler, IssueVersionMapperHandler,
    ProjectMapperHandler, ProjectRoleActorMapperHandler, RegisterUserMapperHandler,
    RoleLevelMapperHandler, SimpleEntityMapperHandler, UserMapperHandler,
};
use crate::model::ExternalUser;
use crate::parser::kind;
use crate::partition::{
    AttachmentPartitionHandler, CustomFieldValuePartitionHandler, IssuePartitionHandler,
    IssueRelatedPartitionHandler,
};
use crate::persist::handlers::{
    AttachmentPersisterHandler, ChangeItemPersisterHandler, CustomFieldValuePersisterHandler,
    IssuePersisterHandler, OutMapper, PersisterContext, RelatedEntitiesPersisterHandler,
};
use crate::persist::{ImportExecutor, ProjectImportResults};
use crate::progress::{
    shared, EntityCountProgress, NullSink, ProgressSink, SharedSink, TaskProgressInterval,
};
use crate::scope::{BackupProject, BackupSystemInformation};
use crate::storage::ImportTarget;
use crate::validation::{
    self, AttachmentFileValidatorHandler, CustomFieldValueValidatorHandler, MappingResult,
};
use crate::xml::{BackupXmlParser, ChainedHandler};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::mem;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

/// Where a run currently stands. Terminal states never resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportState {
    #[default]
    Idle,
    Partitioning,
    MappingIds,
    Validating,
    Persisting,
    Completed,
    Aborted,
}

impl ImportState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

/// What one completed run produced: validation findings plus persistence
/// accounting, serializable for callers that want a report document.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ImportReport {
    pub mapping: MappingResult,
    /// Records created per kind, in first-created order.
    pub created: Vec<(String, u64)>,
    pub errors: Vec<String>,
}

/// The partitioned intermediate documents of one run. The temp directory
/// lives as long as this does.
struct PartitionSet {
    _dir: tempfile::TempDir,
    issues: PathBuf,
    issue_count: u64,
    related: PathBuf,
    related_count: u64,
    change_items: PathBuf,
    change_item_count: u64,
    values: PathBuf,
    values_count: u64,
    attachments: Option<PathBuf>,
    attachment_count: u64,
}

/// Drives a single project import from backup document to target system.
pub struct ProjectImportManager {
    options: ProjectImportOptions,
    target: Arc<dyn ImportTarget>,
    sink: SharedSink,
    state: ImportState,
    mapping_result: Option<MappingResult>,
    results: Option<Arc<ProjectImportResults>>,
}

impl ProjectImportManager {
    #[must_use]
    pub fn new(options: ProjectImportOptions, target: Arc<dyn ImportTarget>) -> Self {
        Self {
            options,
            target,
            sink: shared(NullSink),
            state: ImportState::Idle,
            mapping_result: None,
            results: None,
        }
    }

    /// Replace the progress sink. The default discards progress.
    #[must_use]
    pub fn with_progress_sink(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.sink = shared(sink);
        self
    }

    #[must_use]
    pub fn state(&self) -> ImportState {
        self.state
    }

    /// Validation findings of the last run, once mapping completed.
    #[must_use]
    pub fn mapping_result(&self) -> Option<&MappingResult> {
        self.mapping_result.as_ref()
    }

    /// Persistence accounting of the last run, once persisting started.
    /// Populated even when the run aborted partway.
    #[must_use]
    pub fn results(&self) -> Option<&ProjectImportResults> {
        self.results.as_deref()
    }

    /// Run the whole import.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::ValidationFailed`] when the mappings are
    /// unsatisfiable (findings stay readable through
    /// [`Self::mapping_result`]), [`ImportError::Aborted`] when the error
    /// threshold tripped mid-persist (accounting stays readable through
    /// [`Self::results`]), and the underlying error for I/O, parse or
    /// storage failures.
    pub fn run(&mut self) -> Result<ImportReport> {
        if self.state != ImportState::Idle {
            return Err(ImportError::Config(
                "An import manager drives a single run; create a new one to import again."
                    .to_string(),
            ));
        }
        let outcome = self.run_inner();
        if outcome.is_err() {
            self.set_state(ImportState::Aborted);
        }
        outcome
    }

    fn run_inner(&mut self) -> Result<ImportReport> {
        self.options.validate()?;
        let parser = BackupXmlParser::new();

        info!(backup = %self.options.backup_path.display(), "reading backup overview");
        let mut overview_handler = BackupOverviewHandler::new();
        let mut chain = ChainedHandler::new();
        chain.register(&mut overview_handler);
        let document = parser.parse_file(&self.options.backup_path, &mut chain)?;
        drop(chain);
        let encoding = document.encoding.unwrap_or_else(|| "UTF-8".to_string());

        let overview = overview_handler.build();
        let Some(project) = overview.project(&self.options.project_key).cloned() else {
            return Err(ImportError::ProjectNotFound(
                self.options.backup_path.clone(),
                self.options.project_key.clone(),
            ));
        };
        let system_information = overview.system_information();
        info!(
            project = %project.key(),
            issues = project.issue_ids().len(),
            "selected project scope"
        );

        self.set_state(ImportState::Partitioning);
        let mut mapper = ProjectImportMapper::new();
        let partitions = self.partition(&parser, &project, &mut mapper, &encoding)?;

        self.set_state(ImportState::MappingIds);
        self.build_mappings(&parser, &project, &mut mapper, &partitions)?;
        self.auto_map(&project, &mut mapper)?;

        self.set_state(ImportState::Validating);
        let mapping_result =
            self.validate_mappings(&parser, &project, &mapper, system_information, &partitions)?;
        let can_import = mapping_result.can_import();
        self.mapping_result = Some(mapping_result.clone());
        if !can_import {
            return Err(ImportError::ValidationFailed);
        }

        self.set_state(ImportState::Persisting);
        let results = Arc::new(ProjectImportResults::new(self.options.error_threshold));
        self.results = Some(Arc::clone(&results));
        self.persist(
            &parser,
            &project,
            &mut mapper,
            system_information,
            &partitions,
            &results,
        )?;

        if results.is_aborted() {
            return Err(ImportError::Aborted);
        }
        self.set_state(ImportState::Completed);
        Ok(ImportReport {
            mapping: mapping_result,
            created: results.created_counts(),
            errors: results.errors(),
        })
    }

    fn set_state(&mut self, state: ImportState) {
        info!(from = ?self.state, to = ?state, "import state change");
        self.state = state;
    }

    /// One full-backup traversal that splits the scoped records into the
    /// partitioned documents and, on the same pass, registers the system
    /// entity tables the mappers need (those rows exist only in the full
    /// backup).
    fn partition(
        &self,
        parser: &BackupXmlParser,
        project: &BackupProject,
        mapper: &mut ProjectImportMapper,
        encoding: &str,
    ) -> Result<PartitionSet> {
        let dir = tempfile::tempdir()?;
        let issues = dir.path().join("issues.xml");
        let related = dir.path().join("related.xml");
        let change_items = dir.path().join("change-items.xml");
        let values = dir.path().join("custom-field-values.xml");
        let attachments = self
            .options
            .importing_attachments()
            .then(|| dir.path().join("attachments.xml"));

        let writer = |path: &PathBuf| -> Result<BufWriter<File>> {
            Ok(BufWriter::new(File::create(path)?))
        };

        let mut issue_handler = IssuePartitionHandler::new(project, writer(&issues)?, encoding);
        let mut related_handler = IssueRelatedPartitionHandler::new(
            project,
            writer(&related)?,
            writer(&change_items)?,
            encoding,
        );
        let mut value_handler =
            CustomFieldValuePartitionHandler::new(project, writer(&values)?, encoding);
        let mut attachment_handler = attachments
            .as_ref()
            .map(|path| Ok::<_, ImportError>(AttachmentPartitionHandler::new(project, writer(path)?, encoding)))
            .transpose()?;

        let mut issue_types = SimpleEntityMapperHandler::new(kind::ISSUE_TYPE, &mut mapper.issue_type);
        let mut priorities = SimpleEntityMapperHandler::new(kind::PRIORITY, &mut mapper.priority);
        let mut resolutions = SimpleEntityMapperHandler::new(kind::RESOLUTION, &mut mapper.resolution);
        let mut statuses = SimpleEntityMapperHandler::new(kind::STATUS, &mut mapper.status);
        let mut security_levels =
            SimpleEntityMapperHandler::new(kind::SECURITY_LEVEL, &mut mapper.issue_security_level);
        let mut roles = SimpleEntityMapperHandler::new(kind::PROJECT_ROLE, &mut mapper.project_role);
        let mut link_types = IssueLinkTypeMapperHandler::new(&mut mapper.issue_link_type);
        let mut users = RegisterUserMapperHandler::new(&mut mapper.user);
        let mut groups = GroupMapperHandler::new(&mut mapper.group);
        let mut options = CustomFieldOptionsMapperHandler::new(&mut mapper.custom_field_option);

        let mut chain = ChainedHandler::new();
        chain.register(&mut issue_handler);
        chain.register(&mut related_handler);
        chain.register(&mut value_handler);
        if let Some(handler) = attachment_handler.as_mut() {
            chain.register(handler);
        }
        chain.register(&mut issue_types);
        chain.register(&mut priorities);
        chain.register(&mut resolutions);
        chain.register(&mut statuses);
        chain.register(&mut security_levels);
        chain.register(&mut roles);
        chain.register(&mut link_types);
        chain.register(&mut users);
        chain.register(&mut groups);
        chain.register(&mut options);
        parser.parse_file(&self.options.backup_path, &mut chain)?;
        drop(chain);

        let set = PartitionSet {
            issues,
            issue_count: issue_handler.entity_count(),
            related,
            related_count: related_handler.entity_count(),
            change_items,
            change_item_count: related_handler.change_item_count(),
            values,
            values_count: value_handler.entity_count(),
            attachment_count: attachment_handler
                .as_ref()
                .map_or(0, |handler| handler.entity_count()),
            attachments,
            _dir: dir,
        };
        info!(
            issues = set.issue_count,
            related = set.related_count,
            change_items = set.change_item_count,
            values = set.values_count,
            attachments = set.attachment_count,
            "backup partitioned"
        );
        Ok(set)
    }

    /// Populate the mappers: pre-register the scope's own satellites,
    /// collect project-level references from the full backup, then flag
    /// requirements from the partitioned documents.
    fn build_mappings(
        &self,
        parser: &BackupXmlParser,
        project: &BackupProject,
        mapper: &mut ProjectImportMapper,
        partitions: &PartitionSet,
    ) -> Result<()> {
        for version in project.versions() {
            mapper
                .version
                .register_old_value_with_key(version.id.clone(), version.name.clone());
        }
        for component in project.components() {
            mapper
                .component
                .register_old_value_with_key(component.id.clone(), component.name.clone());
        }
        for configuration in project.custom_field_configurations() {
            mapper.custom_field.register_old_value(
                configuration.custom_field_id.clone(),
                configuration.custom_field_name.clone(),
            );
        }

        // Project rows and role memberships live only in the full backup.
        {
            let mut projects = ProjectMapperHandler::new(project, &mut mapper.project, &mut mapper.user);
            let mut role_actors = ProjectRoleActorMapperHandler::new(project, &mut mapper.project_role);
            let mut chain = ChainedHandler::new();
            chain.register(&mut projects);
            chain.register(&mut role_actors);
            parser.parse_file(&self.options.backup_path, &mut chain)?;
            drop(chain);
            drop(projects);
            for actor in role_actors.finish() {
                if actor.is_user_actor() {
                    mapper.user.flag_user_as_in_use(actor.role_actor.clone());
                } else if actor.is_group_actor() {
                    mapper.group.flag_value_as_required(actor.role_actor.clone());
                }
                mapper.add_project_role_actor(actor);
            }
        }

        {
            let mut issues = IssueMapperHandler::new(
                &mut mapper.issue,
                &mut mapper.issue_type,
                &mut mapper.priority,
                &mut mapper.resolution,
                &mut mapper.status,
                &mut mapper.issue_security_level,
                &mut mapper.custom_field,
            );
            let mut users = UserMapperHandler::new(&mut mapper.user);
            let mut chain = ChainedHandler::new();
            chain.register(&mut issues);
            chain.register(&mut users);
            parser.parse_file(&partitions.issues, &mut chain)?;
        }

        {
            let mut users = UserMapperHandler::new(&mut mapper.user);
            let mut group_levels = GroupLevelMapperHandler::new(&mut mapper.group);
            let mut role_levels = RoleLevelMapperHandler::new(&mut mapper.project_role);
            let mut versions = IssueVersionMapperHandler::new(&mut mapper.version);
            let mut components = IssueComponentMapperHandler::new(&mut mapper.component);
            let mut link_types = IssueLinkMapperHandler::new(&mut mapper.issue_link_type);
            let mut chain = ChainedHandler::new();
            chain.register(&mut users);
            chain.register(&mut group_levels);
            chain.register(&mut role_levels);
            chain.register(&mut versions);
            chain.register(&mut components);
            chain.register(&mut link_types);
            parser.parse_file(&partitions.related, &mut chain)?;
        }

        {
            let mut values = CustomFieldMapperHandler::new(
                project,
                &mut mapper.custom_field,
                &mut mapper.custom_field_option,
            );
            let mut chain = ChainedHandler::new();
            chain.register(&mut values);
            parser.parse_file(&partitions.values, &mut chain)?;
        }

        if let Some(attachments) = &partitions.attachments {
            let mut users = UserMapperHandler::new(&mut mapper.user);
            let mut chain = ChainedHandler::new();
            chain.register(&mut users);
            parser.parse_file(attachments, &mut chain)?;
        }

        mapper.custom_field.register_issue_types_in_use();
        Ok(())
    }

    /// Reconcile old ids against the target by natural key.
    fn auto_map(&self, project: &BackupProject, mapper: &mut ProjectImportMapper) -> Result<()> {
        let auto = AutomaticDataMapper::new(self.target.as_ref());
        auto.map_projects(&mut mapper.project)?;
        auto.map_issue_types(&mut mapper.issue_type)?;
        auto.map_priorities(&mut mapper.priority)?;
        auto.map_resolutions(&mut mapper.resolution)?;
        auto.map_statuses(&mut mapper.status, &mapper.issue_type)?;
        auto.map_security_levels(&mut mapper.issue_security_level, project.key())?;
        auto.map_project_roles(&mut mapper.project_role)?;
        auto.map_groups(&mut mapper.group)?;
        auto.map_users(&mut mapper.user)?;
        auto.map_issue_link_types(&mut mapper.issue_link_type)?;
        auto.map_custom_fields(project, &mut mapper.custom_field, &mapper.issue_type)?;
        auto.map_custom_field_options(&mut mapper.custom_field_option, &mapper.custom_field)?;
        Ok(())
    }

    fn validate_mappings(
        &self,
        parser: &BackupXmlParser,
        project: &BackupProject,
        mapper: &ProjectImportMapper,
        system_information: &BackupSystemInformation,
        partitions: &PartitionSet,
    ) -> Result<MappingResult> {
        let mut result = MappingResult::new();
        result.add_family(
            "issue types",
            validation::validate_required(&mapper.issue_type, "issue type"),
        );
        result.add_family(
            "priorities",
            validation::validate_required(&mapper.priority, "priority"),
        );
        result.add_family(
            "resolutions",
            validation::validate_required(&mapper.resolution, "resolution"),
        );
        result.add_family(
            "statuses",
            validation::validate_statuses(&mapper.status, &mapper.issue_type),
        );
        result.add_family(
            "issue security levels",
            validation::validate_optional(&mapper.issue_security_level, "issue security level"),
        );
        result.add_family("groups", validation::validate_optional(&mapper.group, "group"));
        result.add_family(
            "project roles",
            validation::validate_optional(&mapper.project_role, "project role"),
        );
        result.add_family(
            "issue link types",
            validation::validate_link_types(&mapper.issue_link_type),
        );
        result.add_family("users", validation::validate_users(&mapper.user));
        result.add_family(
            "custom fields",
            validation::validate_custom_fields(&mapper.custom_field),
        );
        result.add_family(
            "custom field options",
            validation::validate_custom_field_options(
                &mapper.custom_field_option,
                &mapper.custom_field,
            ),
        );

        {
            let mut values = CustomFieldValueValidatorHandler::new(
                &mapper.custom_field,
                &mapper.issue_type,
                self.target.as_ref(),
            );
            let mut chain = ChainedHandler::new();
            chain.register(&mut values);
            parser.parse_file(&partitions.values, &mut chain)?;
            drop(chain);
            result.add_family("custom field values", values.into_message_set());
        }

        if let (Some(attachments), Some(attachment_path)) =
            (&partitions.attachments, &self.options.attachment_path)
        {
            let mut files = AttachmentFileValidatorHandler::new(
                attachment_path,
                project.key(),
                system_information,
            );
            let mut chain = ChainedHandler::new();
            chain.register(&mut files);
            parser.parse_file(attachments, &mut chain)?;
            drop(chain);
            result.add_family("attachments", files.into_message_set());
        }

        for warning in result.warnings() {
            warn!("{warning}");
        }
        Ok(result)
    }

    /// Make sure the scoped project exists in the target and its details,
    /// satellites and memberships match the backup. Returns the new
    /// project id.
    fn ensure_project(
        &self,
        project: &BackupProject,
        mapper: &mut ProjectImportMapper,
        results: &ProjectImportResults,
    ) -> Result<String> {
        let old_id = project.project().id.clone();
        if mapper.project.new_id_for(&old_id).is_none() {
            match self.target.create_project(project.project())? {
                Some(new_id) => {
                    info!(project = %project.key(), new_id, "created project");
                    results.increment_created(kind::PROJECT);
                    mapper.project.map_value(old_id.clone(), new_id);
                }
                None => {
                    // Raced into existence; fall back to lookup.
                    if let Some(new_id) = self.target.project_id_by_key(project.key())? {
                        mapper.project.map_value(old_id.clone(), new_id);
                    }
                }
            }
        } else if self.options.overwrite_project_details {
            self.target.update_project(project.project())?;
        }
        let Some(new_project_id) = mapper.project.new_id_for(&old_id).map(str::to_string) else {
            return Err(ImportError::Config(format!(
                "The project '{}' could not be created in the target system.",
                project.key()
            )));
        };

        for version in project.versions() {
            match self.target.create_version(&new_project_id, version)? {
                Some(new_id) => {
                    results.increment_created(kind::VERSION);
                    mapper.version.map_value(version.id.clone(), new_id);
                }
                None => warn!(version = %version.name, "version was not created, references will be dropped"),
            }
        }
        for component in project.components() {
            match self.target.create_component(&new_project_id, component)? {
                Some(new_id) => {
                    results.increment_created(kind::COMPONENT);
                    mapper.component.map_value(component.id.clone(), new_id);
                }
                None => warn!(component = %component.name, "component was not created, references will be dropped"),
            }
        }

        self.replay_role_actors(&new_project_id, mapper, results)?;
        Ok(new_project_id)
    }

    /// Replace the target project's role memberships with the backup's.
    /// Members whose user or group does not exist are skipped, not errors.
    fn replay_role_actors(
        &self,
        new_project_id: &str,
        mapper: &ProjectImportMapper,
        results: &ProjectImportResults,
    ) -> Result<()> {
        self.target.clear_role_actors(new_project_id)?;
        for actor in mapper.project_role_actors() {
            let Some(new_role_id) = mapper.project_role.new_id_for(&actor.role_id) else {
                continue;
            };
            let exists = if actor.is_user_actor() {
                self.target.user_exists(&actor.role_actor)?
            } else if actor.is_group_actor() {
                self.target.group_exists(&actor.role_actor)?
            } else {
                false
            };
            if !exists {
                warn!(
                    actor = %actor.role_actor,
                    role = %mapper.project_role.display_name(&actor.role_id),
                    "role member does not exist in the target, skipped"
                );
                continue;
            }
            if self.target.add_role_actor(
                new_project_id,
                new_role_id,
                &actor.role_type,
                &actor.role_actor,
            )? {
                results.increment_created(kind::PROJECT_ROLE_ACTOR);
            }
        }
        Ok(())
    }

    /// Create the accounts the backup carries details for that the target
    /// is missing, then map them by identity.
    fn create_missing_users(
        &self,
        mapper: &mut ProjectImportMapper,
        results: &ProjectImportResults,
    ) -> Result<()> {
        let to_create: Vec<ExternalUser> =
            mapper.user.users_to_auto_create().into_iter().cloned().collect();
        for user in to_create {
            match self.target.create_user(&user) {
                Ok(created) => {
                    if created {
                        results.increment_created(kind::USER);
                    }
                    mapper.user.map_user(user.name.clone());
                }
                Err(err) => {
                    warn!(%err, user = %user.name, "user creation failed");
                    results.add_error(format!(
                        "There was a problem saving user '{}'.",
                        user.name
                    ));
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_lines)]
    fn persist(
        &self,
        parser: &BackupXmlParser,
        project: &BackupProject,
        mapper: &mut ProjectImportMapper,
        system_information: &BackupSystemInformation,
        partitions: &PartitionSet,
        results: &Arc<ProjectImportResults>,
    ) -> Result<()> {
        let interval = TaskProgressInterval::full(Arc::clone(&self.sink));
        self.create_missing_users(mapper, results)?;
        let new_project_id = self.ensure_project(project, mapper, results)?;

        // Issues.
        let issue_out: OutMapper = Arc::new(Mutex::new(mem::take(&mut mapper.issue)));
        let largest_issue_number;
        {
            let executor = ImportExecutor::with_workers(self.options.workers);
            let mut handler = IssuePersisterHandler::new(
                self.context(mapper, system_information, results, &executor),
                Arc::clone(&issue_out),
            );
            let mut chain = ChainedHandler::with_progress(EntityCountProgress::new(
                interval.sub_interval(0, 20),
                "Issues",
                partitions.issue_count,
            ));
            chain.register(&mut handler);
            parser.parse_file(&partitions.issues, &mut chain)?;
            drop(chain);
            largest_issue_number = handler.largest_issue_key_number();
            drop(handler);
            executor.drain();
        }
        mapper.issue = reclaim(issue_out)?;

        let backup_counter = project
            .project()
            .counter
            .as_deref()
            .and_then(|counter| counter.parse::<u64>().ok())
            .unwrap_or(0);
        let counter = backup_counter.max(largest_issue_number);
        if counter > 0 {
            self.target.update_project_counter(&new_project_id, counter)?;
        }

        // Comments, worklogs, links, associations, properties, labels and
        // change groups.
        let comment_out: OutMapper = Arc::new(Mutex::new(mem::take(&mut mapper.comment)));
        let link_out: OutMapper = Arc::new(Mutex::new(mem::take(&mut mapper.issue_link)));
        let group_out: OutMapper = Arc::new(Mutex::new(mem::take(&mut mapper.change_group)));
        {
            let executor = ImportExecutor::with_workers(self.options.workers);
            let mut handler = RelatedEntitiesPersisterHandler::new(
                self.context(mapper, system_information, results, &executor),
                Arc::clone(&comment_out),
                Arc::clone(&link_out),
                Arc::clone(&group_out),
            );
            let mut chain = ChainedHandler::with_progress(EntityCountProgress::new(
                interval.sub_interval(20, 35),
                "Related records",
                partitions.related_count,
            ));
            chain.register(&mut handler);
            parser.parse_file(&partitions.related, &mut chain)?;
            drop(chain);
            drop(handler);
            executor.drain();
        }
        mapper.comment = reclaim(comment_out)?;
        mapper.issue_link = reclaim(link_out)?;
        mapper.change_group = reclaim(group_out)?;

        // Change items, now that their groups are mapped.
        {
            let executor = ImportExecutor::with_workers(self.options.workers);
            let mut handler = ChangeItemPersisterHandler::new(self.context(
                mapper,
                system_information,
                results,
                &executor,
            ));
            let mut chain = ChainedHandler::with_progress(EntityCountProgress::new(
                interval.sub_interval(35, 40),
                "Change history",
                partitions.change_item_count,
            ));
            chain.register(&mut handler);
            parser.parse_file(&partitions.change_items, &mut chain)?;
            drop(chain);
            drop(handler);
            executor.drain();
        }

        // Attachments.
        if let (Some(attachments), Some(attachment_path)) =
            (&partitions.attachments, &self.options.attachment_path)
        {
            let attachment_out: OutMapper = Arc::new(Mutex::new(mem::take(&mut mapper.attachment)));
            {
                let executor = ImportExecutor::with_workers(self.options.workers);
                let mut handler = AttachmentPersisterHandler::new(
                    self.context(mapper, system_information, results, &executor),
                    Arc::clone(&attachment_out),
                    attachment_path.clone(),
                    project.key(),
                );
                let mut chain = ChainedHandler::with_progress(EntityCountProgress::new(
                    interval.sub_interval(40, 60),
                    "Attachments",
                    partitions.attachment_count,
                ));
                chain.register(&mut handler);
                parser.parse_file(attachments, &mut chain)?;
                drop(chain);
                drop(handler);
                executor.drain();
            }
            mapper.attachment = reclaim(attachment_out)?;
        }

        // Custom field values.
        let option_backed: HashSet<String> = project
            .custom_field_configurations()
            .iter()
            .filter(|configuration| mapping::is_option_type(&configuration.type_key))
            .map(|configuration| configuration.custom_field_id.clone())
            .collect();
        let value_out: OutMapper = Arc::new(Mutex::new(mem::take(&mut mapper.custom_field_value)));
        {
            let executor = ImportExecutor::with_workers(self.options.workers);
            let mut handler = CustomFieldValuePersisterHandler::new(
                self.context(mapper, system_information, results, &executor),
                Arc::clone(&value_out),
                option_backed,
            );
            let mut chain = ChainedHandler::with_progress(EntityCountProgress::new(
                interval.sub_interval(60, 80),
                "Custom field values",
                partitions.values_count,
            ));
            chain.register(&mut handler);
            parser.parse_file(&partitions.values, &mut chain)?;
            drop(chain);
            drop(handler);
            executor.drain();
        }
        mapper.custom_field_value = reclaim(value_out)?;

        if let Ok(mut sink) = self.sink.lock() {
            sink.make_progress(80, "Import", "Project data imported");
        }
        Ok(())
    }

    fn context<'a>(
        &'a self,
        mapper: &'a ProjectImportMapper,
        system_information: &'a BackupSystemInformation,
        results: &Arc<ProjectImportResults>,
        executor: &'a ImportExecutor,
    ) -> PersisterContext<'a> {
        PersisterContext {
            mapper,
            system_information,
            target: Arc::clone(&self.target),
            results: Arc::clone(results),
            executor,
        }
    }
}

/// Take the sole ownership of a drained out-mapper back.
fn reclaim(out: OutMapper) -> Result<crate::mapper::SimpleIdMapper> {
    Arc::try_unwrap(out)
        .map(|mutex| mutex.into_inner().unwrap_or_else(PoisonError::into_inner))
        .map_err(|_| {
            ImportError::Config("a persister job outlived its pass".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(ImportState::Completed.is_terminal());
        assert!(ImportState::Aborted.is_terminal());
        assert!(!ImportState::Persisting.is_terminal());
        assert_eq!(ImportState::default(), ImportState::Idle);
    }
}
