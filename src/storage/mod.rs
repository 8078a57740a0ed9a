//! Target system access.
//!
//! [`ImportTarget`] is the seam between the import pipeline and whatever
//! system records are created in. Validation only reads through it;
//! persistence creates through it and the target stays authoritative for
//! new ids. [`sqlite::SqliteTarget`] is the bundled reference backend.
//!
//! # Submodules
//!
//! - [`schema`] - Reference target database schema
//! - [`sqlite`] - `SQLite` implementation of [`ImportTarget`]

pub mod schema;
pub mod sqlite;

pub use sqlite::SqliteTarget;

use crate::error::Result;
use crate::model::{
    ExternalAttachment, ExternalComponent, ExternalIssue, ExternalProject, ExternalUser,
    ExternalVersion,
};
use crate::parser::EntityRepresentation;
use std::path::Path;

/// A custom field as the target knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetCustomField {
    pub id: String,
    pub name: String,
    pub type_key: String,
}

/// An issue link type as the target knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLinkType {
    pub id: String,
    pub name: String,
    pub style: Option<String>,
}

/// The live system records are validated against and created in.
///
/// Lookups are by natural key (name) and return the target's new id.
/// Creation methods return `Ok(None)` when the target declines the record;
/// the caller records that as a per-record error, not a failure of the run.
pub trait ImportTarget: Send + Sync {
    fn user_exists(&self, name: &str) -> Result<bool>;
    fn group_exists(&self, name: &str) -> Result<bool>;
    fn create_user(&self, user: &ExternalUser) -> Result<bool>;

    fn project_id_by_key(&self, key: &str) -> Result<Option<String>>;
    fn create_project(&self, project: &ExternalProject) -> Result<Option<String>>;
    /// Overwrite name, description, url, lead of an existing project.
    fn update_project(&self, project: &ExternalProject) -> Result<()>;
    /// Raise the project's issue counter; never lowers it.
    fn update_project_counter(&self, new_project_id: &str, counter: u64) -> Result<()>;

    fn issue_type_id_by_name(&self, name: &str) -> Result<Option<String>>;
    fn priority_id_by_name(&self, name: &str) -> Result<Option<String>>;
    fn resolution_id_by_name(&self, name: &str) -> Result<Option<String>>;
    fn status_id_by_name(&self, name: &str) -> Result<Option<String>>;
    /// True when the workflow for the issue type can hold this status.
    fn status_valid_for_issue_type(
        &self,
        new_status_id: &str,
        new_issue_type_id: &str,
    ) -> Result<bool>;
    fn security_level_id_by_name(&self, project_key: &str, name: &str) -> Result<Option<String>>;
    fn link_type_by_name(&self, name: &str) -> Result<Option<TargetLinkType>>;
    fn project_role_id_by_name(&self, name: &str) -> Result<Option<String>>;

    fn custom_field_by_name(&self, name: &str) -> Result<Option<TargetCustomField>>;
    /// True when the field's configuration covers this issue type. This is
    /// the expensive lookup callers memoize.
    fn custom_field_valid_for_issue_type(
        &self,
        new_field_id: &str,
        new_issue_type_id: &str,
    ) -> Result<bool>;
    fn custom_field_option_id(
        &self,
        new_field_id: &str,
        new_parent_option_id: Option<&str>,
        value: &str,
    ) -> Result<Option<String>>;

    fn create_version(
        &self,
        new_project_id: &str,
        version: &ExternalVersion,
    ) -> Result<Option<String>>;
    fn create_component(
        &self,
        new_project_id: &str,
        component: &ExternalComponent,
    ) -> Result<Option<String>>;

    fn clear_role_actors(&self, new_project_id: &str) -> Result<()>;
    fn add_role_actor(
        &self,
        new_project_id: &str,
        new_role_id: &str,
        role_type: &str,
        actor: &str,
    ) -> Result<bool>;

    /// Create an issue whose foreign ids have already been rewritten.
    /// The issue keeps its backup key.
    fn create_issue(&self, issue: &ExternalIssue) -> Result<Option<String>>;
    /// Create a related record from its transformed representation.
    fn create_entity(&self, representation: &EntityRepresentation) -> Result<Option<String>>;
    /// Create an attachment record and take custody of the file at `source`.
    fn create_attachment(
        &self,
        attachment: &ExternalAttachment,
        source: &Path,
    ) -> Result<Option<String>>;
}
