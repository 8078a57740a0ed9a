//! `SQLite` implementation of the import target.
//!
//! A single connection behind a mutex; persister handlers on worker
//! threads share the target through `Arc<dyn ImportTarget>`. New ids are
//! SQLite rowids rendered as strings.

use crate::error::Result;
use crate::model::{
    ExternalAttachment, ExternalComponent, ExternalIssue, ExternalProject, ExternalUser,
    ExternalVersion,
};
use crate::parser::EntityRepresentation;
use crate::storage::schema::apply_schema;
use crate::storage::{ImportTarget, TargetCustomField, TargetLinkType};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// SQLite-backed reference target.
#[derive(Debug)]
pub struct SqliteTarget {
    conn: Mutex<Connection>,
    attachment_dir: Option<PathBuf>,
}

impl SqliteTarget {
    /// Open a target database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema
    /// application fails.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        apply_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            attachment_dir: None,
        })
    }

    /// Open an in-memory target for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            attachment_dir: None,
        })
    }

    /// Store attachment files under `dir` instead of recording their
    /// source path.
    #[must_use]
    pub fn with_attachment_dir(mut self, dir: PathBuf) -> Self {
        self.attachment_dir = Some(dir);
        self
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn id_by_name(&self, table: &str, name: &str) -> Result<Option<String>> {
        let conn = self.conn();
        let sql = format!("SELECT id FROM {table} WHERE name = ?");
        let id: Option<i64> = conn
            .query_row(&sql, [name], |row| row.get(0))
            .optional()?;
        Ok(id.map(|id| id.to_string()))
    }

    fn insert_named(&self, table: &str, name: &str) -> Result<String> {
        let conn = self.conn();
        let sql = format!("INSERT INTO {table} (name) VALUES (?)");
        conn.execute(&sql, [name])?;
        Ok(conn.last_insert_rowid().to_string())
    }

    /// Seed an issue type. Admin surface for setting up a target.
    pub fn add_issue_type(&self, name: &str) -> Result<String> {
        self.insert_named("issue_types", name)
    }

    pub fn add_priority(&self, name: &str) -> Result<String> {
        self.insert_named("priorities", name)
    }

    pub fn add_resolution(&self, name: &str) -> Result<String> {
        self.insert_named("resolutions", name)
    }

    /// Seed a status. Empty `issue_type_ids` means valid everywhere.
    pub fn add_status(&self, name: &str, issue_type_ids: &[&str]) -> Result<String> {
        let id = self.insert_named("statuses", name)?;
        let conn = self.conn();
        for issue_type_id in issue_type_ids {
            conn.execute(
                "INSERT INTO status_issue_types (status_id, issue_type_id) VALUES (?, ?)",
                params![id, issue_type_id],
            )?;
        }
        Ok(id)
    }

    pub fn add_security_level(&self, project_key: &str, name: &str) -> Result<String> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO security_levels (project_key, name) VALUES (?, ?)",
            params![project_key, name],
        )?;
        Ok(conn.last_insert_rowid().to_string())
    }

    pub fn add_link_type(&self, name: &str, style: Option<&str>) -> Result<String> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO link_types (name, style) VALUES (?, ?)",
            params![name, style],
        )?;
        Ok(conn.last_insert_rowid().to_string())
    }

    pub fn add_project_role(&self, name: &str) -> Result<String> {
        self.insert_named("project_roles", name)
    }

    pub fn add_group(&self, name: &str) -> Result<()> {
        self.conn()
            .execute("INSERT OR IGNORE INTO groups (name) VALUES (?)", [name])?;
        Ok(())
    }

    /// Seed a custom field. Empty `issue_type_ids` means it applies to
    /// every issue type.
    pub fn add_custom_field(
        &self,
        name: &str,
        type_key: &str,
        issue_type_ids: &[&str],
    ) -> Result<String> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO custom_fields (name, type_key) VALUES (?, ?)",
            params![name, type_key],
        )?;
        let id = conn.last_insert_rowid().to_string();
        for issue_type_id in issue_type_ids {
            conn.execute(
                "INSERT INTO custom_field_issue_types (field_id, issue_type_id) VALUES (?, ?)",
                params![id, issue_type_id],
            )?;
        }
        Ok(id)
    }

    pub fn add_custom_field_option(
        &self,
        field_id: &str,
        parent_id: Option<&str>,
        value: &str,
    ) -> Result<String> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO custom_field_options (field_id, parent_id, value) VALUES (?, ?, ?)",
            params![field_id, parent_id, value],
        )?;
        Ok(conn.last_insert_rowid().to_string())
    }

    /// Count rows created for a kind via `create_entity`. Test support.
    pub fn entity_count(&self, kind: &str) -> Result<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM entities WHERE kind = ?",
            [kind],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    pub fn issue_count(&self) -> Result<u64> {
        let count: i64 =
            self.conn()
                .query_row("SELECT COUNT(*) FROM issues", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

impl ImportTarget for SqliteTarget {
    fn user_exists(&self, name: &str) -> Result<bool> {
        let found: Option<String> = self
            .conn()
            .query_row("SELECT name FROM users WHERE name = ?", [name], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    fn group_exists(&self, name: &str) -> Result<bool> {
        let found: Option<String> = self
            .conn()
            .query_row("SELECT name FROM groups WHERE name = ?", [name], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    fn create_user(&self, user: &ExternalUser) -> Result<bool> {
        let changed = self.conn().execute(
            "INSERT OR IGNORE INTO users (name, full_name, email) VALUES (?, ?, ?)",
            params![user.name, user.full_name, user.email],
        )?;
        Ok(changed > 0)
    }

    fn project_id_by_key(&self, key: &str) -> Result<Option<String>> {
        let id: Option<i64> = self
            .conn()
            .query_row("SELECT id FROM projects WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(id.map(|id| id.to_string()))
    }

    fn create_project(&self, project: &ExternalProject) -> Result<Option<String>> {
        let conn = self.conn();
        let changed = conn.execute(
            "INSERT OR IGNORE INTO projects
             (key, name, description, url, lead, assignee_type, imported_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                project.key,
                project.name,
                project.description,
                project.url,
                project.lead,
                project.assignee_type,
                Utc::now().to_rfc3339()
            ],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        debug!(key = %project.key, "created project");
        Ok(Some(conn.last_insert_rowid().to_string()))
    }

    fn update_project(&self, project: &ExternalProject) -> Result<()> {
        self.conn().execute(
            "UPDATE projects SET name = ?, description = ?, url = ?, lead = ? WHERE key = ?",
            params![
                project.name,
                project.description,
                project.url,
                project.lead,
                project.key
            ],
        )?;
        Ok(())
    }

    fn update_project_counter(&self, new_project_id: &str, counter: u64) -> Result<()> {
        self.conn().execute(
            "UPDATE projects SET counter = MAX(counter, ?) WHERE id = ?",
            params![counter, new_project_id],
        )?;
        Ok(())
    }

    fn issue_type_id_by_name(&self, name: &str) -> Result<Option<String>> {
        self.id_by_name("issue_types", name)
    }

    fn priority_id_by_name(&self, name: &str) -> Result<Option<String>> {
        self.id_by_name("priorities", name)
    }

    fn resolution_id_by_name(&self, name: &str) -> Result<Option<String>> {
        self.id_by_name("resolutions", name)
    }

    fn status_id_by_name(&self, name: &str) -> Result<Option<String>> {
        self.id_by_name("statuses", name)
    }

    fn status_valid_for_issue_type(
        &self,
        new_status_id: &str,
        new_issue_type_id: &str,
    ) -> Result<bool> {
        let conn = self.conn();
        let constrained: i64 = conn.query_row(
            "SELECT COUNT(*) FROM status_issue_types WHERE status_id = ?",
            [new_status_id],
            |row| row.get(0),
        )?;
        if constrained == 0 {
            return Ok(true);
        }
        let matched: i64 = conn.query_row(
            "SELECT COUNT(*) FROM status_issue_types WHERE status_id = ? AND issue_type_id = ?",
            params![new_status_id, new_issue_type_id],
            |row| row.get(0),
        )?;
        Ok(matched > 0)
    }

    fn security_level_id_by_name(&self, project_key: &str, name: &str) -> Result<Option<String>> {
        let id: Option<i64> = self
            .conn()
            .query_row(
                "SELECT id FROM security_levels WHERE project_key = ? AND name = ?",
                params![project_key, name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id.map(|id| id.to_string()))
    }

    fn link_type_by_name(&self, name: &str) -> Result<Option<TargetLinkType>> {
        let link_type = self
            .conn()
            .query_row(
                "SELECT id, name, style FROM link_types WHERE name = ?",
                [name],
                |row| {
                    Ok(TargetLinkType {
                        id: row.get::<_, i64>(0)?.to_string(),
                        name: row.get(1)?,
                        style: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(link_type)
    }

    fn project_role_id_by_name(&self, name: &str) -> Result<Option<String>> {
        self.id_by_name("project_roles", name)
    }

    fn custom_field_by_name(&self, name: &str) -> Result<Option<TargetCustomField>> {
        let field = self
            .conn()
            .query_row(
                "SELECT id, name, type_key FROM custom_fields WHERE name = ?",
                [name],
                |row| {
                    Ok(TargetCustomField {
                        id: row.get::<_, i64>(0)?.to_string(),
                        name: row.get(1)?,
                        type_key: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(field)
    }

    fn custom_field_valid_for_issue_type(
        &self,
        new_field_id: &str,
        new_issue_type_id: &str,
    ) -> Result<bool> {
        let conn = self.conn();
        let constrained: i64 = conn.query_row(
            "SELECT COUNT(*) FROM custom_field_issue_types WHERE field_id = ?",
            [new_field_id],
            |row| row.get(0),
        )?;
        if constrained == 0 {
            return Ok(true);
        }
        let matched: i64 = conn.query_row(
            "SELECT COUNT(*) FROM custom_field_issue_types
             WHERE field_id = ? AND issue_type_id = ?",
            params![new_field_id, new_issue_type_id],
            |row| row.get(0),
        )?;
        Ok(matched > 0)
    }

    fn custom_field_option_id(
        &self,
        new_field_id: &str,
        new_parent_option_id: Option<&str>,
        value: &str,
    ) -> Result<Option<String>> {
        let conn = self.conn();
        let id: Option<i64> = match new_parent_option_id {
            Some(parent) => conn
                .query_row(
                    "SELECT id FROM custom_field_options
                     WHERE field_id = ? AND parent_id = ? AND value = ?",
                    params![new_field_id, parent, value],
                    |row| row.get(0),
                )
                .optional()?,
            None => conn
                .query_row(
                    "SELECT id FROM custom_field_options
                     WHERE field_id = ? AND parent_id IS NULL AND value = ?",
                    params![new_field_id, value],
                    |row| row.get(0),
                )
                .optional()?,
        };
        Ok(id.map(|id| id.to_string()))
    }

    fn create_version(
        &self,
        new_project_id: &str,
        version: &ExternalVersion,
    ) -> Result<Option<String>> {
        let conn = self.conn();
        let changed = conn.execute(
            "INSERT OR IGNORE INTO versions
             (project_id, name, description, sequence, released, archived, release_date)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                new_project_id,
                version.name,
                version.description,
                version.sequence,
                version.released,
                version.archived,
                version.release_date
            ],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        Ok(Some(conn.last_insert_rowid().to_string()))
    }

    fn create_component(
        &self,
        new_project_id: &str,
        component: &ExternalComponent,
    ) -> Result<Option<String>> {
        let conn = self.conn();
        let changed = conn.execute(
            "INSERT OR IGNORE INTO components
             (project_id, name, description, lead, assignee_type)
             VALUES (?, ?, ?, ?, ?)",
            params![
                new_project_id,
                component.name,
                component.description,
                component.lead,
                component.assignee_type
            ],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        Ok(Some(conn.last_insert_rowid().to_string()))
    }

    fn clear_role_actors(&self, new_project_id: &str) -> Result<()> {
        self.conn().execute(
            "DELETE FROM role_actors WHERE project_id = ?",
            [new_project_id],
        )?;
        Ok(())
    }

    fn add_role_actor(
        &self,
        new_project_id: &str,
        new_role_id: &str,
        role_type: &str,
        actor: &str,
    ) -> Result<bool> {
        let changed = self.conn().execute(
            "INSERT OR IGNORE INTO role_actors (project_id, role_id, role_type, actor)
             VALUES (?, ?, ?, ?)",
            params![new_project_id, new_role_id, role_type, actor],
        )?;
        Ok(changed > 0)
    }

    fn create_issue(&self, issue: &ExternalIssue) -> Result<Option<String>> {
        let conn = self.conn();
        let changed = conn.execute(
            "INSERT OR IGNORE INTO issues
             (key, project_id, issue_type, summary, description, environment, reporter,
              assignee, priority, status, resolution, security_level, created, updated,
              due_date, resolution_date, votes, original_estimate, estimate, time_spent)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                issue.key,
                issue.project_id,
                issue.issue_type,
                issue.summary,
                issue.description,
                issue.environment,
                issue.reporter,
                issue.assignee,
                issue.priority,
                issue.status,
                issue.resolution,
                issue.security_level,
                issue.created,
                issue.updated,
                issue.due_date,
                issue.resolution_date,
                issue.votes,
                issue.original_estimate,
                issue.estimate,
                issue.time_spent
            ],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        Ok(Some(conn.last_insert_rowid().to_string()))
    }

    fn create_entity(&self, representation: &EntityRepresentation) -> Result<Option<String>> {
        let attributes = serde_json::to_string(representation.values())
            .map_err(|e| crate::error::ImportError::parse(representation.entity_name(), e.to_string()))?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO entities (kind, attributes) VALUES (?, ?)",
            params![representation.entity_name(), attributes],
        )?;
        Ok(Some(conn.last_insert_rowid().to_string()))
    }

    fn create_attachment(
        &self,
        attachment: &ExternalAttachment,
        source: &Path,
    ) -> Result<Option<String>> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO attachments (issue_id, file_name, attacher, created, stored_path)
             VALUES (?, ?, ?, ?, ?)",
            params![
                attachment.issue_id,
                attachment.file_name,
                attachment.attacher,
                attachment.created,
                source.to_string_lossy()
            ],
        )?;
        let id = conn.last_insert_rowid().to_string();
        drop(conn);
        if let Some(dir) = &self.attachment_dir {
            let stored = dir.join(format!("{id}-{}", attachment.file_name));
            std::fs::copy(source, &stored)?;
            self.conn().execute(
                "UPDATE attachments SET stored_path = ? WHERE id = ?",
                params![stored.to_string_lossy(), id],
            )?;
        }
        Ok(Some(id))
    }
}
