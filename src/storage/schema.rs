//! Database schema for the `SQLite` reference target.

use rusqlite::{Connection, Result};

pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The complete SQL schema for the reference target database.
///
/// The target holds the configuration entities an import validates against
/// (users, groups, issue types, statuses, custom fields) plus the tables
/// created records land in. `id` columns are INTEGER so the target stays
/// authoritative for id generation.
pub const SCHEMA_SQL: &str = r"
    CREATE TABLE IF NOT EXISTS users (
        name TEXT PRIMARY KEY,
        full_name TEXT,
        email TEXT
    );

    CREATE TABLE IF NOT EXISTS groups (
        name TEXT PRIMARY KEY
    );

    CREATE TABLE IF NOT EXISTS projects (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        key TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        description TEXT,
        url TEXT,
        lead TEXT,
        assignee_type TEXT,
        counter INTEGER NOT NULL DEFAULT 0,
        imported_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS issue_types (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS priorities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS resolutions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS statuses (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );

    -- A status row with no entries here is valid for every issue type.
    CREATE TABLE IF NOT EXISTS status_issue_types (
        status_id INTEGER NOT NULL REFERENCES statuses(id),
        issue_type_id INTEGER NOT NULL REFERENCES issue_types(id),
        PRIMARY KEY (status_id, issue_type_id)
    );

    CREATE TABLE IF NOT EXISTS security_levels (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_key TEXT NOT NULL,
        name TEXT NOT NULL,
        UNIQUE (project_key, name)
    );

    CREATE TABLE IF NOT EXISTS link_types (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        style TEXT
    );

    CREATE TABLE IF NOT EXISTS project_roles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS role_actors (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id INTEGER NOT NULL REFERENCES projects(id),
        role_id INTEGER NOT NULL REFERENCES project_roles(id),
        role_type TEXT NOT NULL,
        actor TEXT NOT NULL,
        UNIQUE (project_id, role_id, role_type, actor)
    );

    CREATE TABLE IF NOT EXISTS custom_fields (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        type_key TEXT NOT NULL
    );

    -- A field with no entries here applies to every issue type.
    CREATE TABLE IF NOT EXISTS custom_field_issue_types (
        field_id INTEGER NOT NULL REFERENCES custom_fields(id),
        issue_type_id INTEGER NOT NULL REFERENCES issue_types(id),
        PRIMARY KEY (field_id, issue_type_id)
    );

    CREATE TABLE IF NOT EXISTS custom_field_options (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        field_id INTEGER NOT NULL REFERENCES custom_fields(id),
        parent_id INTEGER REFERENCES custom_field_options(id),
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS versions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id INTEGER NOT NULL REFERENCES projects(id),
        name TEXT NOT NULL,
        description TEXT,
        sequence INTEGER,
        released INTEGER NOT NULL DEFAULT 0,
        archived INTEGER NOT NULL DEFAULT 0,
        release_date TEXT,
        UNIQUE (project_id, name)
    );

    CREATE TABLE IF NOT EXISTS components (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id INTEGER NOT NULL REFERENCES projects(id),
        name TEXT NOT NULL,
        description TEXT,
        lead TEXT,
        assignee_type TEXT,
        UNIQUE (project_id, name)
    );

    CREATE TABLE IF NOT EXISTS issues (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        key TEXT NOT NULL UNIQUE,
        project_id INTEGER NOT NULL REFERENCES projects(id),
        issue_type TEXT NOT NULL,
        summary TEXT NOT NULL DEFAULT '',
        description TEXT,
        environment TEXT,
        reporter TEXT,
        assignee TEXT,
        priority TEXT,
        status TEXT,
        resolution TEXT,
        security_level TEXT,
        created TEXT,
        updated TEXT,
        due_date TEXT,
        resolution_date TEXT,
        votes TEXT,
        original_estimate TEXT,
        estimate TEXT,
        time_spent TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_issues_project ON issues(project_id);

    -- Related records land here as (kind, attribute JSON) rows; the import
    -- only needs the generated id back.
    CREATE TABLE IF NOT EXISTS entities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL,
        attributes TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_entities_kind ON entities(kind);

    CREATE TABLE IF NOT EXISTS attachments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        issue_id INTEGER NOT NULL,
        file_name TEXT NOT NULL,
        attacher TEXT,
        created TEXT,
        stored_path TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY
    );
";

/// Apply the schema to a fresh or existing database.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}
