#![allow(dead_code)]

use project_import::storage::SqliteTarget;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Once;
use tempfile::TempDir;

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(project_import::logging::init_test_logging);
}

/// Builder for backup documents in the flat record format.
pub struct BackupXml {
    body: String,
}

impl BackupXml {
    #[must_use]
    pub fn new() -> Self {
        Self {
            body: String::new(),
        }
    }

    #[must_use]
    pub fn record(mut self, kind: &str, attributes: &[(&str, &str)]) -> Self {
        let _ = write!(self.body, "    <{kind}");
        for (name, value) in attributes {
            let _ = write!(self.body, " {name}=\"{value}\"");
        }
        let _ = writeln!(self.body, "/>");
        self
    }

    #[must_use]
    pub fn build(self) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<entity-engine-xml>\n{}</entity-engine-xml>\n",
            self.body
        )
    }

    pub fn write_to(self, dir: &TempDir) -> PathBuf {
        let path = dir.path().join("backup.xml");
        std::fs::write(&path, self.build()).expect("Failed to write backup document");
        path
    }
}

impl Default for BackupXml {
    fn default() -> Self {
        Self::new()
    }
}

/// The canonical two-project backup most end-to-end tests run against.
///
/// Project `MKY` (old id 10001) owns issues 10000 (`MKY-1`, fully loaded)
/// and 10010 (`MKY-2`); project `HSP` owns issue 10020 which must never
/// leak into an `MKY` import.
#[must_use]
pub fn monkey_backup() -> BackupXml {
    BackupXml::new()
        .record(
            "Project",
            &[
                ("id", "10001"),
                ("key", "MKY"),
                ("name", "Monkey"),
                ("lead", "fred"),
                ("counter", "12"),
            ],
        )
        .record(
            "Project",
            &[("id", "10002"), ("key", "HSP"), ("name", "Homosapien")],
        )
        .record("IssueType", &[("id", "1"), ("name", "Bug")])
        .record("Priority", &[("id", "3"), ("name", "Major")])
        .record("Resolution", &[("id", "5"), ("name", "Fixed")])
        .record("Status", &[("id", "6"), ("name", "Open")])
        .record("IssueLinkType", &[("id", "10"), ("linkname", "Duplicate")])
        .record("ProjectRole", &[("id", "10050"), ("name", "Developers")])
        .record(
            "ProjectRoleActor",
            &[
                ("id", "1"),
                ("pid", "10001"),
                ("projectroleid", "10050"),
                ("roletype", "atlassian-user-role-actor"),
                ("roletypeparameter", "fred"),
            ],
        )
        .record(
            "User",
            &[
                ("userName", "fred"),
                ("displayName", "Fred Flintstone"),
                ("emailAddress", "fred@example.com"),
            ],
        )
        .record("User", &[("userName", "mary"), ("displayName", "Mary Monkey")])
        .record(
            "Version",
            &[("id", "20000"), ("project", "10001"), ("name", "1.0")],
        )
        .record(
            "Component",
            &[
                ("id", "30000"),
                ("project", "10001"),
                ("name", "Core"),
                ("lead", "mary"),
            ],
        )
        .record(
            "CustomField",
            &[
                ("id", "10001"),
                ("name", "Severity"),
                ("customfieldtypekey", "select"),
            ],
        )
        .record(
            "ConfigurationContext",
            &[("fieldconfigscheme", "100"), ("key", "customfield_10001")],
        )
        .record(
            "FieldConfigSchemeIssueType",
            &[("fieldconfigscheme", "100")],
        )
        .record(
            "CustomFieldOption",
            &[
                ("id", "100"),
                ("customfield", "10001"),
                ("customfieldconfig", "1"),
                ("value", "Critical"),
            ],
        )
        .record(
            "Issue",
            &[
                ("id", "10000"),
                ("key", "MKY-1"),
                ("project", "10001"),
                ("type", "1"),
                ("summary", "carries one of everything"),
                ("reporter", "fred"),
                ("assignee", "mary"),
                ("priority", "3"),
                ("status", "6"),
            ],
        )
        .record(
            "Issue",
            &[
                ("id", "10010"),
                ("key", "MKY-2"),
                ("project", "10001"),
                ("type", "1"),
                ("summary", "second issue"),
                ("status", "6"),
            ],
        )
        .record(
            "Issue",
            &[
                ("id", "10020"),
                ("key", "HSP-1"),
                ("project", "10002"),
                ("type", "1"),
                ("summary", "other project"),
                ("status", "6"),
            ],
        )
        .record(
            "Action",
            &[
                ("id", "200"),
                ("issue", "10000"),
                ("type", "comment"),
                ("author", "fred"),
                ("body", "first comment"),
            ],
        )
        .record(
            "Worklog",
            &[
                ("id", "300"),
                ("issue", "10000"),
                ("author", "fred"),
                ("body", "dug around"),
            ],
        )
        .record(
            "IssueLink",
            &[
                ("id", "400"),
                ("linktype", "10"),
                ("source", "10000"),
                ("destination", "10010"),
            ],
        )
        .record(
            "NodeAssociation",
            &[
                ("sourceNodeId", "10000"),
                ("sourceNodeEntity", "Issue"),
                ("sinkNodeId", "20000"),
                ("sinkNodeEntity", "Version"),
                ("associationType", "IssueFixVersion"),
            ],
        )
        .record(
            "NodeAssociation",
            &[
                ("sourceNodeId", "10000"),
                ("sourceNodeEntity", "Issue"),
                ("sinkNodeId", "30000"),
                ("sinkNodeEntity", "Component"),
                ("associationType", "IssueComponent"),
            ],
        )
        .record(
            "UserAssociation",
            &[
                ("sourceName", "fred"),
                ("sinkNodeId", "10000"),
                ("sinkNodeEntity", "Issue"),
                ("associationType", "VoteIssue"),
            ],
        )
        .record("ChangeGroup", &[("id", "55"), ("issue", "10000"), ("author", "fred")])
        .record(
            "ChangeItem",
            &[
                ("id", "1"),
                ("group", "55"),
                ("fieldtype", "jira"),
                ("field", "status"),
                ("oldstring", "Open"),
                ("newstring", "Closed"),
            ],
        )
        .record(
            "CustomFieldValue",
            &[
                ("id", "1"),
                ("customfield", "10001"),
                ("issue", "10000"),
                ("stringvalue", "100"),
            ],
        )
        .record(
            "EntityProperty",
            &[
                ("id", "700"),
                ("entityName", "Issue"),
                ("entityId", "10000"),
                ("propertyKey", "watchcount"),
                ("value", "1"),
            ],
        )
        .record("Label", &[("id", "600"), ("issue", "10000"), ("label", "urgent")])
}

/// A target with every configuration entity `monkey_backup` needs.
#[must_use]
pub fn seeded_target() -> SqliteTarget {
    init_test_logging();
    let target = SqliteTarget::open_memory().expect("Failed to create target database");
    target.add_issue_type("Bug").unwrap();
    target.add_priority("Major").unwrap();
    target.add_resolution("Fixed").unwrap();
    target.add_status("Open", &[]).unwrap();
    target.add_link_type("Duplicate", None).unwrap();
    target.add_project_role("Developers").unwrap();
    let severity = target.add_custom_field("Severity", "select", &[]).unwrap();
    target
        .add_custom_field_option(&severity, None, "Critical")
        .unwrap();
    target
}
