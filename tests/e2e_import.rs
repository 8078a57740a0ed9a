mod common;

use project_import::storage::{ImportTarget, SqliteTarget};
use project_import::{ImportError, ImportState, ProjectImportManager, ProjectImportOptions};
use std::sync::{Arc, Mutex};

fn run_monkey_import(target: &Arc<SqliteTarget>) -> ProjectImportManager {
    common::init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let backup = common::monkey_backup().write_to(&dir);
    let options = ProjectImportOptions::new(&backup, "MKY");
    let mut manager =
        ProjectImportManager::new(options, Arc::clone(target) as Arc<dyn ImportTarget>);
    manager.run().expect("import should succeed");
    manager
}

#[test]
fn e2e_monkey_import_creates_every_scoped_record() {
    let target = Arc::new(common::seeded_target());
    let manager = run_monkey_import(&target);

    assert_eq!(manager.state(), ImportState::Completed);
    let results = manager.results().unwrap();
    assert!(!results.is_aborted());
    assert!(results.errors().is_empty());

    assert!(target.project_id_by_key("MKY").unwrap().is_some());
    assert_eq!(target.issue_count().unwrap(), 2);
    assert_eq!(target.entity_count("Action").unwrap(), 1);
    assert_eq!(target.entity_count("Worklog").unwrap(), 1);
    assert_eq!(target.entity_count("IssueLink").unwrap(), 1);
    assert_eq!(target.entity_count("NodeAssociation").unwrap(), 2);
    assert_eq!(target.entity_count("UserAssociation").unwrap(), 1);
    assert_eq!(target.entity_count("ChangeGroup").unwrap(), 1);
    assert_eq!(target.entity_count("ChangeItem").unwrap(), 1);
    assert_eq!(target.entity_count("CustomFieldValue").unwrap(), 1);
    assert_eq!(target.entity_count("EntityProperty").unwrap(), 1);
    assert_eq!(target.entity_count("Label").unwrap(), 1);
}

#[test]
fn e2e_created_counts_cover_project_structure_and_users() {
    let target = Arc::new(common::seeded_target());
    let manager = run_monkey_import(&target);

    let created = manager.results().unwrap().created_counts();
    let count = |kind: &str| created.iter().find(|(k, _)| k == kind).map(|(_, n)| *n);

    assert_eq!(count("Project"), Some(1));
    assert_eq!(count("Version"), Some(1));
    assert_eq!(count("Component"), Some(1));
    assert_eq!(count("ProjectRoleActor"), Some(1));
    // fred and mary are absent from the target and get auto-created.
    assert_eq!(count("User"), Some(2));
    assert_eq!(count("Issue"), Some(2));
}

#[test]
fn e2e_other_projects_records_stay_out() {
    let target = Arc::new(common::seeded_target());
    let manager = run_monkey_import(&target);

    // HSP-1 lives in the backup but not in the imported project.
    assert_eq!(target.issue_count().unwrap(), 2);
    assert!(target.project_id_by_key("HSP").unwrap().is_none());
    drop(manager);
}

#[test]
fn e2e_a_manager_drives_a_single_run() {
    let target = Arc::new(common::seeded_target());
    let mut manager = run_monkey_import(&target);

    let err = manager.run().unwrap_err();
    assert!(matches!(err, ImportError::Config(_)));
    // A finished run is not demoted to Aborted by the second call.
    assert_eq!(manager.state(), ImportState::Completed);
}

#[derive(Clone)]
struct RecordingSink(Arc<Mutex<Vec<u8>>>);

impl project_import::progress::ProgressSink for RecordingSink {
    fn make_progress(&mut self, percent: u8, _sub_task: &str, _message: &str) {
        self.0.lock().unwrap().push(percent);
    }
}

#[test]
fn e2e_progress_is_monotonic_and_ends_at_the_persist_mark() {
    common::init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let backup = common::monkey_backup().write_to(&dir);
    let target = Arc::new(common::seeded_target());
    let percents = Arc::new(Mutex::new(Vec::new()));

    let mut options = ProjectImportOptions::new(&backup, "MKY");
    options.workers = 1;
    let mut manager =
        ProjectImportManager::new(options, Arc::clone(&target) as Arc<dyn ImportTarget>)
            .with_progress_sink(RecordingSink(Arc::clone(&percents)));
    manager.run().unwrap();

    let seen = percents.lock().unwrap();
    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(*seen.last().unwrap(), 80);
}

#[test]
fn e2e_custom_field_value_pass_interpolates_its_progress_band() {
    common::init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let mut backup = common::monkey_backup();
    for n in 0..40 {
        let id = (1000 + n).to_string();
        backup = backup.record(
            "CustomFieldValue",
            &[
                ("id", id.as_str()),
                ("customfield", "10001"),
                ("issue", "10000"),
                ("stringvalue", "100"),
            ],
        );
    }
    let backup = backup.write_to(&dir);
    let target = Arc::new(common::seeded_target());
    let percents = Arc::new(Mutex::new(Vec::new()));

    let mut options = ProjectImportOptions::new(&backup, "MKY");
    options.workers = 1;
    let mut manager =
        ProjectImportManager::new(options, Arc::clone(&target) as Arc<dyn ImportTarget>)
            .with_progress_sink(RecordingSink(Arc::clone(&percents)));
    manager.run().unwrap();

    // With a pre-counted total the 60-80 band reports intermediate
    // percentages instead of sitting at its start until the final mark.
    let seen = percents.lock().unwrap();
    assert!(seen.iter().any(|p| *p > 60 && *p < 80));
    assert_eq!(target.entity_count("CustomFieldValue").unwrap(), 41);
}

#[test]
fn e2e_inline_executor_matches_pooled_results() {
    common::init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let backup = common::monkey_backup().write_to(&dir);
    let target = Arc::new(common::seeded_target());

    let mut options = ProjectImportOptions::new(&backup, "MKY");
    options.workers = 0;
    let mut manager =
        ProjectImportManager::new(options, Arc::clone(&target) as Arc<dyn ImportTarget>);
    manager.run().unwrap();

    assert_eq!(manager.state(), ImportState::Completed);
    assert_eq!(target.issue_count().unwrap(), 2);
    assert_eq!(target.entity_count("CustomFieldValue").unwrap(), 1);
}
