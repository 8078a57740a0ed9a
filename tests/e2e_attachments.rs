mod common;

use project_import::storage::ImportTarget;
use project_import::{ImportState, ProjectImportManager, ProjectImportOptions};
use std::fs;
use std::sync::Arc;

#[test]
fn e2e_attachment_files_are_copied_into_the_target_layout() {
    common::init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let backup = common::monkey_backup()
        .record(
            "FileAttachment",
            &[
                ("id", "500"),
                ("issue", "10000"),
                ("filename", "screenshot.png"),
                ("author", "fred"),
            ],
        )
        .write_to(&dir);

    // Backed-up attachments live under <base>/<project key>/<issue key>/<id>.
    let attachment_base = dir.path().join("attachments");
    let source = attachment_base.join("MKY").join("MKY-1");
    fs::create_dir_all(&source).unwrap();
    fs::write(source.join("500"), b"png bytes").unwrap();

    let target_attachments = dir.path().join("imported");
    fs::create_dir_all(&target_attachments).unwrap();
    let target = Arc::new(
        common::seeded_target().with_attachment_dir(target_attachments.clone()),
    );

    let mut options = ProjectImportOptions::new(&backup, "MKY");
    options.attachment_path = Some(attachment_base);
    let mut manager =
        ProjectImportManager::new(options, Arc::clone(&target) as Arc<dyn ImportTarget>);
    manager.run().unwrap();

    assert_eq!(manager.state(), ImportState::Completed);
    let results = manager.results().unwrap();
    assert_eq!(results.created_count("FileAttachment"), 1);
    assert!(results.errors().is_empty());
    // The file itself was copied, not just the record.
    let copied: Vec<_> = walk_files(&target_attachments);
    assert_eq!(copied.len(), 1);
    assert_eq!(fs::read(&copied[0]).unwrap(), b"png bytes");
}

#[test]
fn e2e_attachment_with_missing_file_is_skipped() {
    common::init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let backup = common::monkey_backup()
        .record(
            "FileAttachment",
            &[
                ("id", "500"),
                ("issue", "10000"),
                ("filename", "screenshot.png"),
                ("author", "fred"),
            ],
        )
        .record(
            "FileAttachment",
            &[
                ("id", "501"),
                ("issue", "10000"),
                ("filename", "gone.txt"),
                ("author", "fred"),
            ],
        )
        .write_to(&dir);

    let attachment_base = dir.path().join("attachments");
    let source = attachment_base.join("MKY").join("MKY-1");
    fs::create_dir_all(&source).unwrap();
    fs::write(source.join("500"), b"present").unwrap();

    let target = Arc::new(common::seeded_target());
    let mut options = ProjectImportOptions::new(&backup, "MKY");
    options.attachment_path = Some(attachment_base);
    let mut manager =
        ProjectImportManager::new(options, Arc::clone(&target) as Arc<dyn ImportTarget>);
    manager.run().unwrap();

    assert_eq!(manager.state(), ImportState::Completed);
    let results = manager.results().unwrap();
    // Only the attachment whose file survived on disk is created.
    assert_eq!(results.created_count("FileAttachment"), 1);
    // The missing file was flagged during validation.
    let mapping = manager.mapping_result().unwrap();
    assert!(mapping.family("attachments").unwrap().has_warnings());
    assert!(mapping.can_import());
}

#[test]
fn e2e_attachments_are_ignored_without_a_configured_path() {
    common::init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let backup = common::monkey_backup()
        .record(
            "FileAttachment",
            &[
                ("id", "500"),
                ("issue", "10000"),
                ("filename", "screenshot.png"),
                ("author", "fred"),
            ],
        )
        .write_to(&dir);

    let target = Arc::new(common::seeded_target());
    let options = ProjectImportOptions::new(&backup, "MKY");
    let mut manager =
        ProjectImportManager::new(options, Arc::clone(&target) as Arc<dyn ImportTarget>);
    manager.run().unwrap();

    assert_eq!(manager.state(), ImportState::Completed);
    assert_eq!(manager.results().unwrap().created_count("FileAttachment"), 0);
    assert!(manager.mapping_result().unwrap().family("attachments").is_none());
}

fn walk_files(root: &std::path::Path) -> Vec<std::path::PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                found.push(path);
            }
        }
    }
    found
}
