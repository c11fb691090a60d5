//! The audit trail: one pipe-delimited line per terminal outcome, appended
//! to a log under the storage root.

mod common;

use common::{text_upload, vault_with};
use mirrorvault::FileType;

#[tokio::test]
async fn terminal_outcomes_append_one_line_each() {
    let fx = vault_with(|c| c.audit_enabled = true).await;

    assert!(fx.vault.create_directory("Root", "Docs").await.success);
    let dup = fx.vault.create_directory("Root", "docs").await;
    assert!(!dup.success);
    let upload = fx
        .vault
        .upload_file(text_upload("Root/Docs", "a.txt", b"x"), FileType::Text)
        .await;
    assert!(upload.success);

    // The log lives under the storage root, next to the mirrored tree
    let log_path = fx.storage_path(&fx.vault.config().audit_file);
    assert!(log_path.exists(), "no audit log at {log_path:?}");

    let log = std::fs::read_to_string(&log_path).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 3, "log was: {log}");
    assert_eq!(
        lines[0],
        "CREATE_DIRECTORY|Root|Docs|SUCCESS|Directory 'Docs' created"
    );
    assert!(
        lines[1].starts_with("CREATE_DIRECTORY|Root|docs|FAIL|NAME_CONFLICT:"),
        "line was: {}",
        lines[1]
    );
    assert_eq!(
        lines[2],
        "UPLOAD_FILE|Root/Docs|a.txt|SUCCESS|File 'a.txt' uploaded"
    );
}

#[tokio::test]
async fn queries_and_tag_edits_are_audited_too() {
    let fx = vault_with(|c| c.audit_enabled = true).await;
    fx.vault.create_directory("Root", "Docs").await;
    fx.vault.assign_tag("Root/Docs", "Work").await;
    fx.vault.find_tags("Work", None).await.unwrap();
    let missing = fx.vault.download_file_content("Root/absent.txt").await;
    assert!(!missing.success);

    let log = std::fs::read_to_string(fx.storage_path(&fx.vault.config().audit_file)).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 4, "log was: {log}");
    assert_eq!(
        lines[1],
        "ASSIGN_TAG|Root/Docs|Work|SUCCESS|Tag 'Work' assigned to 'Root/Docs'"
    );
    assert_eq!(lines[2], "FIND_TAGS|Work||SUCCESS|1 matches");
    assert!(
        lines[3].starts_with("DOWNLOAD_FILE_CONTENT|Root/absent.txt|FAIL|RESOURCE_NOT_FOUND:"),
        "line was: {}",
        lines[3]
    );
}

#[tokio::test]
async fn disabled_auditing_writes_nothing() {
    let fx = vault_with(|c| c.audit_enabled = false).await;
    fx.vault.create_directory("Root", "Docs").await;
    assert!(!fx.storage_path(&fx.vault.config().audit_file).exists());
}
