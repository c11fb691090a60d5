//! Failed catalog commits must leave the storage tree exactly as it was.

mod common;

use common::{text_upload, upload_text, vault_failing_on};
use mirrorvault::{ConflictPolicy, FileType};

#[tokio::test]
async fn failed_directory_create_removes_the_physical_directory() {
    let fx = vault_failing_on("create_directory", 1, |_| {}).await;
    let result = fx.vault.create_directory("Root", "Docs").await;
    assert!(!result.success);
    assert_eq!(result.error_code.as_deref(), Some("CHANGES_ROLLED_BACK"));
    assert!(!fx.exists("Docs"));

    // The vault stays usable and the name is free again
    let tree = fx.vault.load_root_tree().await.unwrap();
    assert!(tree.root.directories.is_empty());
}

#[tokio::test]
async fn failed_upload_removes_the_written_file() {
    let fx = vault_failing_on("create_file", 1, |_| {}).await;
    let result = fx
        .vault
        .upload_file(text_upload("Root", "report.txt", b"x"), FileType::Text)
        .await;
    assert_eq!(result.error_code.as_deref(), Some("CHANGES_ROLLED_BACK"));
    assert!(!fx.exists("report.txt"));
}

#[tokio::test]
async fn failed_overwrite_restores_the_displaced_original() {
    let fx =
        vault_failing_on("create_file", 2, |c| c.conflict_policy = ConflictPolicy::Overwrite)
            .await;
    upload_text(&fx, "Root", "report.txt", b"original").await;

    let result = fx
        .vault
        .upload_file(text_upload("Root", "report.txt", b"replacement"), FileType::Text)
        .await;
    assert_eq!(result.error_code.as_deref(), Some("CHANGES_ROLLED_BACK"));

    let download = fx.vault.download_file_content("Root/report.txt").await;
    assert!(download.success);
    assert_eq!(download.bytes, b"original");
}

#[tokio::test]
async fn failed_delete_restores_the_staged_subtree() {
    let fx = vault_failing_on("delete_directory_tree", 1, |c| {
        c.allow_recursive_delete = true;
    })
    .await;
    fx.vault.create_directory("Root", "Docs").await;
    upload_text(&fx, "Root/Docs", "a.txt", b"x").await;

    let result = fx.vault.delete_directory("Root/Docs").await;
    assert_eq!(result.error_code.as_deref(), Some("CHANGES_ROLLED_BACK"));
    assert!(fx.exists("Docs/a.txt"));

    let tree = fx.vault.load_root_tree().await.unwrap();
    assert!(tree.find_directory(&["Docs"]).is_some());
}

#[tokio::test]
async fn failed_move_renames_the_directory_back() {
    let fx = vault_failing_on("relocate_directory", 1, |_| {}).await;
    fx.vault.create_directory("Root", "A").await;
    fx.vault.create_directory("Root", "B").await;
    upload_text(&fx, "Root/A", "a.txt", b"x").await;

    let result = fx.vault.move_directory("Root/A", "Root/B").await;
    assert_eq!(result.error_code.as_deref(), Some("CHANGES_ROLLED_BACK"));
    assert!(fx.exists("A/a.txt"));
    assert!(!fx.exists("B/A"));
}

#[tokio::test]
async fn failed_file_rename_is_reversed() {
    let fx = vault_failing_on("relocate_file", 1, |_| {}).await;
    upload_text(&fx, "Root", "a.txt", b"x").await;

    let result = fx.vault.rename_file("Root/a.txt", "b.txt").await;
    assert_eq!(result.error_code.as_deref(), Some("CHANGES_ROLLED_BACK"));
    assert!(fx.exists("a.txt"));
    assert!(!fx.exists("b.txt"));

    // The original still resolves
    assert!(fx.vault.download_file_content("Root/a.txt").await.success);
}

#[tokio::test]
async fn failed_file_delete_restores_the_staged_file() {
    let fx = vault_failing_on("delete_file", 1, |_| {}).await;
    upload_text(&fx, "Root", "a.txt", b"payload").await;

    let result = fx.vault.delete_file("Root/a.txt").await;
    assert_eq!(result.error_code.as_deref(), Some("CHANGES_ROLLED_BACK"));
    let download = fx.vault.download_file_content("Root/a.txt").await;
    assert_eq!(download.bytes, b"payload");
}
