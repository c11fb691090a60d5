mod common;

use common::{upload_text, vault};

#[tokio::test]
async fn tags_follow_the_node_through_rename_and_move() {
    let fx = vault().await;
    fx.vault.create_directory("Root", "Docs").await;
    upload_text(&fx, "Root/Docs", "report.txt", b"x").await;
    assert!(fx.vault.assign_tag("Root/Docs/report.txt", "urgent").await.success);

    fx.vault.rename_file("Root/Docs/report.txt", "final.txt").await;
    fx.vault.create_directory("Root", "Archive").await;
    fx.vault.move_file("Root/Docs/final.txt", "Root/Archive").await;

    let found = fx.vault.find_tags("Urgent", None).await.unwrap();
    assert_eq!(found.paths, ["Root/Archive/final.txt"]);
    assert_eq!(found.color, "E5484D");
}

#[tokio::test]
async fn deleting_a_node_drops_its_bindings() {
    let fx = vault().await;
    upload_text(&fx, "Root", "a.txt", b"x").await;
    fx.vault.assign_tag("Root/a.txt", "Work").await;
    fx.vault.delete_file("Root/a.txt").await;

    let found = fx.vault.find_tags("Work", None).await.unwrap();
    assert!(found.paths.is_empty());
}

#[tokio::test]
async fn duplicate_assignment_is_a_noop() {
    let fx = vault().await;
    fx.vault.create_directory("Root", "Docs").await;
    assert!(fx.vault.assign_tag("Root/Docs", "Work").await.success);
    assert!(fx.vault.assign_tag("Root/Docs", "work").await.success);

    let listed = fx.vault.list_tags(Some("Root/Docs")).await.unwrap();
    assert_eq!(listed[0].tags, ["Work"]);
}

#[tokio::test]
async fn unknown_tags_fail_validation() {
    let fx = vault().await;
    fx.vault.create_directory("Root", "Docs").await;
    let result = fx.vault.assign_tag("Root/Docs", "Nonsense").await;
    assert_eq!(result.error_code.as_deref(), Some("VALIDATION_FAILED"));
}

#[tokio::test]
async fn scoped_find_matches_segment_boundaries_only() {
    let fx = vault().await;
    fx.vault.create_directory("Root", "A").await;
    fx.vault.create_directory("Root", "AB").await;
    upload_text(&fx, "Root/A", "in.txt", b"x").await;
    upload_text(&fx, "Root/AB", "out.txt", b"x").await;
    fx.vault.assign_tag("Root/A/in.txt", "Review").await;
    fx.vault.assign_tag("Root/AB/out.txt", "Review").await;
    fx.vault.assign_tag("Root/A", "Review").await;

    // Scope 'Root/A' covers the directory itself and its subtree, not 'AB'
    let found = fx.vault.find_tags("Review", Some("Root/A")).await.unwrap();
    assert_eq!(found.paths, ["Root/A", "Root/A/in.txt"]);
    assert_eq!(found.scope_path, "Root/A");
}

#[tokio::test]
async fn list_without_scope_groups_by_path() {
    let fx = vault().await;
    fx.vault.create_directory("Root", "Docs").await;
    upload_text(&fx, "Root", "a.txt", b"x").await;
    fx.vault.assign_tag("Root/Docs", "Work").await;
    fx.vault.assign_tag("Root/a.txt", "Work").await;
    fx.vault.assign_tag("Root/a.txt", "Urgent").await;

    let listed = fx.vault.list_tags(None).await.unwrap();
    assert_eq!(listed.len(), 2);
    let file_entry = listed.iter().find(|p| p.path == "Root/a.txt").unwrap();
    assert_eq!(file_entry.tags.len(), 2);
}

#[tokio::test]
async fn undo_and_redo_replay_tag_edits() {
    let fx = vault().await;
    fx.vault.create_directory("Root", "Docs").await;
    fx.vault.assign_tag("Root/Docs", "Work").await;

    assert!(fx.vault.undo().await.success);
    let after_undo = fx.vault.find_tags("Work", None).await.unwrap();
    assert!(after_undo.paths.is_empty());

    assert!(fx.vault.redo().await.success);
    let after_redo = fx.vault.find_tags("Work", None).await.unwrap();
    assert_eq!(after_redo.paths, ["Root/Docs"]);
}

#[tokio::test]
async fn a_fresh_edit_clears_the_redo_stack() {
    let fx = vault().await;
    fx.vault.create_directory("Root", "Docs").await;
    fx.vault.assign_tag("Root/Docs", "Work").await;
    fx.vault.undo().await;

    // New edit invalidates the redo of the undone assignment
    fx.vault.assign_tag("Root/Docs", "Urgent").await;
    let redo = fx.vault.redo().await;
    assert!(redo.success);
    assert_eq!(redo.message, "Nothing to redo");

    let listed = fx.vault.list_tags(Some("Root/Docs")).await.unwrap();
    assert_eq!(listed[0].tags, ["Urgent"]);
}

#[tokio::test]
async fn empty_history_undo_is_benign() {
    let fx = vault().await;
    let result = fx.vault.undo().await;
    assert!(result.success);
    assert_eq!(result.message, "Nothing to undo");
}
