//! On-disk casing wins over stored casing at startup: reopening a vault
//! after an outside tool re-cased entries adopts the disk names into the
//! catalog, descendants included.

mod common;

use tempfile::TempDir;

use mirrorvault::config::VaultConfig;
use mirrorvault::{FileType, UploadRequest, Vault};

async fn open(dir: &TempDir) -> Vault {
    let mut config = VaultConfig::default_with_dir(dir.path().to_path_buf());
    config.audit_enabled = false;
    Vault::open_with_config(config, None).await.expect("vault")
}

#[tokio::test]
async fn reopen_adopts_on_disk_casing() {
    let dir = TempDir::new().unwrap();
    let storage = dir.path().join("storage");
    {
        let vault = open(&dir).await;
        assert!(vault.create_directory("Root", "docs").await.success);
        assert!(vault.create_directory("Root/docs", "Drafts").await.success);
        let upload = vault
            .upload_file(
                UploadRequest {
                    directory_path: "Root/docs".into(),
                    file_name: "report.txt".into(),
                    content: b"x".to_vec(),
                    metadata: None,
                },
                FileType::Text,
            )
            .await;
        assert!(upload.success, "{}", upload.message);
    }

    // Re-case the directory and the file behind the vault's back
    std::fs::rename(storage.join("docs"), storage.join("DOCS")).unwrap();
    std::fs::rename(
        storage.join("DOCS/report.txt"),
        storage.join("DOCS/Report.TXT"),
    )
    .unwrap();

    let vault = open(&dir).await;
    let tree = vault.load_root_tree().await.unwrap();
    let docs = &tree.root.directories[0];
    assert_eq!(docs.node.name, "DOCS");
    assert_eq!(docs.node.relative_path, "DOCS");

    // Descendant paths follow the adopted casing
    let drafts = tree.find_directory(&["DOCS", "Drafts"]).unwrap();
    assert_eq!(drafts.node.relative_path, "DOCS/Drafts");
    let report = &docs.files[0];
    assert_eq!(report.name, "Report.TXT");
    assert_eq!(report.relative_path, "DOCS/Report.TXT");

    // The re-cased path resolves and serves content
    let download = vault
        .download_file_content("Root/DOCS/Report.TXT")
        .await;
    assert!(download.success, "{}", download.message);
    assert_eq!(download.bytes, b"x");
}

#[tokio::test]
async fn unchanged_casing_is_left_alone() {
    let dir = TempDir::new().unwrap();
    {
        let vault = open(&dir).await;
        vault.create_directory("Root", "Docs").await;
    }
    let vault = open(&dir).await;
    let tree = vault.load_root_tree().await.unwrap();
    assert_eq!(tree.root.directories[0].node.name, "Docs");
}
