#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::DbErr;
use tempfile::TempDir;

use mirrorvault::config::VaultConfig;
use mirrorvault::domain::node::{DirectoryNode, FileNode, NodeId};
use mirrorvault::domain::tag::{TagBinding, TagName};
use mirrorvault::infrastructure::catalog::{
    Catalog, CatalogChange, CatalogError, CatalogResult,
};
use mirrorvault::{ConflictPolicy, FileType, UploadRequest, Vault};

/// A vault over a temp directory; the directory lives as long as the fixture.
pub struct VaultFixture {
    pub dir: TempDir,
    pub vault: Vault,
}

impl VaultFixture {
    pub fn storage_path(&self, relative: &str) -> std::path::PathBuf {
        self.vault.config().storage_dir.join(relative)
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.storage_path(relative).exists()
    }
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn base_config(dir: &TempDir) -> VaultConfig {
    init_tracing();
    let mut config = VaultConfig::default_with_dir(dir.path().to_path_buf());
    config.audit_enabled = false;
    config
}

pub async fn vault() -> VaultFixture {
    vault_with(|_| {}).await
}

pub async fn vault_with(tweak: impl FnOnce(&mut VaultConfig)) -> VaultFixture {
    let dir = TempDir::new().expect("temp dir");
    let mut config = base_config(&dir);
    tweak(&mut config);
    let vault = Vault::open_with_config(config, None).await.expect("vault");
    VaultFixture { dir, vault }
}

pub async fn vault_with_policy(policy: ConflictPolicy) -> VaultFixture {
    vault_with(|c| c.conflict_policy = policy).await
}

/// A vault whose catalog rejects the Nth commit of a given change kind,
/// counted from 1. Everything else passes through untouched.
pub async fn vault_failing_on(
    kind: &'static str,
    nth: u32,
    tweak: impl FnOnce(&mut VaultConfig),
) -> VaultFixture {
    let dir = TempDir::new().expect("temp dir");
    let mut config = base_config(&dir);
    tweak(&mut config);
    let vault = Vault::open_with_config(
        config,
        Some(Box::new(move |inner| {
            Arc::new(FailingCatalog::new(inner, kind, nth)) as Arc<dyn Catalog>
        })),
    )
    .await
    .expect("vault");
    VaultFixture { dir, vault }
}

pub fn text_upload(directory_path: &str, file_name: &str, content: &[u8]) -> UploadRequest {
    UploadRequest {
        directory_path: directory_path.to_string(),
        file_name: file_name.to_string(),
        content: content.to_vec(),
        metadata: None,
    }
}

pub async fn upload_text(fixture: &VaultFixture, dir: &str, name: &str, content: &[u8]) {
    let result = fixture
        .vault
        .upload_file(text_upload(dir, name, content), FileType::Text)
        .await;
    assert!(result.success, "upload of '{name}' failed: {}", result.message);
}

/// Catalog decorator injecting a deterministic commit failure: the `nth`
/// commit whose change kind matches `kind` is rejected, all other calls
/// delegate to the wrapped catalog.
pub struct FailingCatalog {
    inner: Arc<dyn Catalog>,
    kind: &'static str,
    seen: AtomicU32,
    nth: u32,
}

impl FailingCatalog {
    pub fn new(inner: Arc<dyn Catalog>, kind: &'static str, nth: u32) -> Self {
        Self {
            inner,
            kind,
            seen: AtomicU32::new(0),
            nth,
        }
    }
}

#[async_trait]
impl Catalog for FailingCatalog {
    async fn ensure_root(&self, name: &str) -> CatalogResult<DirectoryNode> {
        self.inner.ensure_root(name).await
    }

    async fn root_directory(&self) -> CatalogResult<Option<DirectoryNode>> {
        self.inner.root_directory().await
    }

    async fn directory_by_id(&self, id: NodeId) -> CatalogResult<Option<DirectoryNode>> {
        self.inner.directory_by_id(id).await
    }

    async fn file_by_id(&self, id: NodeId) -> CatalogResult<Option<FileNode>> {
        self.inner.file_by_id(id).await
    }

    async fn child_directory(
        &self,
        parent: NodeId,
        name: &str,
    ) -> CatalogResult<Option<DirectoryNode>> {
        self.inner.child_directory(parent, name).await
    }

    async fn child_file(&self, parent: NodeId, name: &str) -> CatalogResult<Option<FileNode>> {
        self.inner.child_file(parent, name).await
    }

    async fn child_directories(&self, parent: NodeId) -> CatalogResult<Vec<DirectoryNode>> {
        self.inner.child_directories(parent).await
    }

    async fn child_files(&self, parent: NodeId) -> CatalogResult<Vec<FileNode>> {
        self.inner.child_files(parent).await
    }

    async fn all_directories(&self) -> CatalogResult<Vec<DirectoryNode>> {
        self.inner.all_directories().await
    }

    async fn all_files(&self) -> CatalogResult<Vec<FileNode>> {
        self.inner.all_files().await
    }

    async fn next_creation_order(&self, parent: NodeId) -> CatalogResult<i64> {
        self.inner.next_creation_order(parent).await
    }

    async fn tags_for_node(&self, node: NodeId) -> CatalogResult<Vec<TagName>> {
        self.inner.tags_for_node(node).await
    }

    async fn all_tag_bindings(&self) -> CatalogResult<Vec<TagBinding>> {
        self.inner.all_tag_bindings().await
    }

    async fn commit(&self, change: CatalogChange) -> CatalogResult<()> {
        if change.kind() == self.kind {
            let seen = self.seen.fetch_add(1, Ordering::SeqCst) + 1;
            if seen == self.nth {
                return Err(CatalogError::Db(DbErr::Custom(
                    "injected commit failure".to_string(),
                )));
            }
        }
        self.inner.commit(change).await
    }
}
