//! A dual-substrate document vault: a hierarchical namespace of directories
//! and typed files whose state lives in a relational catalog and a physical
//! storage tree, kept consistent by a physical-first, catalog-second write
//! protocol with compensating rollback.

pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod infrastructure;
pub mod ops;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::VaultConfig;
use crate::error::VaultError;
use crate::infrastructure::audit::AuditLog;
use crate::infrastructure::cache::{MemoryTreeCache, TreeCache};
use crate::infrastructure::catalog::{Catalog, SqliteCatalog};
use crate::infrastructure::database::Database;
use crate::infrastructure::storage::PhysicalStorage;
use crate::ops::Coordinator;

pub use crate::domain::node::{FileType, TypeMetadata};
pub use crate::domain::tag::TagName;
pub use crate::error::{FileDownloadResult, OperationResult};
pub use crate::ops::conflict::ConflictPolicy;
pub use crate::ops::file::UploadRequest;
pub use crate::ops::tags::{PathTags, SortKey, TagQueryResult};
pub use crate::ops::CancelFlag;

/// A running vault instance. All gateway operations live in [`gateway`].
pub struct Vault {
    pub(crate) coordinator: Coordinator,
}

impl Vault {
    /// Open (or initialize) the vault rooted at a data directory.
    pub async fn open(data_dir: PathBuf) -> anyhow::Result<Self> {
        let config = VaultConfig::load_or_create(&data_dir)?;
        Self::open_with_config(config, None).await
    }

    /// Open a vault from explicit configuration. `wrap_catalog` lets tests
    /// interpose on the catalog port.
    pub async fn open_with_config(
        config: VaultConfig,
        wrap_catalog: Option<Box<dyn FnOnce(Arc<dyn Catalog>) -> Arc<dyn Catalog>>>,
    ) -> anyhow::Result<Self> {
        info!("Initializing vault at {:?}", config.data_dir);

        // 1. Directories
        config.ensure_directories()?;

        // 2. Catalog database
        let db = Database::open_or_create(&config.catalog_path()).await?;
        db.migrate().await?;
        let mut catalog: Arc<dyn Catalog> = Arc::new(SqliteCatalog::new(&db));
        if let Some(wrap) = wrap_catalog {
            catalog = wrap(catalog);
        }

        // 3. Namespace root
        let root = catalog.ensure_root(&config.root_name).await?;
        info!("Namespace root '{}' ready ({})", root.name, root.id);

        // 4. Physical storage, cache, audit
        let storage = PhysicalStorage::new(config.storage_dir.clone());
        let cache: Arc<dyn TreeCache> = Arc::new(MemoryTreeCache::new(Duration::from_secs(
            config.cache_ttl_secs,
        )));
        let audit = AuditLog::new(
            config.audit_enabled,
            config.storage_dir.join(&config.audit_file),
        );

        let coordinator = Coordinator::new(catalog, storage, cache, audit, config);
        let vault = Self { coordinator };

        // 5. Reconcile catalog name casing with the disk
        vault.coordinator.normalize_names().await?;

        info!("Vault ready");
        Ok(vault)
    }

    pub fn config(&self) -> &VaultConfig {
        &self.coordinator.config
    }
}

/// Synchronous facade over [`Vault`] for callers without an async runtime.
/// Owns its runtime; every call blocks on the async operation.
pub struct BlockingVault {
    runtime: tokio::runtime::Runtime,
    vault: Vault,
}

impl BlockingVault {
    pub fn open(data_dir: PathBuf) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        let vault = runtime.block_on(Vault::open(data_dir))?;
        Ok(Self { runtime, vault })
    }

    pub fn create_directory(&self, parent_path: &str, name: &str) -> OperationResult {
        self.runtime
            .block_on(self.vault.create_directory(parent_path, name))
    }

    pub fn delete_directory(&self, path: &str) -> OperationResult {
        self.runtime.block_on(self.vault.delete_directory(path))
    }

    pub fn move_directory(&self, path: &str, target_parent_path: &str) -> OperationResult {
        self.runtime
            .block_on(self.vault.move_directory(path, target_parent_path))
    }

    pub fn rename_directory(&self, path: &str, new_name: &str) -> OperationResult {
        self.runtime
            .block_on(self.vault.rename_directory(path, new_name))
    }

    pub fn copy_directory(
        &self,
        source_path: &str,
        target_parent_path: &str,
        new_name: Option<&str>,
    ) -> OperationResult {
        self.runtime.block_on(self.vault.copy_directory(
            source_path,
            target_parent_path,
            new_name,
            None,
        ))
    }

    pub fn upload_file(&self, request: UploadRequest, file_type: FileType) -> OperationResult {
        self.runtime
            .block_on(self.vault.upload_file(request, file_type))
    }

    pub fn download_file(&self, path: &str, target: &std::path::Path) -> OperationResult {
        self.runtime
            .block_on(self.vault.download_file(path, target))
    }

    pub fn download_file_content(&self, path: &str) -> FileDownloadResult {
        self.runtime
            .block_on(self.vault.download_file_content(path))
    }

    pub fn move_file(&self, file_path: &str, target_dir_path: &str) -> OperationResult {
        self.runtime
            .block_on(self.vault.move_file(file_path, target_dir_path))
    }

    pub fn rename_file(&self, path: &str, new_name: &str) -> OperationResult {
        self.runtime
            .block_on(self.vault.rename_file(path, new_name))
    }

    pub fn delete_file(&self, path: &str) -> OperationResult {
        self.runtime.block_on(self.vault.delete_file(path))
    }

    pub fn assign_tag(&self, path: &str, tag: &str) -> OperationResult {
        self.runtime.block_on(self.vault.assign_tag(path, tag))
    }

    pub fn remove_tag(&self, path: &str, tag: &str) -> OperationResult {
        self.runtime.block_on(self.vault.remove_tag(path, tag))
    }

    pub fn list_tags(&self, scope: Option<&str>) -> Result<Vec<PathTags>, VaultError> {
        self.runtime.block_on(self.vault.list_tags(scope))
    }

    pub fn find_tags(&self, tag: &str, scope: Option<&str>) -> Result<TagQueryResult, VaultError> {
        self.runtime.block_on(self.vault.find_tags(tag, scope))
    }

    pub fn undo(&self) -> OperationResult {
        self.runtime.block_on(self.vault.undo())
    }

    pub fn redo(&self) -> OperationResult {
        self.runtime.block_on(self.vault.redo())
    }

    pub fn set_sort_order(&self, key: SortKey, ascending: bool) -> OperationResult {
        self.runtime
            .block_on(self.vault.set_sort_order(key, ascending))
    }

    pub fn load_root_tree(&self) -> Result<domain::tree::DirectoryTree, VaultError> {
        self.runtime.block_on(self.vault.load_root_tree())
    }

    pub fn export_tree(&self) -> Result<String, VaultError> {
        self.runtime.block_on(self.vault.export_tree())
    }
}
