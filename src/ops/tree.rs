//! Tree materialization, export, and startup name normalization.

use futures::future::BoxFuture;
use tracing::{info, warn};

use crate::domain::node::{join_relative, DirectoryNode, NodeId};
use crate::domain::tree::{DirectoryTree, TreeDirectory};
use crate::error::VaultError;
use crate::infrastructure::catalog::CatalogChange;
use crate::ops::Coordinator;

impl Coordinator {
    /// Materialize the full namespace tree, serving from the cache when a
    /// fresh entry exists.
    pub(crate) async fn load_root_tree(&self) -> Result<DirectoryTree, VaultError> {
        let key = self.cache_key();
        if let Some(tree) = self.cache.get(&key).await {
            return Ok(tree);
        }
        let root = self
            .catalog
            .root_directory()
            .await?
            .ok_or_else(|| VaultError::NotFound("namespace root".into()))?;
        let tree = DirectoryTree {
            root: self.materialize(root).await?,
        };
        self.cache.insert(&key, tree.clone()).await;
        Ok(tree)
    }

    /// Serialize the current namespace tree for export.
    pub(crate) async fn export_tree(&self) -> Result<String, VaultError> {
        self.load_root_tree().await?.to_json()
    }

    fn materialize(
        &self,
        node: DirectoryNode,
    ) -> BoxFuture<'_, Result<TreeDirectory, VaultError>> {
        Box::pin(async move {
            let mut dir = TreeDirectory::new(node);
            // Child queries come back in creation order already; the rows are
            // authoritative, so they are inserted verbatim.
            dir.files = self.catalog.child_files(dir.node.id).await?;
            for child in self.catalog.child_directories(dir.node.id).await? {
                dir.directories.push(self.materialize(child).await?);
            }
            Ok(dir)
        })
    }

    /// Startup pass reconciling catalog name casing with the disk.
    ///
    /// A tool touching the storage tree directly can change the casing of an
    /// entry without the catalog noticing. The disk wins for casing; anything
    /// beyond a case difference is left alone and reported.
    pub(crate) async fn normalize_names(&self) -> Result<usize, VaultError> {
        let root = self
            .catalog
            .root_directory()
            .await?
            .ok_or_else(|| VaultError::NotFound("namespace root".into()))?;
        let normalized = self.normalize_under(root.id, "").await?;
        if normalized > 0 {
            info!("Normalized casing of {normalized} names from disk");
            self.invalidate_cache().await;
        }
        Ok(normalized)
    }

    fn normalize_under<'a>(
        &'a self,
        parent: NodeId,
        parent_rel: &'a str,
    ) -> BoxFuture<'a, Result<usize, VaultError>> {
        Box::pin(async move {
            let mut normalized = 0usize;

            for file in self.catalog.child_files(parent).await? {
                match self.storage.disk_name_of(parent_rel, &file.name).await {
                    Ok(Some(disk_name)) if disk_name != file.name => {
                        self.catalog
                            .commit(CatalogChange::RelocateFile {
                                id: file.id,
                                new_directory: parent,
                                new_name: disk_name.clone(),
                                new_relative_path: join_relative(parent_rel, &disk_name),
                                replace: None,
                            })
                            .await?;
                        normalized += 1;
                    }
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        warn!("'{}' is cataloged but missing on disk", file.relative_path);
                    }
                    Err(e) => {
                        warn!("Skipping casing check under '{parent_rel}': {e}");
                        return Ok(normalized);
                    }
                }
            }

            for dir in self.catalog.child_directories(parent).await? {
                let rel = match self.storage.disk_name_of(parent_rel, &dir.name).await {
                    Ok(Some(disk_name)) if disk_name != dir.name => {
                        let rel = join_relative(parent_rel, &disk_name);
                        self.catalog
                            .commit(CatalogChange::RelocateDirectory {
                                id: dir.id,
                                new_parent: parent,
                                new_name: disk_name,
                                new_relative_path: rel.clone(),
                            })
                            .await?;
                        normalized += 1;
                        rel
                    }
                    Ok(Some(_)) => join_relative(parent_rel, &dir.name),
                    Ok(None) => {
                        warn!("'{}' is cataloged but missing on disk", dir.relative_path);
                        continue;
                    }
                    Err(e) => {
                        warn!("Skipping casing check under '{parent_rel}': {e}");
                        return Ok(normalized);
                    }
                };
                normalized += self.normalize_under(dir.id, &rel).await?;
            }

            Ok(normalized)
        })
    }
}
