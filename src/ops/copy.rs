//! Recursive directory copy with incremental rollback.
//!
//! The copy proceeds depth-first, recording every created node in an ordered
//! ledger. On any failure the ledger unwinds in reverse (files before their
//! directory, deepest directories first), physical-then-catalog, so the
//! destination name is free again afterwards. An unwind that cannot fully
//! complete is surfaced as a rollback failure distinct from the ordinary
//! copy error.

use chrono::Utc;
use futures::future::BoxFuture;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::node::{
    is_same_or_descendant, join_relative, validate_name, DirectoryNode, FileNode, NodeId,
    NodeKind,
};
use crate::domain::tag::TagBinding;
use crate::error::VaultError;
use crate::infrastructure::catalog::CatalogChange;
use crate::ops::{CancelFlag, Coordinator};

struct LedgerEntry {
    relative_path: String,
    node_id: NodeId,
    kind: NodeKind,
}

impl Coordinator {
    pub(crate) async fn copy_directory(
        &self,
        source_path: &str,
        target_parent_path: &str,
        new_name: Option<&str>,
        cancel: Option<&CancelFlag>,
    ) -> Result<String, VaultError> {
        let (source, source_parent) = self
            .resolver
            .find_directory_with_parent(source_path)
            .await?;
        if source_parent.is_none() {
            return Err(VaultError::PolicyViolation(
                "the root directory cannot be copied".into(),
            ));
        }
        let target = self.resolver.find_directory(target_parent_path).await?;
        let dest_name = new_name.unwrap_or(&source.name);
        validate_name(dest_name)?;
        if is_same_or_descendant(&source.relative_path, &target.relative_path) {
            return Err(VaultError::PolicyViolation(format!(
                "cannot copy '{}' into itself or one of its descendants",
                source.name
            )));
        }
        self.ensure_name_free(&target, dest_name).await?;

        let mut ledger: Vec<LedgerEntry> = Vec::new();
        let result = self
            .copy_tree(&source, target.id, &target.relative_path, dest_name, cancel, &mut ledger)
            .await;

        match result {
            Ok(count) => {
                self.invalidate_cache().await;
                info!(
                    "Copied '{}' to '{}' ({count} nodes)",
                    source.relative_path, target.relative_path
                );
                Ok(format!("Directory '{}' copied ({count} nodes)", source.name))
            }
            Err(copy_error) => {
                warn!(
                    "Copy of '{}' failed after {} created nodes, unwinding: {copy_error}",
                    source.relative_path,
                    ledger.len()
                );
                match self.unwind_copy(&ledger).await {
                    Ok(()) => {
                        self.invalidate_cache().await;
                        // A commit failure whose unwind landed is the
                        // recoverable rollback case; anything else keeps its
                        // own classification.
                        Err(match copy_error {
                            VaultError::Catalog(e) => VaultError::ChangesRolledBack {
                                operation: "COPY_DIRECTORY".to_string(),
                                reason: e.to_string(),
                            },
                            other => other,
                        })
                    }
                    Err(detail) => Err(VaultError::RollbackFailed {
                        operation: "COPY_DIRECTORY".to_string(),
                        detail: format!("copy rollback incomplete: {detail}"),
                    }),
                }
            }
        }
    }

    /// Copy one source directory into `dest_parent`, recursing into children.
    /// Every created node lands in the ledger before its catalog commit, so a
    /// failed commit is unwound like any other mid-copy failure.
    fn copy_tree<'a>(
        &'a self,
        source: &'a DirectoryNode,
        dest_parent: NodeId,
        dest_parent_rel: &'a str,
        dest_name: &'a str,
        cancel: Option<&'a CancelFlag>,
        ledger: &'a mut Vec<LedgerEntry>,
    ) -> BoxFuture<'a, Result<usize, VaultError>> {
        Box::pin(async move {
            if let Some(flag) = cancel {
                flag.check("COPY_DIRECTORY")?;
            }

            let dest_rel = join_relative(dest_parent_rel, dest_name);
            self.storage
                .create_dir(&dest_rel)
                .await
                .map_err(|e| VaultError::io(format!("creating directory '{dest_rel}'"), e))?;
            let dir_node = DirectoryNode {
                id: Uuid::new_v4(),
                parent_id: Some(dest_parent),
                name: dest_name.to_string(),
                relative_path: dest_rel.clone(),
                creation_order: self.catalog.next_creation_order(dest_parent).await?,
                created_at: Utc::now(),
            };
            ledger.push(LedgerEntry {
                relative_path: dest_rel.clone(),
                node_id: dir_node.id,
                kind: NodeKind::Directory,
            });
            let dir_id = dir_node.id;
            self.catalog
                .commit(CatalogChange::CreateDirectory(dir_node))
                .await?;
            self.duplicate_tags(source.id, dir_id, NodeKind::Directory)
                .await?;
            let mut created = 1usize;

            for source_file in self.catalog.child_files(source.id).await? {
                if let Some(flag) = cancel {
                    flag.check("COPY_DIRECTORY")?;
                }
                let file_rel = join_relative(&dest_rel, &source_file.name);
                self.storage
                    .copy_file(&source_file.relative_path, &file_rel)
                    .await
                    .map_err(|e| {
                        VaultError::io(format!("copying '{}'", source_file.relative_path), e)
                    })?;
                let copy = FileNode {
                    id: Uuid::new_v4(),
                    directory_id: dir_id,
                    relative_path: file_rel.clone(),
                    created_at: Utc::now(),
                    ..source_file.clone()
                };
                ledger.push(LedgerEntry {
                    relative_path: file_rel,
                    node_id: copy.id,
                    kind: NodeKind::File,
                });
                let copy_id = copy.id;
                self.catalog
                    .commit(CatalogChange::CreateFile {
                        file: copy,
                        replace: None,
                    })
                    .await?;
                self.duplicate_tags(source_file.id, copy_id, NodeKind::File)
                    .await?;
                created += 1;
            }

            for child in self.catalog.child_directories(source.id).await? {
                created += self
                    .copy_tree(&child, dir_id, &dest_rel, &child.name, cancel, ledger)
                    .await?;
            }
            Ok(created)
        })
    }

    /// Copy every tag binding of the source node onto its fresh copy.
    async fn duplicate_tags(
        &self,
        from: NodeId,
        to: NodeId,
        kind: NodeKind,
    ) -> Result<(), VaultError> {
        for tag in self.catalog.tags_for_node(from).await? {
            self.catalog
                .commit(CatalogChange::AssignTag(TagBinding {
                    node_id: to,
                    node_kind: kind,
                    tag,
                }))
                .await?;
        }
        Ok(())
    }

    /// Unwind the created ledger in reverse order, physical before catalog.
    /// A node whose physical removal fails keeps its catalog row so the
    /// substrates stay in agreement; the problem is reported instead.
    async fn unwind_copy(&self, ledger: &[LedgerEntry]) -> Result<(), String> {
        let mut problems: Vec<String> = Vec::new();
        for entry in ledger.iter().rev() {
            let physical = match entry.kind {
                NodeKind::File => self.storage.remove_file(&entry.relative_path).await,
                NodeKind::Directory => self.storage.remove_dir_all(&entry.relative_path).await,
            };
            if let Err(e) = physical {
                if e.kind() != std::io::ErrorKind::NotFound {
                    problems.push(format!("'{}' not removed: {e}", entry.relative_path));
                    continue;
                }
            }
            let change = match entry.kind {
                NodeKind::File => CatalogChange::DeleteFile { id: entry.node_id },
                NodeKind::Directory => CatalogChange::DeleteDirectoryTree {
                    root: entry.node_id,
                },
            };
            if let Err(e) = self.catalog.commit(change).await {
                problems.push(format!(
                    "catalog row for '{}' not removed: {e}",
                    entry.relative_path
                ));
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems.join("; "))
        }
    }
}
