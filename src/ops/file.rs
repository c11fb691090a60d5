//! File lifecycle: upload, download, move, rename, delete.

use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::node::{
    extension_of, join_relative, names_equal, validate_name, DirectoryNode, FileNode, FileType,
    NodeId, TypeMetadata,
};
use crate::error::VaultError;
use crate::infrastructure::audit::AuditOutcome;
use crate::infrastructure::catalog::CatalogChange;
use crate::ops::conflict::{find_available_name, ConflictPolicy};
use crate::ops::{rollback_outcome, Coordinator};

/// An upload into a vault directory.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub directory_path: String,
    pub file_name: String,
    pub content: Vec<u8>,
    /// Type-specific metadata; defaults are derived from the file type when
    /// absent
    pub metadata: Option<TypeMetadata>,
}

/// Outcome of resolving a file-name collision at a target directory.
struct ResolvedWrite {
    final_name: String,
    /// The displaced file and the pending-replace path it was parked at
    displaced: Option<(FileNode, String)>,
}

impl Coordinator {
    /// Apply the configured conflict policy for a file name entering `dir`.
    ///
    /// Under `Overwrite` the existing file is physically parked at a
    /// pending-replace path before anything else happens, so the caller can
    /// both restore it on failure and drop it after a successful commit.
    async fn resolve_file_conflict(
        &self,
        dir: &DirectoryNode,
        desired_name: &str,
    ) -> Result<ResolvedWrite, VaultError> {
        if self
            .catalog
            .child_directory(dir.id, desired_name)
            .await?
            .is_some()
        {
            return Err(VaultError::NameConflict(format!(
                "a directory named '{desired_name}' already exists in '{}'",
                dir.name
            )));
        }
        let Some(existing) = self.catalog.child_file(dir.id, desired_name).await? else {
            return Ok(ResolvedWrite {
                final_name: desired_name.to_string(),
                displaced: None,
            });
        };

        match self.config.conflict_policy {
            ConflictPolicy::Reject => Err(VaultError::NameConflict(format!(
                "'{desired_name}' already exists in '{}'",
                dir.name
            ))),
            ConflictPolicy::Overwrite => {
                let backup = self.storage.pending_replace_path(&existing.relative_path);
                self.storage
                    .rename(&existing.relative_path, &backup)
                    .await
                    .map_err(|e| {
                        VaultError::io(
                            format!("staging '{}' for replacement", existing.relative_path),
                            e,
                        )
                    })?;
                Ok(ResolvedWrite {
                    final_name: desired_name.to_string(),
                    displaced: Some((existing, backup)),
                })
            }
            ConflictPolicy::Rename => {
                let catalog = Arc::clone(&self.catalog);
                let dir_id = dir.id;
                let final_name = find_available_name(desired_name, move |candidate| {
                    let catalog = Arc::clone(&catalog);
                    async move {
                        Ok(catalog.child_file(dir_id, &candidate).await?.is_some()
                            || catalog.child_directory(dir_id, &candidate).await?.is_some())
                    }
                })
                .await?;
                Ok(ResolvedWrite {
                    final_name,
                    displaced: None,
                })
            }
        }
    }

    /// Restore a parked file after the new physical write failed; the catalog
    /// was never touched, but the parked original must land back.
    async fn restore_displaced(
        &self,
        displaced: &Option<(FileNode, String)>,
        operation: &str,
        io_error: VaultError,
    ) -> VaultError {
        if let Some((existing, backup)) = displaced {
            if let Err(e) = self.storage.rename(backup, &existing.relative_path).await {
                return VaultError::RollbackFailed {
                    operation: operation.to_string(),
                    detail: format!(
                        "write failed ({io_error}) and the displaced original could not be restored ({e})"
                    ),
                };
            }
        }
        io_error
    }

    /// Drop the pending-replace copy after a successful commit. Failure is
    /// non-fatal: logged and audited, the operation still succeeds.
    async fn discard_backup(&self, operation: &str, path_arg: &str, backup: &str) {
        if let Err(e) = self.storage.remove_file(backup).await {
            warn!("Failed to remove backup '{backup}': {e}");
            self.audit
                .record(
                    operation,
                    &[path_arg, backup],
                    AuditOutcome::Fail,
                    &format!("CLEANUP_FAILED: {e}"),
                )
                .await;
        }
    }

    pub(crate) async fn upload_file(
        &self,
        request: UploadRequest,
        file_type: FileType,
    ) -> Result<String, VaultError> {
        validate_name(&request.file_name)?;
        let dir = self.resolver.find_directory(&request.directory_path).await?;
        let resolved = self.resolve_file_conflict(&dir, &request.file_name).await?;
        let replace_id: Option<NodeId> = resolved.displaced.as_ref().map(|(f, _)| f.id);

        let relative_path = join_relative(&dir.relative_path, &resolved.final_name);
        let node = FileNode {
            id: Uuid::new_v4(),
            directory_id: dir.id,
            name: resolved.final_name.clone(),
            extension: extension_of(&resolved.final_name),
            size_bytes: request.content.len() as i64,
            file_type,
            metadata: request
                .metadata
                .unwrap_or_else(|| TypeMetadata::default_for(file_type)),
            relative_path: relative_path.clone(),
            creation_order: self.catalog.next_creation_order(dir.id).await?,
            created_at: Utc::now(),
        };

        if let Err(e) = self.storage.write_file(&relative_path, &request.content).await {
            let io_error = VaultError::io(format!("writing '{relative_path}'"), e);
            return Err(self
                .restore_displaced(&resolved.displaced, "UPLOAD_FILE", io_error)
                .await);
        }

        match self
            .catalog
            .commit(CatalogChange::CreateFile {
                file: node,
                replace: replace_id,
            })
            .await
        {
            Ok(()) => {
                self.invalidate_cache().await;
                if let Some((_, backup)) = &resolved.displaced {
                    self.discard_backup("UPLOAD_FILE", &relative_path, backup).await;
                }
                info!("Uploaded '{relative_path}'");
                Ok(format!("File '{}' uploaded", resolved.final_name))
            }
            Err(commit_error) => {
                let mut reversal = self.storage.remove_file(&relative_path).await;
                if reversal.is_ok() {
                    if let Some((existing, backup)) = &resolved.displaced {
                        reversal = self.storage.rename(backup, &existing.relative_path).await;
                    }
                }
                Err(rollback_outcome("UPLOAD_FILE", commit_error, reversal))
            }
        }
    }

    pub(crate) async fn download_file(
        &self,
        path: &str,
        target: &Path,
    ) -> Result<String, VaultError> {
        let (file, _) = self.resolver.find_file_with_parent(path).await?;
        let bytes = self
            .storage
            .read_file(&file.relative_path)
            .await
            .map_err(|e| VaultError::io(format!("reading '{}'", file.relative_path), e))?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| VaultError::io(format!("creating '{}'", target.display()), e))?;
        }
        tokio::fs::write(target, bytes)
            .await
            .map_err(|e| VaultError::io(format!("writing '{}'", target.display()), e))?;
        Ok(format!("File '{}' downloaded", file.name))
    }

    pub(crate) async fn download_file_content(
        &self,
        path: &str,
    ) -> Result<(Vec<u8>, String), VaultError> {
        let (file, _) = self.resolver.find_file_with_parent(path).await?;
        let bytes = self
            .storage
            .read_file(&file.relative_path)
            .await
            .map_err(|e| VaultError::io(format!("reading '{}'", file.relative_path), e))?;
        Ok((bytes, content_type_for(&file)))
    }

    pub(crate) async fn move_file(
        &self,
        file_path: &str,
        target_dir_path: &str,
    ) -> Result<String, VaultError> {
        let (file, _) = self.resolver.find_file_with_parent(file_path).await?;
        let target = self.resolver.find_directory(target_dir_path).await?;
        if target.id == file.directory_id {
            return Ok(format!("'{}' is already in the target directory", file.name));
        }
        let resolved = self.resolve_file_conflict(&target, &file.name).await?;
        let replace_id = resolved.displaced.as_ref().map(|(f, _)| f.id);

        let new_relative_path = join_relative(&target.relative_path, &resolved.final_name);
        if let Err(e) = self
            .storage
            .rename(&file.relative_path, &new_relative_path)
            .await
        {
            let io_error = VaultError::io(format!("moving '{}'", file.relative_path), e);
            return Err(self
                .restore_displaced(&resolved.displaced, "MOVE_FILE", io_error)
                .await);
        }

        match self
            .catalog
            .commit(CatalogChange::RelocateFile {
                id: file.id,
                new_directory: target.id,
                new_name: resolved.final_name.clone(),
                new_relative_path: new_relative_path.clone(),
                replace: replace_id,
            })
            .await
        {
            Ok(()) => {
                self.invalidate_cache().await;
                if let Some((_, backup)) = &resolved.displaced {
                    self.discard_backup("MOVE_FILE", &new_relative_path, backup).await;
                }
                info!("Moved '{}' to '{new_relative_path}'", file.relative_path);
                Ok(format!("File '{}' moved", file.name))
            }
            Err(commit_error) => {
                let mut reversal = self
                    .storage
                    .rename(&new_relative_path, &file.relative_path)
                    .await;
                if reversal.is_ok() {
                    if let Some((existing, backup)) = &resolved.displaced {
                        reversal = self.storage.rename(backup, &existing.relative_path).await;
                    }
                }
                Err(rollback_outcome("MOVE_FILE", commit_error, reversal))
            }
        }
    }

    pub(crate) async fn rename_file(
        &self,
        path: &str,
        new_name: &str,
    ) -> Result<String, VaultError> {
        validate_name(new_name)?;
        let (file, parent) = self.resolver.find_file_with_parent(path).await?;
        if file.name == new_name {
            return Ok(format!("'{new_name}' is already the file's name"));
        }

        let case_only = names_equal(&file.name, new_name);
        if !case_only {
            // Renames never fall back to the overwrite/rename policies
            if self.catalog.child_directory(parent.id, new_name).await?.is_some()
                || self
                    .catalog
                    .child_file(parent.id, new_name)
                    .await?
                    .is_some_and(|f| f.id != file.id)
            {
                return Err(VaultError::NameConflict(format!(
                    "'{new_name}' already exists in '{}'",
                    parent.name
                )));
            }
        }

        let new_relative_path = join_relative(&parent.relative_path, new_name);
        let physical = if case_only {
            self.storage
                .rename_case_only(&file.relative_path, &new_relative_path)
                .await
        } else {
            self.storage
                .rename(&file.relative_path, &new_relative_path)
                .await
        };
        physical.map_err(|e| VaultError::io(format!("renaming '{}'", file.relative_path), e))?;

        match self
            .catalog
            .commit(CatalogChange::RelocateFile {
                id: file.id,
                new_directory: parent.id,
                new_name: new_name.to_string(),
                new_relative_path: new_relative_path.clone(),
                replace: None,
            })
            .await
        {
            Ok(()) => {
                self.invalidate_cache().await;
                info!("Renamed '{}' to '{new_name}'", file.name);
                Ok(format!("File renamed to '{new_name}'"))
            }
            Err(commit_error) => {
                let reversal = if case_only {
                    self.storage
                        .rename_case_only(&new_relative_path, &file.relative_path)
                        .await
                } else {
                    self.storage
                        .rename(&new_relative_path, &file.relative_path)
                        .await
                };
                Err(rollback_outcome("RENAME_FILE", commit_error, reversal))
            }
        }
    }

    pub(crate) async fn delete_file(&self, path: &str) -> Result<String, VaultError> {
        let (file, _) = self.resolver.find_file_with_parent(path).await?;

        let staged = self.storage.pending_delete_path(&file.relative_path);
        self.storage
            .rename(&file.relative_path, &staged)
            .await
            .map_err(|e| VaultError::io(format!("staging '{}' for deletion", file.relative_path), e))?;

        match self
            .catalog
            .commit(CatalogChange::DeleteFile { id: file.id })
            .await
        {
            Ok(()) => {
                self.invalidate_cache().await;
                if let Err(e) = self.storage.remove_file(&staged).await {
                    warn!("Failed to remove pending-delete copy '{staged}': {e}");
                    self.audit
                        .record(
                            "DELETE_FILE",
                            &[path, &staged],
                            AuditOutcome::Fail,
                            &format!("CLEANUP_FAILED: {e}"),
                        )
                        .await;
                }
                info!("Deleted file '{}'", file.relative_path);
                Ok(format!("File '{}' deleted", file.name))
            }
            Err(commit_error) => {
                let reversal = self.storage.rename(&staged, &file.relative_path).await;
                Err(rollback_outcome("DELETE_FILE", commit_error, reversal))
            }
        }
    }
}

/// Content type derived from the stored extension, falling back to the typed
/// kind of the record.
fn content_type_for(file: &FileNode) -> String {
    match file.extension.as_str() {
        "txt" | "log" | "md" => "text/plain",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        _ => match file.file_type {
            FileType::Word => "application/msword",
            FileType::Image => "application/octet-stream",
            FileType::Text => "text/plain",
        },
    }
    .to_string()
}
