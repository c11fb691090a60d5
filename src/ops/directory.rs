//! Directory lifecycle: create, delete, move, rename.
//!
//! Every operation follows the dual-write sequence: validate and resolve,
//! check conflicts, apply the physical change, commit the catalog change,
//! and reverse the physical change if the commit fails.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::node::{
    is_same_or_descendant, join_relative, names_equal, validate_name, DirectoryNode,
};
use crate::error::VaultError;
use crate::infrastructure::audit::AuditOutcome;
use crate::infrastructure::catalog::CatalogChange;
use crate::ops::{rollback_outcome, Coordinator};

impl Coordinator {
    pub(crate) async fn create_directory(
        &self,
        parent_path: &str,
        name: &str,
    ) -> Result<String, VaultError> {
        validate_name(name)?;
        let parent = self.resolver.find_directory(parent_path).await?;
        self.ensure_name_free(&parent, name).await?;

        let relative_path = join_relative(&parent.relative_path, name);
        let node = DirectoryNode {
            id: Uuid::new_v4(),
            parent_id: Some(parent.id),
            name: name.to_string(),
            relative_path: relative_path.clone(),
            creation_order: self.catalog.next_creation_order(parent.id).await?,
            created_at: Utc::now(),
        };

        self.storage
            .create_dir(&relative_path)
            .await
            .map_err(|e| VaultError::io(format!("creating directory '{relative_path}'"), e))?;

        match self.catalog.commit(CatalogChange::CreateDirectory(node)).await {
            Ok(()) => {
                self.invalidate_cache().await;
                info!("Created directory '{relative_path}'");
                Ok(format!("Directory '{name}' created"))
            }
            Err(commit_error) => {
                let reversal = self.storage.remove_dir_all(&relative_path).await;
                Err(rollback_outcome("CREATE_DIRECTORY", commit_error, reversal))
            }
        }
    }

    pub(crate) async fn delete_directory(&self, path: &str) -> Result<String, VaultError> {
        let (dir, parent) = self.resolver.find_directory_with_parent(path).await?;
        if parent.is_none() {
            return Err(VaultError::PolicyViolation(
                "the root directory cannot be deleted".into(),
            ));
        }
        let has_children = !self.catalog.child_directories(dir.id).await?.is_empty()
            || !self.catalog.child_files(dir.id).await?.is_empty();
        if has_children && !self.config.allow_recursive_delete {
            return Err(VaultError::PolicyViolation(format!(
                "'{}' is not empty and recursive delete is disabled",
                dir.name
            )));
        }

        // Stage the subtree at a unique sibling path so the deletion stays
        // reversible until the catalog commit lands.
        let staged = self.storage.pending_delete_path(&dir.relative_path);
        self.storage
            .rename(&dir.relative_path, &staged)
            .await
            .map_err(|e| VaultError::io(format!("staging '{}' for deletion", dir.relative_path), e))?;

        match self
            .catalog
            .commit(CatalogChange::DeleteDirectoryTree { root: dir.id })
            .await
        {
            Ok(()) => {
                self.invalidate_cache().await;
                if let Err(e) = self.storage.remove_dir_all(&staged).await {
                    warn!("Failed to remove pending-delete copy '{staged}': {e}");
                    self.audit
                        .record(
                            "DELETE_DIRECTORY",
                            &[path, &staged],
                            AuditOutcome::Fail,
                            &format!("CLEANUP_FAILED: {e}"),
                        )
                        .await;
                }
                info!("Deleted directory '{}'", dir.relative_path);
                Ok(format!("Directory '{}' deleted", dir.name))
            }
            Err(commit_error) => {
                let reversal = self.storage.rename(&staged, &dir.relative_path).await;
                Err(rollback_outcome("DELETE_DIRECTORY", commit_error, reversal))
            }
        }
    }

    pub(crate) async fn move_directory(
        &self,
        path: &str,
        target_parent_path: &str,
    ) -> Result<String, VaultError> {
        let (dir, parent) = self.resolver.find_directory_with_parent(path).await?;
        let Some(parent) = parent else {
            return Err(VaultError::PolicyViolation(
                "the root directory cannot be moved".into(),
            ));
        };
        let target = self.resolver.find_directory(target_parent_path).await?;
        if is_same_or_descendant(&dir.relative_path, &target.relative_path) {
            return Err(VaultError::PolicyViolation(format!(
                "cannot move '{}' into itself or one of its descendants",
                dir.name
            )));
        }
        if target.id == parent.id {
            return Ok(format!("'{}' is already in the target directory", dir.name));
        }
        self.ensure_name_free(&target, &dir.name).await?;

        let new_relative_path = join_relative(&target.relative_path, &dir.name);
        self.storage
            .rename(&dir.relative_path, &new_relative_path)
            .await
            .map_err(|e| VaultError::io(format!("moving '{}'", dir.relative_path), e))?;

        match self
            .catalog
            .commit(CatalogChange::RelocateDirectory {
                id: dir.id,
                new_parent: target.id,
                new_name: dir.name.clone(),
                new_relative_path: new_relative_path.clone(),
            })
            .await
        {
            Ok(()) => {
                self.invalidate_cache().await;
                info!("Moved directory '{}' to '{new_relative_path}'", dir.relative_path);
                Ok(format!("Directory '{}' moved", dir.name))
            }
            Err(commit_error) => {
                let reversal = self
                    .storage
                    .rename(&new_relative_path, &dir.relative_path)
                    .await;
                Err(rollback_outcome("MOVE_DIRECTORY", commit_error, reversal))
            }
        }
    }

    pub(crate) async fn rename_directory(
        &self,
        path: &str,
        new_name: &str,
    ) -> Result<String, VaultError> {
        validate_name(new_name)?;
        let (dir, parent) = self.resolver.find_directory_with_parent(path).await?;
        let Some(parent) = parent else {
            return Err(VaultError::PolicyViolation(
                "the root directory cannot be renamed".into(),
            ));
        };
        if dir.name == new_name {
            return Ok(format!("'{new_name}' is already the directory's name"));
        }

        // A case-only rename collides with nothing but itself; anything else
        // must not collide with any sibling.
        let case_only = names_equal(&dir.name, new_name);
        if !case_only {
            self.ensure_name_free(&parent, new_name).await?;
        }

        let new_relative_path = join_relative(&parent.relative_path, new_name);
        let physical = if case_only {
            self.storage
                .rename_case_only(&dir.relative_path, &new_relative_path)
                .await
        } else {
            self.storage
                .rename(&dir.relative_path, &new_relative_path)
                .await
        };
        physical.map_err(|e| VaultError::io(format!("renaming '{}'", dir.relative_path), e))?;

        match self
            .catalog
            .commit(CatalogChange::RelocateDirectory {
                id: dir.id,
                new_parent: parent.id,
                new_name: new_name.to_string(),
                new_relative_path: new_relative_path.clone(),
            })
            .await
        {
            Ok(()) => {
                self.invalidate_cache().await;
                info!("Renamed directory '{}' to '{new_name}'", dir.name);
                Ok(format!("Directory renamed to '{new_name}'"))
            }
            Err(commit_error) => {
                let reversal = if case_only {
                    self.storage
                        .rename_case_only(&new_relative_path, &dir.relative_path)
                        .await
                } else {
                    self.storage
                        .rename(&new_relative_path, &dir.relative_path)
                        .await
                };
                Err(rollback_outcome("RENAME_DIRECTORY", commit_error, reversal))
            }
        }
    }

    /// Hard sibling-collision check used wherever a directory name enters a
    /// parent: directories never silently rename on conflict.
    pub(crate) async fn ensure_name_free(
        &self,
        parent: &DirectoryNode,
        name: &str,
    ) -> Result<(), VaultError> {
        if self.catalog.child_directory(parent.id, name).await?.is_some()
            || self.catalog.child_file(parent.id, name).await?.is_some()
        {
            return Err(VaultError::NameConflict(format!(
                "'{name}' already exists in '{}'",
                parent.name
            )));
        }
        Ok(())
    }
}
