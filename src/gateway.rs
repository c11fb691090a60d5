//! Public operation surface.
//!
//! Every mutation funnels through here: the coordinator does the work, the
//! outcome is normalized into an [`OperationResult`], and exactly one audit
//! line records the terminal outcome. Queries go through the same funnel so
//! failed lookups are audited too.

use std::path::Path;

use crate::domain::node::FileType;
use crate::domain::tag::TagName;
use crate::domain::tree::DirectoryTree;
use crate::error::{FileDownloadResult, OperationResult, VaultError};
use crate::infrastructure::audit::AuditOutcome;
use crate::ops::tags::{PathTags, SortKey, SortState, TagQueryResult};
use crate::ops::file::UploadRequest;
use crate::ops::CancelFlag;
use crate::Vault;

impl Vault {
    pub async fn create_directory(&self, parent_path: &str, name: &str) -> OperationResult {
        let result = self.coordinator.create_directory(parent_path, name).await;
        self.finish("CREATE_DIRECTORY", &[parent_path, name], result)
            .await
    }

    pub async fn delete_directory(&self, path: &str) -> OperationResult {
        let result = self.coordinator.delete_directory(path).await;
        self.finish("DELETE_DIRECTORY", &[path], result).await
    }

    pub async fn move_directory(&self, path: &str, target_parent_path: &str) -> OperationResult {
        let result = self
            .coordinator
            .move_directory(path, target_parent_path)
            .await;
        self.finish("MOVE_DIRECTORY", &[path, target_parent_path], result)
            .await
    }

    pub async fn rename_directory(&self, path: &str, new_name: &str) -> OperationResult {
        let result = self.coordinator.rename_directory(path, new_name).await;
        self.finish("RENAME_DIRECTORY", &[path, new_name], result)
            .await
    }

    pub async fn copy_directory(
        &self,
        source_path: &str,
        target_parent_path: &str,
        new_name: Option<&str>,
        cancel: Option<&CancelFlag>,
    ) -> OperationResult {
        let result = self
            .coordinator
            .copy_directory(source_path, target_parent_path, new_name, cancel)
            .await;
        self.finish(
            "COPY_DIRECTORY",
            &[source_path, target_parent_path, new_name.unwrap_or("")],
            result,
        )
        .await
    }

    pub async fn upload_file(
        &self,
        request: UploadRequest,
        file_type: FileType,
    ) -> OperationResult {
        let directory_path = request.directory_path.clone();
        let file_name = request.file_name.clone();
        let result = self.coordinator.upload_file(request, file_type).await;
        self.finish("UPLOAD_FILE", &[&directory_path, &file_name], result)
            .await
    }

    pub async fn download_file(&self, path: &str, target: &Path) -> OperationResult {
        let result = self.coordinator.download_file(path, target).await;
        self.finish("DOWNLOAD_FILE", &[path, &target.display().to_string()], result)
            .await
    }

    pub async fn download_file_content(&self, path: &str) -> FileDownloadResult {
        match self.coordinator.download_file_content(path).await {
            Ok((bytes, content_type)) => {
                let detail = format!("{} bytes", bytes.len());
                self.audit("DOWNLOAD_FILE_CONTENT", &[path], AuditOutcome::Success, &detail)
                    .await;
                FileDownloadResult {
                    success: true,
                    bytes,
                    content_type,
                    message: format!("Downloaded '{path}'"),
                }
            }
            Err(e) => {
                self.audit(
                    "DOWNLOAD_FILE_CONTENT",
                    &[path],
                    AuditOutcome::Fail,
                    &format!("{}: {e}", e.code()),
                )
                .await;
                FileDownloadResult::failed(&e)
            }
        }
    }

    pub async fn move_file(&self, file_path: &str, target_dir_path: &str) -> OperationResult {
        let result = self.coordinator.move_file(file_path, target_dir_path).await;
        self.finish("MOVE_FILE", &[file_path, target_dir_path], result)
            .await
    }

    pub async fn rename_file(&self, path: &str, new_name: &str) -> OperationResult {
        let result = self.coordinator.rename_file(path, new_name).await;
        self.finish("RENAME_FILE", &[path, new_name], result).await
    }

    pub async fn delete_file(&self, path: &str) -> OperationResult {
        let result = self.coordinator.delete_file(path).await;
        self.finish("DELETE_FILE", &[path], result).await
    }

    pub async fn assign_tag(&self, path: &str, tag: &str) -> OperationResult {
        let result = match TagName::parse(tag) {
            Ok(tag) => self.coordinator.assign_tag(path, tag).await,
            Err(e) => Err(e),
        };
        self.finish("ASSIGN_TAG", &[path, tag], result).await
    }

    pub async fn remove_tag(&self, path: &str, tag: &str) -> OperationResult {
        let result = match TagName::parse(tag) {
            Ok(tag) => self.coordinator.remove_tag(path, tag).await,
            Err(e) => Err(e),
        };
        self.finish("REMOVE_TAG", &[path, tag], result).await
    }

    /// Tags on one path, or every tagged path when `scope` is `None`.
    pub async fn list_tags(&self, scope: Option<&str>) -> Result<Vec<PathTags>, VaultError> {
        let result = self.coordinator.list_tags(scope).await;
        self.finish_query(
            "LIST_TAGS",
            &[scope.unwrap_or("")],
            result,
            |tags| format!("{} tagged paths", tags.len()),
        )
        .await
    }

    /// Paths carrying a tag, optionally restricted to a directory subtree.
    pub async fn find_tags(
        &self,
        tag: &str,
        scope: Option<&str>,
    ) -> Result<TagQueryResult, VaultError> {
        let result = match TagName::parse(tag) {
            Ok(tag) => self.coordinator.find_tags(tag, scope).await,
            Err(e) => Err(e),
        };
        self.finish_query(
            "FIND_TAGS",
            &[tag, scope.unwrap_or("")],
            result,
            |found| format!("{} matches", found.paths.len()),
        )
        .await
    }

    pub async fn set_sort_order(&self, key: SortKey, ascending: bool) -> OperationResult {
        let result = self
            .coordinator
            .set_sort_state(SortState { key, ascending })
            .await;
        self.finish("SET_SORT_ORDER", &[&key.to_string()], result).await
    }

    pub async fn undo(&self) -> OperationResult {
        let result = self.coordinator.undo().await;
        self.finish("UNDO", &[], result).await
    }

    pub async fn redo(&self) -> OperationResult {
        let result = self.coordinator.redo().await;
        self.finish("REDO", &[], result).await
    }

    /// The materialized namespace tree, served from the cache when fresh.
    pub async fn load_root_tree(&self) -> Result<DirectoryTree, VaultError> {
        let result = self.coordinator.load_root_tree().await;
        self.finish_query("LOAD_ROOT_TREE", &[], result, |_| "loaded".to_string())
            .await
    }

    /// The namespace tree serialized as JSON.
    pub async fn export_tree(&self) -> Result<String, VaultError> {
        let result = self.coordinator.export_tree().await;
        self.finish_query("EXPORT_TREE", &[], result, |json| {
            format!("{} bytes", json.len())
        })
        .await
    }

    async fn finish(
        &self,
        operation: &str,
        args: &[&str],
        result: Result<String, VaultError>,
    ) -> OperationResult {
        match &result {
            Ok(message) => self.audit(operation, args, AuditOutcome::Success, message).await,
            Err(e) => {
                self.audit(operation, args, AuditOutcome::Fail, &format!("{}: {e}", e.code()))
                    .await
            }
        }
        result.into()
    }

    async fn finish_query<T>(
        &self,
        operation: &str,
        args: &[&str],
        result: Result<T, VaultError>,
        describe: impl FnOnce(&T) -> String,
    ) -> Result<T, VaultError> {
        match &result {
            Ok(value) => {
                self.audit(operation, args, AuditOutcome::Success, &describe(value))
                    .await
            }
            Err(e) => {
                self.audit(operation, args, AuditOutcome::Fail, &format!("{}: {e}", e.code()))
                    .await
            }
        }
        result
    }

    async fn audit(&self, operation: &str, args: &[&str], outcome: AuditOutcome, detail: &str) {
        self.coordinator
            .audit
            .record(operation, args, outcome, detail)
            .await;
    }
}
