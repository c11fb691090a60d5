//! Logical path resolution.
//!
//! Paths are slash-delimited and start at the root's name. Resolution walks
//! the catalog level by level rather than matching stored path strings, so
//! equal names at different depths can never be mistaken for one another.

use std::sync::Arc;

use crate::domain::node::{names_equal, DirectoryNode, FileNode};
use crate::error::VaultError;
use crate::infrastructure::catalog::Catalog;

#[derive(Clone)]
pub struct PathResolver {
    catalog: Arc<dyn Catalog>,
}

impl PathResolver {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }

    /// Split a logical path into its segments, dropping empty ones so
    /// `Root//Docs/` and `Root/Docs` are the same path.
    pub fn segments(path: &str) -> Vec<&str> {
        path.split('/').filter(|s| !s.trim().is_empty()).collect()
    }

    async fn root(&self) -> Result<DirectoryNode, VaultError> {
        self.catalog
            .root_directory()
            .await?
            .ok_or_else(|| VaultError::NotFound("namespace root".into()))
    }

    /// Resolve a directory path, returning the directory itself.
    pub async fn find_directory(&self, path: &str) -> Result<DirectoryNode, VaultError> {
        let (dir, _) = self.find_directory_with_parent(path).await?;
        Ok(dir)
    }

    /// Resolve a directory path, returning the directory and its parent
    /// (`None` for the root).
    pub async fn find_directory_with_parent(
        &self,
        path: &str,
    ) -> Result<(DirectoryNode, Option<DirectoryNode>), VaultError> {
        let segments = Self::segments(path);
        let root = self.root().await?;
        let Some(first) = segments.first() else {
            return Err(VaultError::Validation("path must not be empty".into()));
        };
        if !names_equal(first, &root.name) {
            return Err(VaultError::Validation(format!(
                "path '{path}' must start at the root '{}'",
                root.name
            )));
        }

        let mut parent: Option<DirectoryNode> = None;
        let mut current = root;
        for segment in &segments[1..] {
            let next = self
                .catalog
                .child_directory(current.id, segment)
                .await?
                .ok_or_else(|| VaultError::NotFound(format!("directory '{path}'")))?;
            parent = Some(current);
            current = next;
        }
        Ok((current, parent))
    }

    /// Resolve a file path, returning the file and its owning directory.
    pub async fn find_file_with_parent(
        &self,
        path: &str,
    ) -> Result<(FileNode, DirectoryNode), VaultError> {
        let segments = Self::segments(path);
        if segments.len() < 2 {
            return Err(VaultError::Validation(format!(
                "'{path}' is not a file path"
            )));
        }
        let file_name = segments[segments.len() - 1];
        let parent_path = segments[..segments.len() - 1].join("/");
        let parent = self.find_directory(&parent_path).await?;
        let file = self
            .catalog
            .child_file(parent.id, file_name)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("file '{path}'")))?;
        Ok((file, parent))
    }
}
