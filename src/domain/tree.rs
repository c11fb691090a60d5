//! In-memory materialized namespace tree.
//!
//! This is the model handed out by the tree cache and the export surface.
//! Structural helpers here enforce the sibling-uniqueness and path-congruence
//! invariants locally; the dual-write coordinator keeps the substrates
//! themselves consistent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::node::{
    join_relative, names_equal, validate_name, DirectoryNode, FileNode, NodeId,
};
use crate::error::VaultError;

/// A directory with its materialized children, ordered by creation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeDirectory {
    pub node: DirectoryNode,
    pub directories: Vec<TreeDirectory>,
    pub files: Vec<FileNode>,
}

impl TreeDirectory {
    pub fn new(node: DirectoryNode) -> Self {
        Self {
            node,
            directories: Vec::new(),
            files: Vec::new(),
        }
    }

    /// Whether any child (directory or file) already uses this name,
    /// case-insensitively. `exclude` skips one node, for rename checks.
    pub fn child_name_taken(&self, name: &str, exclude: Option<NodeId>) -> bool {
        self.directories
            .iter()
            .any(|d| Some(d.node.id) != exclude && names_equal(&d.node.name, name))
            || self
                .files
                .iter()
                .any(|f| Some(f.id) != exclude && names_equal(&f.name, name))
    }

    fn next_creation_order(&self) -> i64 {
        self.directories
            .iter()
            .map(|d| d.node.creation_order)
            .chain(self.files.iter().map(|f| f.creation_order))
            .max()
            .map_or(1, |n| n + 1)
    }

    /// Create and insert a child directory.
    pub fn add_directory(
        &mut self,
        name: &str,
        created_at: DateTime<Utc>,
    ) -> Result<&TreeDirectory, VaultError> {
        validate_name(name)?;
        if self.child_name_taken(name, None) {
            return Err(VaultError::NameConflict(format!(
                "'{}' already exists in '{}'",
                name, self.node.name
            )));
        }
        let node = DirectoryNode {
            id: Uuid::new_v4(),
            parent_id: Some(self.node.id),
            name: name.to_string(),
            relative_path: join_relative(&self.node.relative_path, name),
            creation_order: self.next_creation_order(),
            created_at,
        };
        self.directories.push(TreeDirectory::new(node));
        Ok(self.directories.last().unwrap())
    }

    /// Insert a file, taking ownership and rehoming it under this directory.
    pub fn add_file(&mut self, mut file: FileNode) -> Result<(), VaultError> {
        validate_name(&file.name)?;
        if self.child_name_taken(&file.name, None) {
            return Err(VaultError::NameConflict(format!(
                "'{}' already exists in '{}'",
                file.name, self.node.name
            )));
        }
        file.directory_id = self.node.id;
        file.relative_path = join_relative(&self.node.relative_path, &file.name);
        if file.creation_order == 0 {
            file.creation_order = self.next_creation_order();
        }
        self.files.push(file);
        Ok(())
    }

    pub fn remove_directory(&mut self, name: &str) -> bool {
        let before = self.directories.len();
        self.directories.retain(|d| !names_equal(&d.node.name, name));
        self.directories.len() != before
    }

    pub fn remove_file(&mut self, name: &str) -> bool {
        let before = self.files.len();
        self.files.retain(|f| !names_equal(&f.name, name));
        self.files.len() != before
    }

    /// Detach a child directory subtree, leaving its node untouched.
    pub fn detach_directory(&mut self, name: &str) -> Option<TreeDirectory> {
        let idx = self
            .directories
            .iter()
            .position(|d| names_equal(&d.node.name, name))?;
        Some(self.directories.remove(idx))
    }

    /// Attach a detached subtree under this directory.
    ///
    /// Fails with the rejected subtree when a case-insensitive sibling name
    /// already exists; callers performing a move must re-attach the subtree
    /// to its original parent to keep the model consistent with the rejected
    /// operation.
    pub fn attach_directory(
        &mut self,
        mut child: TreeDirectory,
    ) -> Result<(), (TreeDirectory, VaultError)> {
        if self.child_name_taken(&child.node.name, None) {
            let err = VaultError::NameConflict(format!(
                "'{}' already exists in '{}'",
                child.node.name, self.node.name
            ));
            return Err((child, err));
        }
        child.node.parent_id = Some(self.node.id);
        child.rebase(&self.node.relative_path);
        self.directories.push(child);
        Ok(())
    }

    /// Rename a child directory, keeping identity and recomputing the
    /// relative paths of the whole subtree.
    pub fn rename_directory(&mut self, name: &str, new_name: &str) -> Result<(), VaultError> {
        validate_name(new_name)?;
        let id = self
            .directories
            .iter()
            .find(|d| names_equal(&d.node.name, name))
            .map(|d| d.node.id)
            .ok_or_else(|| VaultError::NotFound(format!("directory '{name}'")))?;
        if self.child_name_taken(new_name, Some(id)) {
            return Err(VaultError::NameConflict(format!(
                "'{}' already exists in '{}'",
                new_name, self.node.name
            )));
        }
        let parent_rel = self.node.relative_path.clone();
        let child = self
            .directories
            .iter_mut()
            .find(|d| d.node.id == id)
            .unwrap();
        child.node.name = new_name.to_string();
        child.rebase(&parent_rel);
        Ok(())
    }

    /// Rename a child file, keeping identity and refreshing its extension.
    pub fn rename_file(&mut self, name: &str, new_name: &str) -> Result<(), VaultError> {
        validate_name(new_name)?;
        let id = self
            .files
            .iter()
            .find(|f| names_equal(&f.name, name))
            .map(|f| f.id)
            .ok_or_else(|| VaultError::NotFound(format!("file '{name}'")))?;
        if self.child_name_taken(new_name, Some(id)) {
            return Err(VaultError::NameConflict(format!(
                "'{}' already exists in '{}'",
                new_name, self.node.name
            )));
        }
        let parent_rel = self.node.relative_path.clone();
        let file = self.files.iter_mut().find(|f| f.id == id).unwrap();
        file.name = new_name.to_string();
        file.extension = crate::domain::node::extension_of(new_name);
        file.relative_path = join_relative(&parent_rel, new_name);
        Ok(())
    }

    /// Recompute `relative_path` of this node and every descendant from a new
    /// parent path.
    fn rebase(&mut self, parent_relative: &str) {
        self.node.relative_path = join_relative(parent_relative, &self.node.name);
        let own = self.node.relative_path.clone();
        for file in &mut self.files {
            file.relative_path = join_relative(&own, &file.name);
        }
        for dir in &mut self.directories {
            dir.rebase(&own);
        }
    }

    /// Keep children in stable creation order after out-of-order inserts.
    pub fn sort_children(&mut self) {
        self.directories
            .sort_by_key(|d| d.node.creation_order);
        self.files.sort_by_key(|f| f.creation_order);
        for dir in &mut self.directories {
            dir.sort_children();
        }
    }
}

/// The fully materialized namespace tree, rooted at the singleton root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryTree {
    pub root: TreeDirectory,
}

impl DirectoryTree {
    pub fn new(root: DirectoryNode) -> Self {
        Self {
            root: TreeDirectory::new(root),
        }
    }

    /// Find a directory by slash-delimited segments below the root.
    pub fn find_directory(&self, segments: &[&str]) -> Option<&TreeDirectory> {
        let mut current = &self.root;
        for segment in segments {
            current = current
                .directories
                .iter()
                .find(|d| names_equal(&d.node.name, segment))?;
        }
        Some(current)
    }

    pub fn find_directory_mut(&mut self, segments: &[&str]) -> Option<&mut TreeDirectory> {
        let mut current = &mut self.root;
        for segment in segments {
            current = current
                .directories
                .iter_mut()
                .find(|d| names_equal(&d.node.name, segment))?;
        }
        Some(current)
    }

    /// Serialize the tree for export.
    pub fn to_json(&self) -> Result<String, VaultError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Rebuild a tree from an exported representation, re-validating the
    /// structural invariants.
    pub fn from_json(json: &str) -> Result<Self, VaultError> {
        let tree: DirectoryTree = serde_json::from_str(json)?;
        if tree.root.node.parent_id.is_some() {
            return Err(VaultError::Validation(
                "root must not have a parent".into(),
            ));
        }
        if !tree.root.node.relative_path.is_empty() {
            return Err(VaultError::Validation(
                "root relative path must be empty".into(),
            ));
        }
        validate_subtree(&tree.root)?;
        Ok(tree)
    }
}

fn validate_subtree(dir: &TreeDirectory) -> Result<(), VaultError> {
    let mut seen: Vec<&str> = Vec::new();
    for name in dir
        .directories
        .iter()
        .map(|d| d.node.name.as_str())
        .chain(dir.files.iter().map(|f| f.name.as_str()))
    {
        validate_name(name)?;
        if seen.iter().any(|s| names_equal(s, name)) {
            return Err(VaultError::Validation(format!(
                "duplicate sibling name '{}' under '{}'",
                name, dir.node.name
            )));
        }
        seen.push(name);
    }
    for child in &dir.directories {
        if child.node.relative_path
            != join_relative(&dir.node.relative_path, &child.node.name)
        {
            return Err(VaultError::Validation(format!(
                "relative path of '{}' does not match its ancestor chain",
                child.node.name
            )));
        }
        validate_subtree(child)?;
    }
    for file in &dir.files {
        if file.relative_path != join_relative(&dir.node.relative_path, &file.name) {
            return Err(VaultError::Validation(format!(
                "relative path of '{}' does not match its ancestor chain",
                file.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::node::{extension_of, FileType, TypeMetadata};

    fn root() -> DirectoryTree {
        DirectoryTree::new(DirectoryNode {
            id: Uuid::new_v4(),
            parent_id: None,
            name: "Root".to_string(),
            relative_path: String::new(),
            creation_order: 0,
            created_at: Utc::now(),
        })
    }

    fn file(name: &str) -> FileNode {
        FileNode {
            id: Uuid::new_v4(),
            directory_id: Uuid::nil(),
            name: name.to_string(),
            extension: extension_of(name),
            size_bytes: 10,
            file_type: FileType::Text,
            metadata: TypeMetadata::Text {
                encoding: "utf-8".into(),
            },
            relative_path: String::new(),
            creation_order: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn sibling_names_are_unique_across_kinds() {
        let mut tree = root();
        tree.root.add_directory("Docs", Utc::now()).unwrap();
        // Same name as the directory, only the case differs
        let err = tree.root.add_file(file("docs")).unwrap_err();
        assert_eq!(err.code(), "NAME_CONFLICT");
    }

    #[test]
    fn attach_rejects_collision_and_returns_subtree() {
        let mut tree = root();
        tree.root.add_directory("A", Utc::now()).unwrap();
        tree.root.add_directory("B", Utc::now()).unwrap();
        let detached = tree.root.detach_directory("B").unwrap();

        // Renaming the detached copy to collide with A must be rejected
        let mut renamed = detached.clone();
        renamed.node.name = "a".to_string();
        let (rejected, err) = tree.root.attach_directory(renamed).unwrap_err();
        assert_eq!(err.code(), "NAME_CONFLICT");
        assert_eq!(rejected.node.name, "a");

        // Re-attach the original to keep the model consistent
        tree.root.attach_directory(detached).unwrap();
        assert!(tree.find_directory(&["B"]).is_some());
    }

    #[test]
    fn attach_rebases_descendant_paths() {
        let mut tree = root();
        tree.root.add_directory("A", Utc::now()).unwrap();
        {
            let b = tree.find_directory_mut(&["A"]).unwrap();
            b.add_directory("Inner", Utc::now()).unwrap();
            b.files.push(file("note.txt"));
            b.rebase("");
        }
        let a = tree.root.detach_directory("A").unwrap();
        tree.root.add_directory("Target", Utc::now()).unwrap();
        let target = tree.find_directory_mut(&["Target"]).unwrap();
        target.attach_directory(a).unwrap();

        let moved = tree.find_directory(&["Target", "A", "Inner"]).unwrap();
        assert_eq!(moved.node.relative_path, "Target/A/Inner");
        let moved_a = tree.find_directory(&["Target", "A"]).unwrap();
        assert_eq!(moved_a.files[0].relative_path, "Target/A/note.txt");
    }

    #[test]
    fn rename_recomputes_subtree_paths() {
        let mut tree = root();
        tree.root.add_directory("Docs", Utc::now()).unwrap();
        tree.find_directory_mut(&["Docs"])
            .unwrap()
            .add_directory("Drafts", Utc::now())
            .unwrap();
        tree.root.rename_directory("Docs", "Papers").unwrap();
        assert_eq!(
            tree.find_directory(&["Papers", "Drafts"])
                .unwrap()
                .node
                .relative_path,
            "Papers/Drafts"
        );
    }

    #[test]
    fn export_round_trip_preserves_structure() {
        let mut tree = root();
        tree.root.add_directory("Docs", Utc::now()).unwrap();
        tree.find_directory_mut(&["Docs"])
            .unwrap()
            .add_file(file("report.txt"))
            .unwrap();
        let json = tree.to_json().unwrap();
        let rebuilt = DirectoryTree::from_json(&json).unwrap();
        assert_eq!(tree, rebuilt);
    }

    #[test]
    fn import_rejects_duplicate_siblings() {
        let mut tree = root();
        tree.root.add_directory("Docs", Utc::now()).unwrap();
        let json = tree.to_json().unwrap();
        let mut forged = DirectoryTree::from_json(&json).unwrap();
        let dup = forged.root.directories[0].clone();
        forged.root.directories.push(dup);
        let reexported = forged.to_json().unwrap();
        assert!(DirectoryTree::from_json(&reexported).is_err());
    }
}
