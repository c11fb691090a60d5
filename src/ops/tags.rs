//! Path-addressed tag overlay with undo/redo.
//!
//! Tags bind to node identities in the catalog, so they follow a node
//! through renames and moves and disappear with it on delete. The public
//! surface speaks logical paths; the translation happens here.

use std::collections::HashMap;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::info;

use crate::domain::node::{names_equal, DirectoryNode, NodeId, NodeKind};
use crate::domain::tag::{TagBinding, TagName};
use crate::error::VaultError;
use crate::infrastructure::catalog::CatalogChange;
use crate::ops::Coordinator;

/// Tags attached to one logical path.
#[derive(Debug, Clone, Serialize)]
pub struct PathTags {
    pub path: String,
    pub tags: Vec<String>,
}

/// All paths carrying one tag within a scope.
#[derive(Debug, Clone, Serialize)]
pub struct TagQueryResult {
    pub tag: String,
    pub color: String,
    pub scope_path: String,
    pub paths: Vec<String>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
pub enum SortKey {
    #[default]
    Name,
    CreatedAt,
    Size,
}

/// Listing order preference, tracked alongside tag edits in the same
/// undo/redo history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub key: SortKey,
    pub ascending: bool,
}

impl Default for SortState {
    fn default() -> Self {
        Self {
            key: SortKey::Name,
            ascending: true,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum HistoryEntry {
    Tag {
        path: String,
        tag: TagName,
        assigned: bool,
    },
    Sort {
        prev: SortState,
        next: SortState,
    },
}

/// Undo/redo stacks plus the current sort preference. A fresh user action
/// clears the redo stack.
#[derive(Debug, Default)]
pub(crate) struct History {
    undo: Vec<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    pub(crate) sort: SortState,
}

impl Coordinator {
    pub(crate) async fn assign_tag(&self, path: &str, tag: TagName) -> Result<String, VaultError> {
        let (node_id, node_kind) = self.resolve_node(path).await?;
        let changed = self.apply_tag(node_id, node_kind, tag, true).await?;
        if changed {
            let mut history = self.history.lock().await;
            history.undo.push(HistoryEntry::Tag {
                path: path.to_string(),
                tag,
                assigned: true,
            });
            history.redo.clear();
            info!("Tagged '{path}' with '{tag}'");
            Ok(format!("Tag '{tag}' assigned to '{path}'"))
        } else {
            Ok(format!("'{path}' already carries tag '{tag}'"))
        }
    }

    pub(crate) async fn remove_tag(&self, path: &str, tag: TagName) -> Result<String, VaultError> {
        let (node_id, node_kind) = self.resolve_node(path).await?;
        let changed = self.apply_tag(node_id, node_kind, tag, false).await?;
        if changed {
            let mut history = self.history.lock().await;
            history.undo.push(HistoryEntry::Tag {
                path: path.to_string(),
                tag,
                assigned: false,
            });
            history.redo.clear();
            info!("Removed tag '{tag}' from '{path}'");
            Ok(format!("Tag '{tag}' removed from '{path}'"))
        } else {
            Ok(format!("'{path}' does not carry tag '{tag}'"))
        }
    }

    pub(crate) async fn set_sort_state(&self, next: SortState) -> Result<String, VaultError> {
        let mut history = self.history.lock().await;
        let prev = history.sort;
        if prev == next {
            return Ok("Sort order unchanged".to_string());
        }
        history.sort = next;
        history.undo.push(HistoryEntry::Sort { prev, next });
        history.redo.clear();
        Ok(format!(
            "Sorting by {} ({})",
            next.key,
            if next.ascending { "ascending" } else { "descending" }
        ))
    }

    pub(crate) async fn undo(&self) -> Result<String, VaultError> {
        let entry = {
            let mut history = self.history.lock().await;
            let Some(entry) = history.undo.pop() else {
                return Ok("Nothing to undo".to_string());
            };
            if let HistoryEntry::Sort { prev, .. } = &entry {
                history.sort = *prev;
            }
            history.redo.push(entry.clone());
            entry
        };
        match entry {
            HistoryEntry::Tag {
                path,
                tag,
                assigned,
            } => {
                // Undo reverses the recorded action.
                let (node_id, node_kind) = self.resolve_node(&path).await?;
                self.apply_tag(node_id, node_kind, tag, !assigned).await?;
                Ok(format!(
                    "Undid {} of tag '{tag}' on '{path}'",
                    if assigned { "assignment" } else { "removal" }
                ))
            }
            HistoryEntry::Sort { prev, .. } => Ok(format!("Sort order restored to {}", prev.key)),
        }
    }

    pub(crate) async fn redo(&self) -> Result<String, VaultError> {
        let entry = {
            let mut history = self.history.lock().await;
            let Some(entry) = history.redo.pop() else {
                return Ok("Nothing to redo".to_string());
            };
            if let HistoryEntry::Sort { next, .. } = &entry {
                history.sort = *next;
            }
            history.undo.push(entry.clone());
            entry
        };
        match entry {
            HistoryEntry::Tag {
                path,
                tag,
                assigned,
            } => {
                let (node_id, node_kind) = self.resolve_node(&path).await?;
                self.apply_tag(node_id, node_kind, tag, assigned).await?;
                Ok(format!(
                    "Redid {} of tag '{tag}' on '{path}'",
                    if assigned { "assignment" } else { "removal" }
                ))
            }
            HistoryEntry::Sort { next, .. } => Ok(format!("Sort order restored to {}", next.key)),
        }
    }

    /// Tags on one node, or on every tagged node when no scope is given.
    pub(crate) async fn list_tags(
        &self,
        scope: Option<&str>,
    ) -> Result<Vec<PathTags>, VaultError> {
        match scope {
            Some(path) => {
                let (node_id, _) = self.resolve_node(path).await?;
                let tags = self.catalog.tags_for_node(node_id).await?;
                Ok(vec![PathTags {
                    path: path.to_string(),
                    tags: tags.iter().map(|t| t.to_string()).collect(),
                }])
            }
            None => {
                let paths = self.paths_by_node().await?;
                let mut grouped: HashMap<NodeId, Vec<TagName>> = HashMap::new();
                for binding in self.catalog.all_tag_bindings().await? {
                    grouped.entry(binding.node_id).or_default().push(binding.tag);
                }
                let mut out: Vec<PathTags> = grouped
                    .into_iter()
                    .filter_map(|(id, tags)| {
                        paths.get(&id).map(|path| PathTags {
                            path: path.clone(),
                            tags: tags.iter().map(|t| t.to_string()).collect(),
                        })
                    })
                    .collect();
                out.sort_by(|a, b| a.path.cmp(&b.path));
                Ok(out)
            }
        }
    }

    /// Paths carrying `tag`, restricted to the scope subtree when given.
    /// The scope matches itself and its descendants on segment boundaries,
    /// never by name prefix.
    pub(crate) async fn find_tags(
        &self,
        tag: TagName,
        scope: Option<&str>,
    ) -> Result<TagQueryResult, VaultError> {
        let scope_path = match scope {
            Some(path) => {
                let dir = self.resolver.find_directory(path).await?;
                Some(self.logical_path(&dir.relative_path))
            }
            None => None,
        };
        let paths = self.paths_by_node().await?;
        let mut matches: Vec<String> = self
            .catalog
            .all_tag_bindings()
            .await?
            .into_iter()
            .filter(|binding| binding.tag == tag)
            .filter_map(|binding| paths.get(&binding.node_id).cloned())
            .filter(|path| match &scope_path {
                Some(scope) => {
                    names_equal(path, scope)
                        || path
                            .to_lowercase()
                            .starts_with(&format!("{}/", scope.to_lowercase()))
                }
                None => true,
            })
            .collect();
        matches.sort();
        Ok(TagQueryResult {
            tag: tag.to_string(),
            color: tag.color().to_string(),
            scope_path: scope_path.unwrap_or_else(|| self.config.root_name.clone()),
            paths: matches,
        })
    }

    /// Resolve a logical path to a node identity, preferring the directory
    /// interpretation over a file of the same path.
    pub(crate) async fn resolve_node(
        &self,
        path: &str,
    ) -> Result<(NodeId, NodeKind), VaultError> {
        match self.resolver.find_directory(path).await {
            Ok(dir) => Ok((dir.id, NodeKind::Directory)),
            Err(VaultError::NotFound(_)) => {
                let (file, _) = self.resolver.find_file_with_parent(path).await?;
                Ok((file.id, NodeKind::File))
            }
            Err(e) => Err(e),
        }
    }

    /// Commit a single tag assignment or removal. Returns whether the
    /// catalog actually changed.
    async fn apply_tag(
        &self,
        node_id: NodeId,
        node_kind: NodeKind,
        tag: TagName,
        assign: bool,
    ) -> Result<bool, VaultError> {
        let present = self.catalog.tags_for_node(node_id).await?.contains(&tag);
        if assign == present {
            return Ok(false);
        }
        let change = if assign {
            CatalogChange::AssignTag(TagBinding {
                node_id,
                node_kind,
                tag,
            })
        } else {
            CatalogChange::RemoveTag { node_id, tag }
        };
        self.catalog.commit(change).await?;
        Ok(true)
    }

    /// Logical path of a node from its storage-relative path: the root name
    /// followed by the relative segments.
    pub(crate) fn logical_path(&self, relative_path: &str) -> String {
        if relative_path.is_empty() {
            self.config.root_name.clone()
        } else {
            format!("{}/{relative_path}", self.config.root_name)
        }
    }

    /// Map every node identity to its logical path by walking the hierarchy
    /// from the root.
    async fn paths_by_node(&self) -> Result<HashMap<NodeId, String>, VaultError> {
        let root = self
            .catalog
            .root_directory()
            .await?
            .ok_or_else(|| VaultError::NotFound("namespace root".into()))?;
        let mut map = HashMap::new();
        self.collect_paths(&root, &mut map).await?;
        Ok(map)
    }

    fn collect_paths<'a>(
        &'a self,
        dir: &'a DirectoryNode,
        map: &'a mut HashMap<NodeId, String>,
    ) -> BoxFuture<'a, Result<(), VaultError>> {
        Box::pin(async move {
            map.insert(dir.id, self.logical_path(&dir.relative_path));
            for file in self.catalog.child_files(dir.id).await? {
                map.insert(file.id, self.logical_path(&file.relative_path));
            }
            for child in self.catalog.child_directories(dir.id).await? {
                self.collect_paths(&child, map).await?;
            }
            Ok(())
        })
    }
}
