//! Catalog port and its SQLite implementation.
//!
//! Reads are plain typed queries. Every mutation goes through a single
//! [`Catalog::commit`] call carrying one [`CatalogChange`], executed inside a
//! database transaction; this is the "commit" step of the dual-write
//! coordinator, and the only point where a metadata failure can surface after
//! the physical substrate has already been touched.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionError, TransactionTrait,
};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::domain::node::{
    extension_of, DirectoryNode, FileNode, FileType, NodeId, NodeKind, TypeMetadata,
};
use crate::domain::tag::{TagBinding, TagName};
use crate::infrastructure::database::entities::{directory, file, node_tag};
use crate::infrastructure::database::Database;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("database error: {0}")]
    Db(#[from] DbErr),

    /// The unique sibling-name index rejected the commit; a racing writer or
    /// an unseen collision
    #[error("unique name constraint violated: {0}")]
    UniqueViolation(String),

    /// A stored row could not be mapped back into the domain model
    #[error("corrupt catalog row: {0}")]
    Corrupt(String),
}

impl CatalogError {
    fn classify(self) -> Self {
        match self {
            Self::Db(e) if e.to_string().contains("UNIQUE constraint failed") => {
                Self::UniqueViolation(e.to_string())
            }
            other => other,
        }
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// One atomic catalog mutation, committed as a single transaction.
#[derive(Debug, Clone)]
pub enum CatalogChange {
    CreateDirectory(DirectoryNode),
    CreateFile {
        file: FileNode,
        /// File row displaced by overwrite conflict resolution, removed in
        /// the same transaction
        replace: Option<NodeId>,
    },
    /// Remove a directory and every descendant row, with their tag bindings
    DeleteDirectoryTree { root: NodeId },
    DeleteFile { id: NodeId },
    /// Move and/or rename a directory; descendant relative paths are
    /// rewritten in the same transaction
    RelocateDirectory {
        id: NodeId,
        new_parent: NodeId,
        new_name: String,
        new_relative_path: String,
    },
    RelocateFile {
        id: NodeId,
        new_directory: NodeId,
        new_name: String,
        new_relative_path: String,
        replace: Option<NodeId>,
    },
    AssignTag(TagBinding),
    RemoveTag { node_id: NodeId, tag: TagName },
}

impl CatalogChange {
    /// Short label used for logging and for targeting injected failures in
    /// tests.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateDirectory(_) => "create_directory",
            Self::CreateFile { .. } => "create_file",
            Self::DeleteDirectoryTree { .. } => "delete_directory_tree",
            Self::DeleteFile { .. } => "delete_file",
            Self::RelocateDirectory { .. } => "relocate_directory",
            Self::RelocateFile { .. } => "relocate_file",
            Self::AssignTag(_) => "assign_tag",
            Self::RemoveTag { .. } => "remove_tag",
        }
    }
}

/// Port over the relational metadata substrate.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn ensure_root(&self, name: &str) -> CatalogResult<DirectoryNode>;
    async fn root_directory(&self) -> CatalogResult<Option<DirectoryNode>>;
    async fn directory_by_id(&self, id: NodeId) -> CatalogResult<Option<DirectoryNode>>;
    async fn file_by_id(&self, id: NodeId) -> CatalogResult<Option<FileNode>>;
    /// Case-insensitive lookup of a child directory by name
    async fn child_directory(&self, parent: NodeId, name: &str)
        -> CatalogResult<Option<DirectoryNode>>;
    /// Case-insensitive lookup of a child file by name
    async fn child_file(&self, parent: NodeId, name: &str) -> CatalogResult<Option<FileNode>>;
    /// Child directories ordered by creation order
    async fn child_directories(&self, parent: NodeId) -> CatalogResult<Vec<DirectoryNode>>;
    /// Child files ordered by creation order
    async fn child_files(&self, parent: NodeId) -> CatalogResult<Vec<FileNode>>;
    async fn all_directories(&self) -> CatalogResult<Vec<DirectoryNode>>;
    async fn all_files(&self) -> CatalogResult<Vec<FileNode>>;
    /// Next monotonic creation order within one sibling group
    async fn next_creation_order(&self, parent: NodeId) -> CatalogResult<i64>;
    async fn tags_for_node(&self, node: NodeId) -> CatalogResult<Vec<TagName>>;
    async fn all_tag_bindings(&self) -> CatalogResult<Vec<TagBinding>>;
    /// Apply one mutation atomically
    async fn commit(&self, change: CatalogChange) -> CatalogResult<()>;
}

/// SeaORM-backed catalog over SQLite.
#[derive(Clone)]
pub struct SqliteCatalog {
    conn: DatabaseConnection,
}

impl SqliteCatalog {
    pub fn new(db: &Database) -> Self {
        Self {
            conn: db.conn().clone(),
        }
    }
}

fn dir_from_model(m: directory::Model) -> DirectoryNode {
    DirectoryNode {
        id: m.id,
        parent_id: m.parent_id,
        name: m.name,
        relative_path: m.relative_path,
        creation_order: m.creation_order,
        created_at: m.created_at,
    }
}

fn file_from_model(m: file::Model) -> CatalogResult<FileNode> {
    let file_type = FileType::from_str(&m.file_type)
        .map_err(|_| CatalogError::Corrupt(format!("unknown file type '{}'", m.file_type)))?;
    let metadata: TypeMetadata = serde_json::from_value(m.type_metadata)
        .map_err(|e| CatalogError::Corrupt(format!("bad type metadata for '{}': {e}", m.name)))?;
    Ok(FileNode {
        id: m.id,
        directory_id: m.directory_id,
        name: m.name,
        extension: m.extension,
        size_bytes: m.size_bytes,
        file_type,
        metadata,
        relative_path: m.relative_path,
        creation_order: m.creation_order,
        created_at: m.created_at,
    })
}

fn file_active(f: &FileNode) -> CatalogResult<file::ActiveModel> {
    let metadata = serde_json::to_value(&f.metadata)
        .map_err(|e| CatalogError::Corrupt(format!("unserializable metadata: {e}")))?;
    Ok(file::ActiveModel {
        id: Set(f.id),
        directory_id: Set(f.directory_id),
        name: Set(f.name.clone()),
        extension: Set(f.extension.clone()),
        size_bytes: Set(f.size_bytes),
        file_type: Set(f.file_type.to_string()),
        type_metadata: Set(metadata),
        relative_path: Set(f.relative_path.clone()),
        creation_order: Set(f.creation_order),
        created_at: Set(f.created_at),
    })
}

fn tag_from_model(m: node_tag::Model) -> CatalogResult<TagBinding> {
    let node_kind = NodeKind::from_str(&m.node_kind)
        .map_err(|_| CatalogError::Corrupt(format!("unknown node kind '{}'", m.node_kind)))?;
    let tag = TagName::from_str(&m.tag)
        .map_err(|_| CatalogError::Corrupt(format!("unknown tag '{}'", m.tag)))?;
    Ok(TagBinding {
        node_id: m.node_id,
        node_kind,
        tag,
    })
}

fn name_filter_dir(name: &str) -> sea_orm::sea_query::SimpleExpr {
    Expr::expr(Func::lower(Expr::col(directory::Column::Name))).eq(name.to_lowercase())
}

fn name_filter_file(name: &str) -> sea_orm::sea_query::SimpleExpr {
    Expr::expr(Func::lower(Expr::col(file::Column::Name))).eq(name.to_lowercase())
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn ensure_root(&self, name: &str) -> CatalogResult<DirectoryNode> {
        if let Some(root) = self.root_directory().await? {
            return Ok(root);
        }
        let root = DirectoryNode {
            id: Uuid::new_v4(),
            parent_id: None,
            name: name.to_string(),
            relative_path: String::new(),
            creation_order: 0,
            created_at: Utc::now(),
        };
        directory::ActiveModel {
            id: Set(root.id),
            parent_id: Set(None),
            name: Set(root.name.clone()),
            relative_path: Set(String::new()),
            creation_order: Set(0),
            created_at: Set(root.created_at),
        }
        .insert(&self.conn)
        .await?;
        debug!("Seeded namespace root '{}'", root.name);
        Ok(root)
    }

    async fn root_directory(&self) -> CatalogResult<Option<DirectoryNode>> {
        Ok(directory::Entity::find()
            .filter(directory::Column::ParentId.is_null())
            .one(&self.conn)
            .await?
            .map(dir_from_model))
    }

    async fn directory_by_id(&self, id: NodeId) -> CatalogResult<Option<DirectoryNode>> {
        Ok(directory::Entity::find_by_id(id)
            .one(&self.conn)
            .await?
            .map(dir_from_model))
    }

    async fn file_by_id(&self, id: NodeId) -> CatalogResult<Option<FileNode>> {
        file::Entity::find_by_id(id)
            .one(&self.conn)
            .await?
            .map(file_from_model)
            .transpose()
    }

    async fn child_directory(
        &self,
        parent: NodeId,
        name: &str,
    ) -> CatalogResult<Option<DirectoryNode>> {
        Ok(directory::Entity::find()
            .filter(directory::Column::ParentId.eq(parent))
            .filter(name_filter_dir(name))
            .one(&self.conn)
            .await?
            .map(dir_from_model))
    }

    async fn child_file(&self, parent: NodeId, name: &str) -> CatalogResult<Option<FileNode>> {
        file::Entity::find()
            .filter(file::Column::DirectoryId.eq(parent))
            .filter(name_filter_file(name))
            .one(&self.conn)
            .await?
            .map(file_from_model)
            .transpose()
    }

    async fn child_directories(&self, parent: NodeId) -> CatalogResult<Vec<DirectoryNode>> {
        Ok(directory::Entity::find()
            .filter(directory::Column::ParentId.eq(parent))
            .order_by_asc(directory::Column::CreationOrder)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(dir_from_model)
            .collect())
    }

    async fn child_files(&self, parent: NodeId) -> CatalogResult<Vec<FileNode>> {
        file::Entity::find()
            .filter(file::Column::DirectoryId.eq(parent))
            .order_by_asc(file::Column::CreationOrder)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(file_from_model)
            .collect()
    }

    async fn all_directories(&self) -> CatalogResult<Vec<DirectoryNode>> {
        Ok(directory::Entity::find()
            .order_by_asc(directory::Column::CreationOrder)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(dir_from_model)
            .collect())
    }

    async fn all_files(&self) -> CatalogResult<Vec<FileNode>> {
        file::Entity::find()
            .order_by_asc(file::Column::CreationOrder)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(file_from_model)
            .collect()
    }

    async fn next_creation_order(&self, parent: NodeId) -> CatalogResult<i64> {
        let top_dir = directory::Entity::find()
            .filter(directory::Column::ParentId.eq(parent))
            .order_by_desc(directory::Column::CreationOrder)
            .one(&self.conn)
            .await?
            .map(|m| m.creation_order);
        let top_file = file::Entity::find()
            .filter(file::Column::DirectoryId.eq(parent))
            .order_by_desc(file::Column::CreationOrder)
            .one(&self.conn)
            .await?
            .map(|m| m.creation_order);
        Ok(top_dir.into_iter().chain(top_file).max().map_or(1, |n| n + 1))
    }

    async fn tags_for_node(&self, node: NodeId) -> CatalogResult<Vec<TagName>> {
        node_tag::Entity::find()
            .filter(node_tag::Column::NodeId.eq(node))
            .all(&self.conn)
            .await?
            .into_iter()
            .map(|m| tag_from_model(m).map(|b| b.tag))
            .collect()
    }

    async fn all_tag_bindings(&self) -> CatalogResult<Vec<TagBinding>> {
        node_tag::Entity::find()
            .all(&self.conn)
            .await?
            .into_iter()
            .map(tag_from_model)
            .collect()
    }

    async fn commit(&self, change: CatalogChange) -> CatalogResult<()> {
        debug!("Committing catalog change: {}", change.kind());
        let result = self
            .conn
            .transaction::<_, (), CatalogError>(move |txn| {
                Box::pin(async move {
                    match change {
                        CatalogChange::CreateDirectory(node) => {
                            directory::ActiveModel {
                                id: Set(node.id),
                                parent_id: Set(node.parent_id),
                                name: Set(node.name),
                                relative_path: Set(node.relative_path),
                                creation_order: Set(node.creation_order),
                                created_at: Set(node.created_at),
                            }
                            .insert(txn)
                            .await?;
                        }
                        CatalogChange::CreateFile { file: f, replace } => {
                            if let Some(displaced) = replace {
                                node_tag::Entity::delete_many()
                                    .filter(node_tag::Column::NodeId.eq(displaced))
                                    .exec(txn)
                                    .await?;
                                file::Entity::delete_by_id(displaced).exec(txn).await?;
                            }
                            file_active(&f)?.insert(txn).await?;
                        }
                        CatalogChange::DeleteDirectoryTree { root } => {
                            // Collect the subtree level by level so directory
                            // rows can be deleted children-first under the
                            // self-referencing foreign key.
                            let mut levels: Vec<Vec<Uuid>> = vec![vec![root]];
                            loop {
                                let frontier = levels.last().unwrap().clone();
                                let children: Vec<Uuid> = directory::Entity::find()
                                    .filter(directory::Column::ParentId.is_in(frontier))
                                    .all(txn)
                                    .await?
                                    .into_iter()
                                    .map(|m| m.id)
                                    .collect();
                                if children.is_empty() {
                                    break;
                                }
                                levels.push(children);
                            }
                            let all_dirs: Vec<Uuid> =
                                levels.iter().flatten().copied().collect();
                            let file_ids: Vec<Uuid> = file::Entity::find()
                                .filter(file::Column::DirectoryId.is_in(all_dirs.clone()))
                                .all(txn)
                                .await?
                                .into_iter()
                                .map(|m| m.id)
                                .collect();
                            node_tag::Entity::delete_many()
                                .filter(
                                    node_tag::Column::NodeId
                                        .is_in(all_dirs.clone().into_iter().chain(file_ids.clone())),
                                )
                                .exec(txn)
                                .await?;
                            file::Entity::delete_many()
                                .filter(file::Column::Id.is_in(file_ids))
                                .exec(txn)
                                .await?;
                            for level in levels.iter().rev() {
                                directory::Entity::delete_many()
                                    .filter(directory::Column::Id.is_in(level.clone()))
                                    .exec(txn)
                                    .await?;
                            }
                        }
                        CatalogChange::DeleteFile { id } => {
                            node_tag::Entity::delete_many()
                                .filter(node_tag::Column::NodeId.eq(id))
                                .exec(txn)
                                .await?;
                            file::Entity::delete_by_id(id).exec(txn).await?;
                        }
                        CatalogChange::RelocateDirectory {
                            id,
                            new_parent,
                            new_name,
                            new_relative_path,
                        } => {
                            let old = directory::Entity::find_by_id(id)
                                .one(txn)
                                .await?
                                .ok_or_else(|| {
                                    CatalogError::Corrupt(format!("directory {id} vanished"))
                                })?;
                            let old_prefix = format!("{}/", old.relative_path);
                            directory::ActiveModel {
                                id: Set(id),
                                parent_id: Set(Some(new_parent)),
                                name: Set(new_name),
                                relative_path: Set(new_relative_path.clone()),
                                ..Default::default()
                            }
                            .update(txn)
                            .await?;
                            // Rewrite every descendant path under the old prefix.
                            let descendants = directory::Entity::find().all(txn).await?;
                            for d in descendants {
                                if let Some(suffix) = d.relative_path.strip_prefix(&old_prefix) {
                                    let rewritten =
                                        format!("{}/{}", new_relative_path, suffix);
                                    directory::ActiveModel {
                                        id: Set(d.id),
                                        relative_path: Set(rewritten),
                                        ..Default::default()
                                    }
                                    .update(txn)
                                    .await?;
                                }
                            }
                            let files = file::Entity::find().all(txn).await?;
                            for f in files {
                                if let Some(suffix) = f.relative_path.strip_prefix(&old_prefix) {
                                    let rewritten =
                                        format!("{}/{}", new_relative_path, suffix);
                                    file::ActiveModel {
                                        id: Set(f.id),
                                        relative_path: Set(rewritten),
                                        ..Default::default()
                                    }
                                    .update(txn)
                                    .await?;
                                }
                            }
                        }
                        CatalogChange::RelocateFile {
                            id,
                            new_directory,
                            new_name,
                            new_relative_path,
                            replace,
                        } => {
                            if let Some(displaced) = replace {
                                node_tag::Entity::delete_many()
                                    .filter(node_tag::Column::NodeId.eq(displaced))
                                    .exec(txn)
                                    .await?;
                                file::Entity::delete_by_id(displaced).exec(txn).await?;
                            }
                            file::ActiveModel {
                                id: Set(id),
                                directory_id: Set(new_directory),
                                extension: Set(extension_of(&new_name)),
                                name: Set(new_name),
                                relative_path: Set(new_relative_path),
                                ..Default::default()
                            }
                            .update(txn)
                            .await?;
                        }
                        CatalogChange::AssignTag(binding) => {
                            let existing = node_tag::Entity::find()
                                .filter(node_tag::Column::NodeId.eq(binding.node_id))
                                .filter(node_tag::Column::Tag.eq(binding.tag.to_string()))
                                .one(txn)
                                .await?;
                            if existing.is_none() {
                                node_tag::ActiveModel {
                                    node_id: Set(binding.node_id),
                                    node_kind: Set(binding.node_kind.to_string()),
                                    tag: Set(binding.tag.to_string()),
                                    created_at: Set(Utc::now()),
                                    ..Default::default()
                                }
                                .insert(txn)
                                .await?;
                            }
                        }
                        CatalogChange::RemoveTag { node_id, tag } => {
                            node_tag::Entity::delete_many()
                                .filter(node_tag::Column::NodeId.eq(node_id))
                                .filter(node_tag::Column::Tag.eq(tag.to_string()))
                                .exec(txn)
                                .await?;
                        }
                    }
                    Ok(())
                })
            })
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Connection(e)) => Err(CatalogError::from(e).classify()),
            Err(TransactionError::Transaction(e)) => Err(e.classify()),
        }
    }
}
