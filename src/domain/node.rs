//! Namespace node records shared by the catalog, the storage layer and the
//! in-memory tree model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::error::VaultError;

/// Opaque node identity, stable across rename and move.
pub type NodeId = Uuid;

/// Which kind of node a polymorphic reference (e.g. a tag binding) points at.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum NodeKind {
    Directory,
    File,
}

/// Typed kind of a file record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum FileType {
    Word,
    Image,
    Text,
}

/// Type-specific metadata carried by a file record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeMetadata {
    Word { page_count: u32 },
    Image { width: u32, height: u32 },
    Text { encoding: String },
}

impl TypeMetadata {
    /// Default metadata for a freshly uploaded file of the given type.
    pub fn default_for(file_type: FileType) -> Self {
        match file_type {
            FileType::Word => Self::Word { page_count: 1 },
            FileType::Image => Self::Image { width: 0, height: 0 },
            FileType::Text => Self::Text {
                encoding: "utf-8".to_string(),
            },
        }
    }
}

/// A directory row as both substrates see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryNode {
    pub id: NodeId,
    /// `None` only for the singleton root
    pub parent_id: Option<NodeId>,
    pub name: String,
    /// Storage-root-relative path; empty for the root
    pub relative_path: String,
    pub creation_order: i64,
    pub created_at: DateTime<Utc>,
}

impl DirectoryNode {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// A file row as both substrates see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileNode {
    pub id: NodeId,
    pub directory_id: NodeId,
    pub name: String,
    pub extension: String,
    pub size_bytes: i64,
    pub file_type: FileType,
    pub metadata: TypeMetadata,
    pub relative_path: String,
    pub creation_order: i64,
    pub created_at: DateTime<Utc>,
}

/// Strategy for deciding whether two sibling names collide. Selected once per
/// backend; the SQLite catalog mirrors this with `COLLATE NOCASE` indexes.
pub trait NameEquality: Send + Sync {
    fn eq(&self, a: &str, b: &str) -> bool;
}

/// Case-insensitive comparison via Unicode lowercasing, the collation the
/// SQLite backend approximates with NOCASE.
#[derive(Debug, Default, Clone, Copy)]
pub struct CaseInsensitiveNames;

impl NameEquality for CaseInsensitiveNames {
    fn eq(&self, a: &str, b: &str) -> bool {
        a.to_lowercase() == b.to_lowercase()
    }
}

/// Case-insensitive sibling-name comparison used throughout the crate.
pub fn names_equal(a: &str, b: &str) -> bool {
    CaseInsensitiveNames.eq(a, b)
}

/// Validate a single node name. Rejects empty or whitespace-only names,
/// names containing path separators, and the `.` / `..` traversal names.
pub fn validate_name(name: &str) -> Result<(), VaultError> {
    if name.trim().is_empty() {
        return Err(VaultError::Validation("name must not be empty".into()));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(VaultError::Validation(format!(
            "name '{name}' must not contain path separators"
        )));
    }
    if name == "." || name == ".." {
        return Err(VaultError::Validation(format!(
            "name '{name}' is reserved"
        )));
    }
    Ok(())
}

/// Join a parent's relative path with a child name.
pub fn join_relative(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// Whether `candidate` is `ancestor` itself or nested anywhere below it.
///
/// Comparison is at path-segment boundaries, so `A` is not an ancestor of
/// `AB`. Both paths are storage-root-relative and compared case-insensitively.
pub fn is_same_or_descendant(ancestor: &str, candidate: &str) -> bool {
    let ancestor = ancestor.to_lowercase();
    let candidate = candidate.to_lowercase();
    candidate == ancestor || candidate.starts_with(&format!("{ancestor}/"))
}

/// Split a file name into (stem, extension-with-dot). `report.txt` becomes
/// `("report", ".txt")`; a name without a dot has an empty extension.
pub fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

/// Extension without the leading dot, lowercased, as stored on file rows.
pub fn extension_of(name: &str) -> String {
    let (_, ext) = split_name(name);
    ext.trim_start_matches('.').to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_validation_rejects_bad_names() {
        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("a\\b").is_err());
        assert!(validate_name(".").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("Report.txt").is_ok());
    }

    #[test]
    fn descendant_check_respects_segment_boundaries() {
        assert!(is_same_or_descendant("A", "A"));
        assert!(is_same_or_descendant("A", "A/B"));
        assert!(is_same_or_descendant("a", "A/b/c"));
        assert!(!is_same_or_descendant("A", "AB"));
        assert!(!is_same_or_descendant("A", "AB/C"));
    }

    #[test]
    fn split_name_keeps_leading_dot_files_whole() {
        assert_eq!(split_name("report.txt"), ("report", ".txt"));
        assert_eq!(split_name("archive.tar.gz"), ("archive.tar", ".gz"));
        assert_eq!(split_name("README"), ("README", ""));
        assert_eq!(split_name(".gitignore"), (".gitignore", ""));
        assert_eq!(extension_of("Photo.PNG"), "png");
    }
}
