//! Domain model: namespace nodes, the materialized tree, and the tag
//! vocabulary.

pub mod node;
pub mod tag;
pub mod tree;

pub use node::{DirectoryNode, FileNode, FileType, NodeId, NodeKind, TypeMetadata};
pub use tag::{TagBinding, TagName};
pub use tree::{DirectoryTree, TreeDirectory};
