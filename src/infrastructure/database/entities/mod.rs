//! Catalog entities

pub mod directory;
pub mod file;
pub mod node_tag;
