//! Infrastructure: the two substrates (catalog, physical storage), the tree
//! cache and the audit trail.

pub mod audit;
pub mod cache;
pub mod catalog;
pub mod database;
pub mod storage;
