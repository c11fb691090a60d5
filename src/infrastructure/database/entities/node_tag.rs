//! Node-tag binding entity
//!
//! Polymorphic binding of one tag to exactly one directory or file, keyed by
//! node identity so bindings survive rename and move.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "node_tags")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub node_id: Uuid,
    /// "directory" or "file"
    pub node_kind: String,
    /// One of the fixed `TagName` values
    pub tag: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
