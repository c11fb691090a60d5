//! Initial migration: directories, files and node_tags tables

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Directories::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Directories::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Directories::ParentId).uuid())
                    .col(ColumnDef::new(Directories::Name).string().not_null())
                    .col(ColumnDef::new(Directories::RelativePath).string().not_null())
                    .col(ColumnDef::new(Directories::CreationOrder).big_integer().not_null())
                    .col(ColumnDef::new(Directories::CreatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(Directories::Table, Directories::ParentId)
                            .to(Directories::Table, Directories::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Files::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Files::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Files::DirectoryId).uuid().not_null())
                    .col(ColumnDef::new(Files::Name).string().not_null())
                    .col(ColumnDef::new(Files::Extension).string().not_null())
                    .col(ColumnDef::new(Files::SizeBytes).big_integer().not_null())
                    .col(ColumnDef::new(Files::FileType).string().not_null())
                    .col(ColumnDef::new(Files::TypeMetadata).json().not_null())
                    .col(ColumnDef::new(Files::RelativePath).string().not_null())
                    .col(ColumnDef::new(Files::CreationOrder).big_integer().not_null())
                    .col(ColumnDef::new(Files::CreatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(Files::Table, Files::DirectoryId)
                            .to(Directories::Table, Directories::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(NodeTags::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(NodeTags::Id).integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(NodeTags::NodeId).uuid().not_null())
                    .col(ColumnDef::new(NodeTags::NodeKind).string().not_null())
                    .col(ColumnDef::new(NodeTags::Tag).string().not_null())
                    .col(ColumnDef::new(NodeTags::CreatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        // Case-insensitive sibling-name uniqueness is the commit-time backstop
        // against racing writers; NOCASE needs raw SQL, the index DSL cannot
        // express a per-column collation.
        let conn = manager.get_connection();
        conn.execute_unprepared(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_directories_parent_name \
             ON directories(parent_id, name COLLATE NOCASE)",
        )
        .await?;
        conn.execute_unprepared(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_files_directory_name \
             ON files(directory_id, name COLLATE NOCASE)",
        )
        .await?;
        conn.execute_unprepared(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_node_tags_node_tag \
             ON node_tags(node_id, tag)",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(NodeTags::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Files::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Directories::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(Iden)]
enum Directories {
    Table,
    Id,
    ParentId,
    Name,
    RelativePath,
    CreationOrder,
    CreatedAt,
}

#[derive(Iden)]
enum Files {
    Table,
    Id,
    DirectoryId,
    Name,
    Extension,
    SizeBytes,
    FileType,
    TypeMetadata,
    RelativePath,
    CreationOrder,
    CreatedAt,
}

#[derive(Iden)]
enum NodeTags {
    Table,
    Id,
    NodeId,
    NodeKind,
    Tag,
    CreatedAt,
}
