//! Migration to create the per-resource-type repo sync tables.
//!
//! Every resource kind gets its own table with an identical schema. Rows are keyed by
//! (owner, repo_id) and carry the optimistic-concurrency `version` column used to gate
//! concurrent sync attempts.

use sea_orm_migration::prelude::*;

/// Table names, one per resource kind. Must stay in sync with `ResourceType::table_name`.
pub const REPO_SYNC_TABLES: [&str; 3] = ["project", "model", "dataset"];

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in REPO_SYNC_TABLES {
            manager
                .create_table(
                    Table::create()
                        .table(Alias::new(table))
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RepoSync::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(RepoSync::Owner).string().not_null())
                        .col(ColumnDef::new(RepoSync::RepoId).string().not_null())
                        .col(ColumnDef::new(RepoSync::Status).string().not_null())
                        .col(
                            ColumnDef::new(RepoSync::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(RepoSync::LastCommit)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .to_owned(),
                )
                .await?;

            // Unique key backs the insert-on-first-use race: the loser sees a violation.
            manager
                .create_index(
                    Index::create()
                        .name(format!("idx_{table}_owner_repo_id"))
                        .table(Alias::new(table))
                        .col(RepoSync::Owner)
                        .col(RepoSync::RepoId)
                        .unique()
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in REPO_SYNC_TABLES {
            manager
                .drop_index(
                    Index::drop()
                        .name(format!("idx_{table}_owner_repo_id"))
                        .to_owned(),
                )
                .await?;

            manager
                .drop_table(Table::drop().table(Alias::new(table)).to_owned())
                .await?;
        }

        Ok(())
    }
}

#[derive(DeriveIden)]
enum RepoSync {
    Id,
    Owner,
    RepoId,
    Status,
    Version,
    LastCommit,
}
