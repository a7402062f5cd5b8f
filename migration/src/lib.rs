//! Database migrations for the repo sync service.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2025_11_20_000001_create_repo_sync_tables;

pub use m2025_11_20_000001_create_repo_sync_tables::REPO_SYNC_TABLES;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m2025_11_20_000001_create_repo_sync_tables::Migration)]
    }
}
