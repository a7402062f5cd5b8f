//! Repo sync repository for database operations
//!
//! Each resource type has its own table with the same schema. Queries are built with
//! sea-query against the table picked by [`ResourceType::table_name`], and every update
//! is conditional on the stored `version`.

use async_trait::async_trait;
use sea_orm::sea_query::{Alias, Expr, Query};
use sea_orm::{ConnectionTrait, DatabaseConnection, FromQueryResult};
use std::sync::Arc;
use tracing::debug;

use crate::domain::{Account, RepoSyncRecord, RepoSyncStore, ResourceType, SyncStatus};
use crate::error::{SyncError, is_unique_violation};
use crate::models::{RepoSyncColumn, RepoSyncRow};

/// Version assigned to a record on first insert.
pub const INITIAL_VERSION: i32 = 1;

/// Repository for repo sync state
#[derive(Debug, Clone)]
pub struct RepoSyncRepository {
    /// Database connection pool
    pub db: Arc<DatabaseConnection>,
}

impl RepoSyncRepository {
    /// Creates a new RepoSyncRepository instance
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn insert(&self, record: &RepoSyncRecord) -> Result<RepoSyncRecord, SyncError> {
        let mut insert = Query::insert();
        insert
            .into_table(Alias::new(record.resource_type.table_name()))
            .columns([
                RepoSyncColumn::Owner,
                RepoSyncColumn::RepoId,
                RepoSyncColumn::Status,
                RepoSyncColumn::Version,
                RepoSyncColumn::LastCommit,
            ]);
        insert
            .values([
                record.owner.as_str().into(),
                record.repo_id.as_str().into(),
                record.status.as_str().into(),
                INITIAL_VERSION.into(),
                record.last_commit.as_str().into(),
            ])
            .map_err(|err| SyncError::InvalidRecord(err.to_string()))?;

        let stmt = self.db.get_database_backend().build(&insert);
        let result = match self.db.execute(stmt).await {
            Ok(result) => result,
            Err(err) if is_unique_violation(&err) => return Err(SyncError::DuplicateCreate),
            Err(err) => return Err(err.into()),
        };

        if result.rows_affected() == 0 {
            return Err(SyncError::DuplicateCreate);
        }

        Ok(RepoSyncRecord {
            version: Some(INITIAL_VERSION),
            ..record.clone()
        })
    }

    async fn update(
        &self,
        record: &RepoSyncRecord,
        version: i32,
    ) -> Result<RepoSyncRecord, SyncError> {
        let update = Query::update()
            .table(Alias::new(record.resource_type.table_name()))
            .value(RepoSyncColumn::Status, record.status.as_str())
            .value(RepoSyncColumn::LastCommit, record.last_commit.as_str())
            .value(
                RepoSyncColumn::Version,
                Expr::col(RepoSyncColumn::Version).add(1),
            )
            .and_where(Expr::col(RepoSyncColumn::Owner).eq(record.owner.as_str()))
            .and_where(Expr::col(RepoSyncColumn::RepoId).eq(record.repo_id.as_str()))
            .and_where(Expr::col(RepoSyncColumn::Version).eq(version))
            .to_owned();

        let stmt = self.db.get_database_backend().build(&update);
        let result = self.db.execute(stmt).await?;

        if result.rows_affected() == 0 {
            return Err(SyncError::ConcurrentUpdateConflict { version });
        }

        Ok(RepoSyncRecord {
            version: Some(version + 1),
            ..record.clone()
        })
    }
}

#[async_trait]
impl RepoSyncStore for RepoSyncRepository {
    async fn find(
        &self,
        owner: &Account,
        resource_type: ResourceType,
        repo_id: &str,
    ) -> Result<RepoSyncRecord, SyncError> {
        let select = Query::select()
            .columns([
                RepoSyncColumn::Owner,
                RepoSyncColumn::RepoId,
                RepoSyncColumn::Status,
                RepoSyncColumn::Version,
                RepoSyncColumn::LastCommit,
            ])
            .from(Alias::new(resource_type.table_name()))
            .and_where(Expr::col(RepoSyncColumn::Owner).eq(owner.as_str()))
            .and_where(Expr::col(RepoSyncColumn::RepoId).eq(repo_id))
            .limit(1)
            .to_owned();

        let stmt = self.db.get_database_backend().build(&select);
        let row = RepoSyncRow::find_by_statement(stmt)
            .one(self.db.as_ref())
            .await?;

        match row {
            Some(row) => row.into_record(resource_type),
            None => Err(SyncError::NotFound),
        }
    }

    async fn save(&self, record: &RepoSyncRecord) -> Result<RepoSyncRecord, SyncError> {
        if record.status == SyncStatus::Absent {
            return Err(SyncError::InvalidRecord(format!(
                "{} can't be stored with status absent",
                record.key()
            )));
        }

        let saved = match record.version {
            None => self.insert(record).await?,
            Some(version) => self.update(record, version).await?,
        };

        debug!(
            repo = %saved.key(),
            status = %saved.status,
            version = saved.version,
            "Saved repo sync record"
        );

        Ok(saved)
    }
}
