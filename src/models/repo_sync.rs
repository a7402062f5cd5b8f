//! Row shape of the per-resource-type repo sync tables.
//!
//! The three tables share one schema, so rows are read through a plain
//! [`FromQueryResult`] struct instead of one entity per table.

use sea_orm::{DeriveIden, FromQueryResult};

use crate::domain::{Account, RepoSyncRecord, ResourceType, SyncStatus};
use crate::error::SyncError;

/// Columns shared by the `project`, `model` and `dataset` tables.
#[derive(Debug, Clone, Copy, DeriveIden)]
pub enum RepoSyncColumn {
    Id,
    Owner,
    RepoId,
    Status,
    Version,
    LastCommit,
}

/// A stored repo sync row
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult)]
pub struct RepoSyncRow {
    pub owner: String,
    pub repo_id: String,
    pub status: String,
    pub version: i32,
    pub last_commit: String,
}

impl RepoSyncRow {
    /// Convert into the domain record for the table the row was read from.
    pub fn into_record(self, resource_type: ResourceType) -> Result<RepoSyncRecord, SyncError> {
        let owner = Account::new(self.owner)
            .map_err(|err| SyncError::InvalidRecord(format!("stored owner: {err}")))?;
        let status: SyncStatus = self.status.parse()?;

        Ok(RepoSyncRecord {
            owner,
            resource_type,
            repo_id: self.repo_id,
            last_commit: self.last_commit,
            status,
            version: Some(self.version),
        })
    }
}
