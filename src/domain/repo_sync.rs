//! Versioned per-repository sync record and the store contract around it.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::Serialize;

use super::identity::{Account, ResourceType};
use crate::error::SyncError;

/// Lifecycle of a repository's sync record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// No stored row yet. Only ever held in memory.
    Absent,
    Running,
    Done,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Absent => "absent",
            SyncStatus::Running => "running",
            SyncStatus::Done => "done",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = SyncError;

    /// Parses a persisted status. `absent` is never stored and is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(SyncStatus::Running),
            "done" => Ok(SyncStatus::Done),
            other => Err(SyncError::InvalidRecord(format!(
                "unexpected stored status {other:?}"
            ))),
        }
    }
}

/// Normalized push notification handed to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoInfo {
    pub owner: Account,
    pub repo_id: String,
    pub resource_type: ResourceType,
    pub repo_name: String,
}

impl RepoInfo {
    /// Build from a validated owner and a repository name, classifying the repository.
    pub fn new(
        owner: Account,
        repo_id: impl Into<String>,
        repo_name: impl Into<String>,
    ) -> Result<Self, SyncError> {
        let repo_name = repo_name.into();
        let resource_type = ResourceType::parse_repo_name(&repo_name)?;

        Ok(Self {
            owner,
            repo_id: repo_id.into(),
            resource_type,
            repo_name,
        })
    }

    /// `owner/type/id`, used in logs and error messages.
    pub fn key(&self) -> String {
        format!("{}/{}/{}", self.owner, self.resource_type, self.repo_id)
    }
}

/// Persistent sync state for one (owner, resource type, repo id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSyncRecord {
    pub owner: Account,
    pub resource_type: ResourceType,
    pub repo_id: String,
    /// Last commit fully mirrored into storage; empty when never synced.
    pub last_commit: String,
    pub status: SyncStatus,
    /// Stored version; `None` until the record is first saved.
    pub version: Option<i32>,
}

impl RepoSyncRecord {
    /// In-memory record for a repository that has never been saved.
    pub fn absent(owner: Account, resource_type: ResourceType, repo_id: impl Into<String>) -> Self {
        Self {
            owner,
            resource_type,
            repo_id: repo_id.into(),
            last_commit: String::new(),
            status: SyncStatus::Absent,
            version: None,
        }
    }

    pub fn for_repo(info: &RepoInfo) -> Self {
        Self::absent(info.owner.clone(), info.resource_type, info.repo_id.clone())
    }

    pub fn is_running(&self) -> bool {
        self.status == SyncStatus::Running
    }

    /// Move to Running. A record that is already Running can't be started again.
    pub fn begin(&mut self) -> Result<(), SyncError> {
        if self.is_running() {
            return Err(SyncError::AlreadySyncing { repo: self.key() });
        }
        self.status = SyncStatus::Running;
        Ok(())
    }

    /// Move to Done, advancing `last_commit` only when a new commit is given.
    pub fn finish(&mut self, new_commit: Option<String>) {
        self.status = SyncStatus::Done;
        if let Some(commit) = new_commit {
            self.last_commit = commit;
        }
    }

    pub fn key(&self) -> String {
        format!("{}/{}/{}", self.owner, self.resource_type, self.repo_id)
    }
}

/// Compare-and-swap persistence for [`RepoSyncRecord`].
#[async_trait]
pub trait RepoSyncStore: Send + Sync {
    /// Load the stored record, failing with [`SyncError::NotFound`] when there is none.
    async fn find(
        &self,
        owner: &Account,
        resource_type: ResourceType,
        repo_id: &str,
    ) -> Result<RepoSyncRecord, SyncError>;

    /// Insert (no version) or conditionally update (matching version) the record.
    ///
    /// Returns the stored record with its new version. Fails with
    /// [`SyncError::DuplicateCreate`] when a concurrent insert won, or
    /// [`SyncError::ConcurrentUpdateConflict`] when the stored version moved on.
    async fn save(&self, record: &RepoSyncRecord) -> Result<RepoSyncRecord, SyncError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> RepoSyncRecord {
        RepoSyncRecord::absent(Account::new("alice").unwrap(), ResourceType::Project, "100")
    }

    #[test]
    fn test_absent_record_defaults() {
        let record = record();
        assert_eq!(record.status, SyncStatus::Absent);
        assert_eq!(record.last_commit, "");
        assert_eq!(record.version, None);
        assert_eq!(record.key(), "alice/project/100");
    }

    #[test]
    fn test_begin_refuses_running_record() {
        let mut record = record();
        record.begin().unwrap();
        assert!(record.is_running());

        assert!(matches!(
            record.begin(),
            Err(SyncError::AlreadySyncing { ref repo }) if repo == "alice/project/100"
        ));
    }

    #[test]
    fn test_finish_keeps_commit_on_failure() {
        let mut record = record();
        record.last_commit = "c0".to_string();
        record.begin().unwrap();

        record.finish(None);
        assert_eq!(record.status, SyncStatus::Done);
        assert_eq!(record.last_commit, "c0");

        record.begin().unwrap();
        record.finish(Some("c1".to_string()));
        assert_eq!(record.last_commit, "c1");
    }

    #[test]
    fn test_stored_status_round_trip() {
        assert_eq!("running".parse::<SyncStatus>().unwrap(), SyncStatus::Running);
        assert_eq!("done".parse::<SyncStatus>().unwrap(), SyncStatus::Done);
        assert!("absent".parse::<SyncStatus>().is_err());
    }

    #[test]
    fn test_repo_info_classifies_repo_name() {
        let info = RepoInfo::new(Account::new("bob").unwrap(), "7", "dataset-images").unwrap();
        assert_eq!(info.resource_type, ResourceType::Dataset);
        assert_eq!(info.key(), "bob/dataset/7");

        assert!(matches!(
            RepoInfo::new(Account::new("bob").unwrap(), "7", "images"),
            Err(SyncError::UnknownRepoType(_))
        ));
    }
}
