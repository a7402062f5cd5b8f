//! # Hosting Platform
//!
//! Read-only view of the hosting platform: the current head commit of a repository and
//! the authenticated URL to clone it from. Calls are not retried here.

pub mod gitlab;

use async_trait::async_trait;

use crate::domain::Account;
use crate::error::SyncError;

pub use gitlab::GitLabPlatform;

#[async_trait]
pub trait Platform: Send + Sync {
    /// Head commit of the default branch, or an empty string for a repository with no
    /// commits. Failures are [`SyncError::PlatformQueryFailure`].
    async fn last_commit(&self, repo_id: &str) -> Result<String, SyncError>;

    /// Authenticated clone endpoint for `owner/repo_name`.
    fn clone_url(&self, owner: &Account, repo_name: &str) -> String;
}
