//! # Domain Types
//!
//! Value types validated at the system boundary and the versioned sync record that
//! gates concurrent sync attempts.

pub mod identity;
pub mod repo_sync;

pub use identity::{Account, ResourceType};
pub use repo_sync::{RepoInfo, RepoSyncRecord, RepoSyncStore, SyncStatus};
