//! # Data Models
//!
//! Persisted row shapes and API response models.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod repo_sync;

pub use repo_sync::{RepoSyncColumn, RepoSyncRow};

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "reposync".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
