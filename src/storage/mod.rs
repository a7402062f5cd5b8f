//! # Object Storage
//!
//! The [`ObjectStore`] trait is the blob store the mirrored repositories land in.
//! [`ObjectLayout`] derives every key the service touches, and [`RepoStorage`] wraps
//! the store with retries for the operations a sync performs.

pub mod http;
pub mod memory;
pub mod sigv4;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::SyncConfig;
use crate::domain::{Account, ResourceType};
use crate::error::SyncError;
use crate::retry::RetryPolicy;

pub use http::HttpObjectStore;
pub use memory::MemoryObjectStore;
pub use sigv4::Signer;

/// Length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// Key/value blob storage with server-side copy.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read an object. `Ok(None)` means the key does not exist.
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, SyncError>;

    async fn put_object(&self, key: &str, content: Vec<u8>) -> Result<(), SyncError>;

    /// Copy `src` to `dst` without moving the bytes through this process.
    async fn copy_object(&self, dst: &str, src: &str) -> Result<(), SyncError>;
}

/// Key scheme for mirrored repositories and content-addressed large objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLayout {
    repo_root: String,
    lfs_root: String,
    commit_file: String,
}

impl ObjectLayout {
    pub fn new(
        repo_root: impl Into<String>,
        lfs_root: impl Into<String>,
        commit_file: impl Into<String>,
    ) -> Self {
        Self {
            repo_root: repo_root.into(),
            lfs_root: lfs_root.into(),
            commit_file: commit_file.into(),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            config.repo_path.clone(),
            config.lfs_path.clone(),
            config.commit_file.clone(),
        )
    }

    /// `{repo_root}/{owner}/{type}/{repo_id}`
    pub fn repo_prefix(&self, owner: &Account, resource_type: ResourceType, repo_id: &str) -> String {
        join_key(&[
            &self.repo_root,
            owner.as_str(),
            resource_type.as_str(),
            repo_id,
        ])
    }

    /// Destination of a repository file.
    pub fn destination_key(
        &self,
        owner: &Account,
        resource_type: ResourceType,
        repo_id: &str,
        path: &str,
    ) -> String {
        join_key(&[&self.repo_prefix(owner, resource_type, repo_id), path])
    }

    /// Content-addressed source key `{lfs_root}/{d[0:2]}/{d[2:4]}/{d[4:]}`.
    pub fn large_object_key(&self, digest: &str) -> Result<String, SyncError> {
        if digest.len() != DIGEST_HEX_LEN || hex::decode(digest).is_err() {
            return Err(SyncError::ObjectStoreFailure(format!(
                "invalid sha256 digest {digest:?}"
            )));
        }

        Ok(join_key(&[
            &self.lfs_root,
            &digest[0..2],
            &digest[2..4],
            &digest[4..],
        ]))
    }

    /// Object holding the last commit mirrored into storage.
    pub fn commit_marker_key(
        &self,
        owner: &Account,
        resource_type: ResourceType,
        repo_id: &str,
    ) -> String {
        join_key(&[
            &self.repo_prefix(owner, resource_type, repo_id),
            &self.commit_file,
        ])
    }
}

/// Joins key segments with `/`, dropping empty segments and stray slashes.
fn join_key(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|segment| segment.trim_matches('/'))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Sync-facing storage operations, each retried under the configured policy.
#[derive(Clone)]
pub struct RepoStorage {
    store: Arc<dyn ObjectStore>,
    layout: ObjectLayout,
    retry: RetryPolicy,
}

impl RepoStorage {
    pub fn new(store: Arc<dyn ObjectStore>, layout: ObjectLayout, retry: RetryPolicy) -> Self {
        Self {
            store,
            layout,
            retry,
        }
    }

    pub fn layout(&self) -> &ObjectLayout {
        &self.layout
    }

    pub fn repo_prefix(&self, owner: &Account, resource_type: ResourceType, repo_id: &str) -> String {
        self.layout.repo_prefix(owner, resource_type, repo_id)
    }

    /// Copy a large object from the content-addressed area to its place in the repository.
    pub async fn copy_large_object(
        &self,
        owner: &Account,
        resource_type: ResourceType,
        repo_id: &str,
        path: &str,
        digest: &str,
    ) -> Result<(), SyncError> {
        let src = self.layout.large_object_key(digest)?;
        let dst = self
            .layout
            .destination_key(owner, resource_type, repo_id, path);

        debug!(src = %src, dst = %dst, "Copying large object");

        self.retry
            .run("copy_large_object", || self.store.copy_object(&dst, &src))
            .await
    }

    /// The commit recorded in the repository's commit marker, if any.
    pub async fn current_commit(
        &self,
        owner: &Account,
        resource_type: ResourceType,
        repo_id: &str,
    ) -> Result<Option<String>, SyncError> {
        let key = self.layout.commit_marker_key(owner, resource_type, repo_id);

        let body = self
            .retry
            .run("get_commit_marker", || self.store.get_object(&key))
            .await?;

        Ok(body
            .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
            .filter(|commit| !commit.is_empty()))
    }

    pub async fn update_current_commit(
        &self,
        owner: &Account,
        resource_type: ResourceType,
        repo_id: &str,
        commit: &str,
    ) -> Result<(), SyncError> {
        let key = self.layout.commit_marker_key(owner, resource_type, repo_id);

        self.retry
            .run("put_commit_marker", || {
                self.store.put_object(&key, commit.as_bytes().to_vec())
            })
            .await
    }
}
