//! Sync Orchestrator
//!
//! Drives one sync attempt for a repository. Concurrent attempts are gated by the
//! version check in the [`RepoSyncStore`]: whoever saves the Running record first owns
//! the repository until it saves the Done record, and everyone else aborts with
//! [`SyncError::AlreadySyncing`]. There are no locks.
//!
//! An attempt runs these steps:
//!
//! 1. load the record, treating a missing row as a fresh Absent record;
//! 2. refuse to start when the record is Running;
//! 3. ask the platform for the head commit;
//! 4. stop if the head is already mirrored;
//! 5. save the record as Running (losing that race aborts);
//! 6. run the transfer tool from the last mirrored commit;
//! 7. copy large objects listed in the manifest and move the commit marker;
//! 8. mark the record Done, advancing `last_commit` only if 6 and 7 succeeded;
//! 9. save the record with retries.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, error, info, instrument, warn};

use crate::domain::{RepoInfo, RepoSyncRecord, RepoSyncStore};
use crate::error::SyncError;
use crate::platform::Platform;
use crate::retry::RetryPolicy;
use crate::storage::RepoStorage;
use crate::transfer::{TransferRequest, TransferTool, read_manifest};

/// Successful result of [`SyncOrchestrator::sync_repo`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The platform head was already mirrored; nothing was touched.
    UpToDate,
    /// The repository was mirrored up to `commit`.
    Synced { commit: String },
}

impl SyncOutcome {
    fn label(&self) -> &'static str {
        match self {
            SyncOutcome::UpToDate => "up_to_date",
            SyncOutcome::Synced { .. } => "synced",
        }
    }
}

pub struct SyncOrchestrator {
    store: Arc<dyn RepoSyncStore>,
    platform: Arc<dyn Platform>,
    storage: RepoStorage,
    tool: Arc<dyn TransferTool>,
    work_dir: PathBuf,
    retry: RetryPolicy,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<dyn RepoSyncStore>,
        platform: Arc<dyn Platform>,
        storage: RepoStorage,
        tool: Arc<dyn TransferTool>,
        work_dir: impl Into<PathBuf>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            platform,
            storage,
            tool,
            work_dir: work_dir.into(),
            retry,
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Mirror the repository described by `info` up to the platform's head commit.
    #[instrument(
        skip_all,
        fields(
            owner = %info.owner,
            resource_type = %info.resource_type,
            repo_id = %info.repo_id
        )
    )]
    pub async fn sync_repo(&self, info: &RepoInfo) -> Result<SyncOutcome, SyncError> {
        let started = Instant::now();
        let result = self.run(info).await;

        let outcome = match &result {
            Ok(outcome) => outcome.label(),
            Err(err) => err.kind(),
        };
        counter!("repo_sync_total", "outcome" => outcome).increment(1);
        histogram!("repo_sync_duration_seconds").record(started.elapsed().as_secs_f64());

        match &result {
            Ok(SyncOutcome::Synced { commit }) => info!(commit = %commit, "Repository synced"),
            Ok(SyncOutcome::UpToDate) => debug!("Repository already up to date"),
            Err(err) => warn!(error = %err, kind = err.kind(), "Repository sync failed"),
        }

        result
    }

    async fn run(&self, info: &RepoInfo) -> Result<SyncOutcome, SyncError> {
        let mut record = match self
            .store
            .find(&info.owner, info.resource_type, &info.repo_id)
            .await
        {
            Ok(record) => record,
            Err(SyncError::NotFound) => RepoSyncRecord::for_repo(info),
            Err(err) => return Err(err),
        };

        if record.is_running() {
            return Err(SyncError::AlreadySyncing { repo: info.key() });
        }

        let head = self.platform.last_commit(&info.repo_id).await?;
        if head == record.last_commit {
            return Ok(SyncOutcome::UpToDate);
        }

        let resume_from = record.last_commit.clone();
        record.begin()?;
        let mut record = match self.store.save(&record).await {
            Ok(saved) => saved,
            Err(err) if err.is_lost_race() => {
                info!(error = %err, "Another attempt claimed the repository");
                return Err(SyncError::AlreadySyncing { repo: info.key() });
            }
            Err(err) => return Err(err),
        };

        debug!(
            version = record.version,
            head = %head,
            resume_from = %resume_from,
            "Claimed repository for sync"
        );

        let body = self.mirror(info, &resume_from).await;
        record.finish(body.as_ref().ok().cloned());

        let saved = self
            .retry
            .run("save_final_sync_state", || self.save_final(&record))
            .await;

        match (body, saved) {
            (Ok(commit), Ok(_)) => Ok(SyncOutcome::Synced { commit }),
            (Ok(_), Err(save_err)) => Err(SyncError::FinalizeFailure(Box::new(save_err))),
            (Err(err), Ok(_)) => Err(err),
            (Err(err), Err(save_err)) => {
                error!(
                    error = %save_err,
                    "Failed to persist final sync state after a failed sync; record stays Running"
                );
                Err(err)
            }
        }
    }

    /// Save the final state. A version conflict on a retry may mean an earlier attempt
    /// committed and only its reply was lost, so the stored row is checked before giving up.
    async fn save_final(&self, record: &RepoSyncRecord) -> Result<RepoSyncRecord, SyncError> {
        let err = match self.store.save(record).await {
            Ok(saved) => return Ok(saved),
            Err(err @ SyncError::ConcurrentUpdateConflict { .. }) => err,
            Err(err) => return Err(err),
        };

        let stored = self
            .store
            .find(&record.owner, record.resource_type, &record.repo_id)
            .await?;
        let committed = stored.status == record.status
            && stored.last_commit == record.last_commit
            && stored.version == record.version.map(|version| version + 1);
        if committed {
            info!(
                version = stored.version,
                "Final sync state was already saved by an earlier attempt"
            );
            Ok(stored)
        } else {
            Err(err)
        }
    }

    /// Steps 6 and 7: run the tool and place large objects. Returns the new commit.
    async fn mirror(&self, info: &RepoInfo, start_commit: &str) -> Result<String, SyncError> {
        tokio::fs::create_dir_all(&self.work_dir).await?;
        let work_dir = tempfile::Builder::new()
            .prefix("sync")
            .tempdir_in(&self.work_dir)?;

        self.check_commit_marker(info, start_commit).await;

        let request = TransferRequest {
            work_dir: work_dir.path().to_path_buf(),
            clone_url: self.platform.clone_url(&info.owner, &info.repo_name),
            repo_name: info.repo_name.clone(),
            start_commit: start_commit.to_string(),
            destination_prefix: self
                .storage
                .repo_prefix(&info.owner, info.resource_type, &info.repo_id),
        };
        let outcome = self.tool.transfer(&request).await?;

        if let Some(manifest) = &outcome.manifest {
            let objects = read_manifest(manifest).await?;
            debug!(count = objects.len(), "Copying large objects");

            for object in &objects {
                self.storage
                    .copy_large_object(
                        &info.owner,
                        info.resource_type,
                        &info.repo_id,
                        &object.path,
                        &object.digest,
                    )
                    .await?;
            }
        }

        self.storage
            .update_current_commit(
                &info.owner,
                info.resource_type,
                &info.repo_id,
                &outcome.new_commit,
            )
            .await?;

        Ok(outcome.new_commit)
    }

    /// Warn when the commit marker in storage disagrees with the sync record.
    ///
    /// The record decides where the transfer resumes; the marker is only compared.
    async fn check_commit_marker(&self, info: &RepoInfo, record_commit: &str) {
        match self
            .storage
            .current_commit(&info.owner, info.resource_type, &info.repo_id)
            .await
        {
            Ok(marker) => {
                let marker = marker.unwrap_or_default();
                if marker != record_commit {
                    warn!(
                        marker_commit = %marker,
                        record_commit = %record_commit,
                        "Commit marker diverges from sync record; resuming from the record"
                    );
                }
            }
            Err(err) => warn!(error = %err, "Failed to read commit marker"),
        }
    }
}
