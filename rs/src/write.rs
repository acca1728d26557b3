//! The write pipeline: sync → write → stage → commit → push, as one queue job.
//!
//! Every write runs as a single [`TaskQueue`] job, so two writes (or a write
//! and a sync) never interleave. Any failure after the rollback point resets
//! the working copy to the commit captured when the job started and removes
//! untracked leftovers before the original error is returned.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::git::GitRepo;
use crate::paths::{self, RepoPath};
use crate::process::Cancellation;
use crate::queue::{TaskHandle, TaskQueue};
use crate::sync::RepoSync;
use crate::types::{Signature, WriteOutcome};

pub const DEFAULT_MESSAGE: &str = "automated commit";
pub const DEFAULT_MESSAGE_PREFIX: &str = "repo-api-service: ";

/// Version-control behaviour of the pipeline.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Stage and commit after writing. When `false` files are only written
    /// to disk.
    pub commit: bool,
    /// Push after committing.
    pub push: bool,
    /// Prepended to every commit message.
    pub message_prefix: String,
    pub signature: Signature,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            commit: true,
            push: false,
            message_prefix: DEFAULT_MESSAGE_PREFIX.into(),
            signature: Signature::default(),
        }
    }
}

/// A request to replace one file.
#[derive(Debug, Clone, Default)]
pub struct WriteRequest {
    /// Path relative to the repository root.
    pub path: String,
    /// Commit message; [`DEFAULT_MESSAGE`] when absent.
    pub message: Option<String>,
    /// Kills in-flight git commands of this job when fired.
    pub cancel: Option<Cancellation>,
}

impl WriteRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn cancel_on(mut self, cancel: Cancellation) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Steps of a write job, used to label logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
    Queued,
    Syncing,
    Writing,
    Staging,
    Committing,
    Pushing,
    RollingBack,
    Cleaning,
}

/// Ephemeral record of one job, driving recovery on failure.
#[derive(Debug)]
struct WriteTransaction {
    rollback_sha: String,
    target: RepoPath,
    message: String,
}

struct PipelineInner {
    dir: PathBuf,
    sync: Arc<RepoSync>,
    options: WriteOptions,
}

/// Serialized writer for one working copy.
#[derive(Clone)]
pub struct WritePipeline {
    queue: TaskQueue,
    inner: Arc<PipelineInner>,
}

impl WritePipeline {
    pub fn new(
        dir: impl AsRef<Path>,
        queue: TaskQueue,
        sync: Arc<RepoSync>,
        options: WriteOptions,
    ) -> Self {
        Self {
            queue,
            inner: Arc::new(PipelineInner {
                dir: dir.as_ref().to_path_buf(),
                sync,
                options,
            }),
        }
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    /// Enqueue a write of `body` to `request.path` and return immediately.
    ///
    /// The returned handle resolves once the job has committed (or failed
    /// and rolled back).
    pub fn write<R>(&self, request: WriteRequest, body: R) -> TaskHandle<WriteOutcome>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        debug!(file = %request.path, stage = ?WriteStage::Queued, "write");
        self.queue.add(move || async move { inner.run(request, body).await })
    }
}

impl PipelineInner {
    fn repo(&self, cancel: Option<Cancellation>) -> GitRepo {
        GitRepo::new(&self.dir)
            .with_signature(self.options.signature.clone())
            .with_cancel(cancel)
    }

    async fn run<R>(&self, request: WriteRequest, body: R) -> Result<WriteOutcome>
    where
        R: AsyncRead + Unpin + Send,
    {
        let repo = self.repo(request.cancel.clone());

        let rollback_sha = repo.head().await?;
        debug!(sha = %rollback_sha, "current sha");

        let target = paths::resolve(&self.dir, &request.path)?;
        if target.is_root() {
            return Err(Error::invalid_path("a file path is required"));
        }

        let tx = WriteTransaction {
            rollback_sha,
            target,
            message: format!(
                "{}{}",
                self.options.message_prefix,
                request.message.as_deref().unwrap_or(DEFAULT_MESSAGE)
            ),
        };

        match self.apply(&repo, &tx, request.cancel.as_ref(), body).await {
            Ok(outcome) => {
                info!(file = tx.target.relative(), outcome = outcome.label(), "write finished");
                Ok(outcome)
            }
            Err((stage, err)) => {
                error!(file = tx.target.relative(), ?stage, error = %err, "write failed");
                self.recover(&repo, &tx).await;
                Err(err)
            }
        }
    }

    async fn apply<R>(
        &self,
        repo: &GitRepo,
        tx: &WriteTransaction,
        cancel: Option<&Cancellation>,
        mut body: R,
    ) -> std::result::Result<WriteOutcome, (WriteStage, Error)>
    where
        R: AsyncRead + Unpin + Send,
    {
        use WriteStage::*;

        self.sync.sync(cancel).await.map_err(|e| (Syncing, e))?;

        let path = tx.target.absolute();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| (Writing, Error::io(paths::parent_of(tx.target.relative()), e)))?;
        }
        let io_err = |e| (Writing, Error::io(tx.target.relative(), e));
        let mut file = tokio::fs::File::create(path).await.map_err(io_err)?;
        tokio::io::copy(&mut body, &mut file).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)?;
        drop(file);

        if !self.options.commit {
            debug!(file = tx.target.relative(), "skip commit (commit disabled)");
            return Ok(WriteOutcome::Uncommitted);
        }

        let status = repo
            .status_of(tx.target.relative())
            .await
            .map_err(|e| (Staging, e))?;
        if status.trim().is_empty() {
            debug!(file = tx.target.relative(), "no changes to commit");
            return Ok(WriteOutcome::NoChange);
        }

        repo.stage(tx.target.relative())
            .await
            .map_err(|e| (Staging, e))?;
        repo.commit(&tx.message)
            .await
            .map_err(|e| (Committing, e))?;
        let sha = repo.head().await.map_err(|e| (Committing, e))?;

        if self.options.push {
            repo.push().await.map_err(|e| (Pushing, e))?;
        }

        Ok(WriteOutcome::Committed {
            sha,
            pushed: self.options.push,
        })
    }

    /// Best-effort reset to the job's starting commit. Failures are logged
    /// and never replace the original error.
    async fn recover(&self, repo: &GitRepo, tx: &WriteTransaction) {
        let repo = repo.without_cancel();

        debug!(stage = ?WriteStage::RollingBack, sha = %tx.rollback_sha, "rollback");
        if let Err(e) = repo.rollback(&tx.rollback_sha).await {
            error!(error = %e, "reset failed");
        }

        debug!(stage = ?WriteStage::Cleaning, "clean");
        if let Err(e) = repo.clean().await {
            error!(error = %e, "clean failed");
        }
    }
}
