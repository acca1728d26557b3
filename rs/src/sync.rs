//! Keeping the working copy in step with its upstream remote.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::git::{self, GitRepo};
use crate::process::{Cancellation, ProcessRunner};
use crate::queue::TaskQueue;
use crate::types::SyncOutcome;

/// How the working copy is synchronised.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Pull before writes and on the periodic timer. `false` makes every sync
    /// a logged no-op.
    pub enabled: bool,
    /// Upstream remote URL.
    pub remote: Option<String>,
    /// Script run as `<script> <remote>` in the working copy instead of the
    /// built-in clone/pull.
    pub script: Option<PathBuf>,
}

/// Clone-if-absent, else fast-forward pull. Idempotent, so it is safe to run
/// before every write.
#[derive(Debug, Clone)]
pub struct RepoSync {
    dir: PathBuf,
    options: SyncOptions,
}

impl RepoSync {
    pub fn new(dir: impl AsRef<Path>, options: SyncOptions) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            options,
        }
    }

    pub fn enabled(&self) -> bool {
        self.options.enabled
    }

    /// Bring the working copy up to date with the remote.
    ///
    /// # Errors
    /// [`Error::Config`] when enabled without a remote, or the failing git
    /// command / script as [`Error::Command`].
    pub async fn sync(&self, cancel: Option<&Cancellation>) -> Result<SyncOutcome> {
        if !self.options.enabled {
            debug!("skip pull (pull disabled)");
            return Ok(SyncOutcome::Skipped);
        }

        let remote = self
            .options
            .remote
            .as_deref()
            .ok_or_else(|| Error::config("sync is enabled but no remote is configured"))?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::io(&self.dir, e))?;

        if let Some(ref script) = self.options.script {
            debug!(script = %script.display(), "syncing via script");
            let result = ProcessRunner::new(script)
                .arg(remote)
                .current_dir(&self.dir)
                .cancel_on(cancel)
                .run()
                .await?;
            if !result.ok {
                error!(stderr = %result.stderr.trim(), "sync script failed");
                return Err(Error::command("sync", &result));
            }
            return Ok(SyncOutcome::Scripted);
        }

        let repo = GitRepo::new(&self.dir).with_cancel(cancel.cloned());
        if repo.exists() {
            repo.pull().await?;
            debug!("pulled");
            Ok(SyncOutcome::Pulled)
        } else {
            git::clone_into(&self.dir, remote, cancel).await?;
            info!(remote, dir = %self.dir.display(), "cloned working copy");
            Ok(SyncOutcome::Cloned)
        }
    }
}

/// Submit a sync to `queue` every `interval`, the first one `interval` from
/// now.
///
/// Syncs go through the queue so they never interleave with a write.
/// Failures are logged and the timer keeps running.
pub fn spawn_periodic(
    queue: TaskQueue,
    sync: Arc<RepoSync>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + interval;
        let mut ticker = tokio::time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let sync = Arc::clone(&sync);
            match queue.add(move || async move { sync.sync(None).await }).await {
                Ok(outcome) => debug!(?outcome, "periodic sync"),
                Err(Error::QueueClosed) => break,
                Err(e) => error!(error = %e, "periodic sync failed"),
            }
        }
    })
}
