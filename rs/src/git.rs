//! Typed wrapper around the `git` command line for one working copy.
//!
//! Every operation is exactly one `git` invocation in the working copy and
//! performs no retries. A non-zero exit is surfaced as [`Error::Command`]
//! carrying git's stderr.

use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::process::{Cancellation, ProcessRunner};
use crate::types::{CommandResult, LogFilesOptions, Signature};

/// A git working copy.
///
/// Cheap to clone. A `GitRepo` may carry a [`Cancellation`]; every command it
/// runs is then killed when the signal fires.
#[derive(Debug, Clone)]
pub struct GitRepo {
    dir: PathBuf,
    signature: Option<Signature>,
    cancel: Option<Cancellation>,
}

impl GitRepo {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            signature: None,
            cancel: None,
        }
    }

    /// Commit as `signature` instead of git's configured identity.
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = Some(signature);
        self
    }

    pub fn with_cancel(mut self, cancel: Option<Cancellation>) -> Self {
        self.cancel = cancel;
        self
    }

    /// A copy of this repository handle that ignores cancellation.
    pub fn without_cancel(&self) -> Self {
        Self {
            cancel: None,
            ..self.clone()
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether the directory holds a working copy.
    pub fn exists(&self) -> bool {
        self.dir.join(".git").exists()
    }

    fn command(&self, args: &[&str]) -> ProcessRunner {
        let mut runner = ProcessRunner::new("git")
            .args(args)
            .current_dir(&self.dir)
            .env("GIT_LITERAL_PATHSPECS", "1")
            .cancel_on(self.cancel.as_ref());
        if let Some(ref sig) = self.signature {
            runner = runner
                .env("GIT_AUTHOR_NAME", &sig.name)
                .env("GIT_AUTHOR_EMAIL", &sig.email)
                .env("GIT_COMMITTER_NAME", &sig.name)
                .env("GIT_COMMITTER_EMAIL", &sig.email);
        }
        runner
    }

    async fn run(&self, namespace: &str, args: &[&str]) -> Result<CommandResult> {
        debug!(namespace, ?args, "git");
        let result = self.command(args).run().await?;

        if !result.ok {
            error!(namespace, code = ?result.code, stderr = %result.stderr.trim(), "git failed");
            return Err(Error::command(namespace, &result));
        }

        Ok(result)
    }

    /// Current commit sha (`git rev-parse HEAD`).
    pub async fn head(&self) -> Result<String> {
        let result = self.run("head", &["rev-parse", "HEAD"]).await?;
        Ok(result.stdout.trim().to_string())
    }

    /// Add one path to the index (`git add`).
    pub async fn stage(&self, path: &str) -> Result<()> {
        self.run("stage", &["add", "--", path]).await?;
        Ok(())
    }

    /// Create a commit (`git commit -m`). Fails when nothing is staged, so
    /// callers check [`status`](Self::status) first.
    pub async fn commit(&self, message: &str) -> Result<CommandResult> {
        self.run("commit", &["commit", "-m", message]).await
    }

    /// Porcelain status; empty after trimming means a clean tree.
    pub async fn status(&self) -> Result<String> {
        let result = self.run("status", &["status", "--porcelain"]).await?;
        Ok(result.stdout)
    }

    /// Porcelain status restricted to one path.
    pub async fn status_of(&self, path: &str) -> Result<String> {
        let result = self
            .run("status", &["status", "--porcelain", "--", path])
            .await?;
        Ok(result.stdout)
    }

    /// Publish HEAD to the configured remote (`git push`).
    pub async fn push(&self) -> Result<()> {
        self.run("push", &["push"]).await?;
        Ok(())
    }

    /// Hard-reset the working tree and index to `sha`.
    pub async fn rollback(&self, sha: &str) -> Result<()> {
        self.run("rollback", &["reset", "--hard", sha]).await?;
        Ok(())
    }

    /// Remove untracked files and directories.
    pub async fn clean(&self) -> Result<()> {
        self.run("clean", &["clean", "--force", "-d"]).await?;
        Ok(())
    }

    /// Fast-forward from the upstream branch.
    pub async fn pull(&self) -> Result<()> {
        self.run("pull", &["pull", "--ff-only"]).await?;
        Ok(())
    }

    /// Files touched by commits in the given window, deduplicated in the
    /// order `git log` reports them (newest first).
    pub async fn log_files(&self, opts: &LogFilesOptions) -> Result<Vec<String>> {
        let mut args: Vec<String> = vec![
            "log".into(),
            "--name-only".into(),
            "--pretty=format:".into(),
        ];
        if let Some(ref since) = opts.since {
            args.push(format!("--since={}", since));
        }
        if let Some(ref until) = opts.until {
            args.push(format!("--until={}", until));
        }
        if !opts.paths.is_empty() {
            args.push("--".into());
            args.extend(opts.paths.iter().cloned());
        }

        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let result = self.run("log", &args).await?;

        let mut seen = std::collections::HashSet::new();
        Ok(result
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter(|line| seen.insert(line.to_string()))
            .map(str::to_string)
            .collect())
    }
}

/// Clone `remote` into `dir` (`git clone <remote> .`).
pub(crate) async fn clone_into(
    dir: &Path,
    remote: &str,
    cancel: Option<&Cancellation>,
) -> Result<()> {
    debug!(remote, dir = %dir.display(), "git clone");
    let result = ProcessRunner::new("git")
        .args(["clone", "--", remote, "."])
        .current_dir(dir)
        .cancel_on(cancel)
        .run()
        .await?;
    if !result.ok {
        error!(remote, stderr = %result.stderr.trim(), "git clone failed");
        return Err(Error::command("clone", &result));
    }
    Ok(())
}
