// ---------------------------------------------------------------------------
// CommandResult
// ---------------------------------------------------------------------------

/// Captured outcome of one external process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// `true` exactly when the process exited with code 0.
    pub ok: bool,
    /// Exit code, `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn new(code: Option<i32>, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            ok: code == Some(0),
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// Author/committer identity used for commits made by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
}

impl Default for Signature {
    fn default() -> Self {
        Self {
            name: "repo-api".into(),
            email: "repo-api@localhost".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Successful result of a write job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The file was committed at `sha`; `pushed` tells whether it was
    /// published to the remote.
    Committed { sha: String, pushed: bool },
    /// Commit-on-write is disabled: the file is on disk only.
    Uncommitted,
    /// The write produced no change in the working tree; nothing was committed.
    NoChange,
}

impl WriteOutcome {
    /// Short label used in HTTP responses and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Committed { .. } | Self::Uncommitted => "ok",
            Self::NoChange => "no-change",
        }
    }
}

/// What a sync pass actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Pulling is disabled by configuration.
    Skipped,
    /// The working copy did not exist and was cloned.
    Cloned,
    /// The working copy was fast-forwarded from the remote.
    Pulled,
    /// A configured sync script was run.
    Scripted,
}

// ---------------------------------------------------------------------------
// LogFilesOptions
// ---------------------------------------------------------------------------

/// Filters for [`GitRepo::log_files`](crate::git::GitRepo::log_files).
#[derive(Debug, Clone, Default)]
pub struct LogFilesOptions {
    /// Restrict to these pathspecs.
    pub paths: Vec<String>,
    /// Passed to `git log --since`.
    pub since: Option<String>,
    /// Passed to `git log --until`.
    pub until: Option<String>,
}
