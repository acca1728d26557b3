//! External process invocation with cooperative cancellation.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::CommandResult;

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// A cloneable, one-shot cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    state: Arc<CancelState>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation to every clone. Idempotent.
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
        self.state.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.state.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Cancel when the returned guard is dropped, unless it is disarmed first.
    pub fn drop_guard(&self) -> CancelOnDrop {
        CancelOnDrop {
            cancel: Some(self.clone()),
        }
    }
}

/// Cancels its [`Cancellation`] on drop.
#[derive(Debug)]
pub struct CancelOnDrop {
    cancel: Option<Cancellation>,
}

impl CancelOnDrop {
    pub fn disarm(mut self) {
        self.cancel = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }
}

// ---------------------------------------------------------------------------
// ProcessRunner
// ---------------------------------------------------------------------------

/// Builder for a single external command invocation.
///
/// [`run`](Self::run) never fails on a non-zero exit; callers inspect
/// [`CommandResult::ok`]. The child is killed if the cancellation signal
/// fires or the returned future is dropped.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    envs: Vec<(OsString, OsString)>,
    cancel: Option<Cancellation>,
}

impl ProcessRunner {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            cwd: None,
            envs: Vec::new(),
            cancel: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    pub fn cancel_on(mut self, cancel: Option<&Cancellation>) -> Self {
        self.cancel = cancel.cloned();
        self
    }

    /// Human readable `program arg1 arg2` form for logs and errors.
    pub fn describe(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|s| s.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Spawn the process and wait for it to exit.
    ///
    /// # Errors
    /// [`Error::Cancelled`] if the signal fired before or during the run,
    /// or an io error if the program could not be spawned.
    pub async fn run(&self) -> Result<CommandResult> {
        let described = self.describe();
        if self.cancel.as_ref().is_some_and(Cancellation::is_cancelled) {
            return Err(Error::Cancelled(described));
        }

        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = self.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }

        debug!(command = %described, "exec");
        let child = cmd
            .spawn()
            .map_err(|e| Error::io(PathBuf::from(&self.program), e))?;

        let output = match self.cancel {
            Some(ref cancel) => tokio::select! {
                output = child.wait_with_output() => output?,
                _ = cancel.cancelled() => {
                    // Dropping the wait future drops the child, which kills it.
                    return Err(Error::Cancelled(described));
                }
            },
            None => child.wait_with_output().await?,
        };

        Ok(CommandResult::new(
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        ))
    }
}
