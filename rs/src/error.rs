use std::path::PathBuf;

use crate::types::CommandResult;

/// All errors produced by repo-api.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("path escapes the repository: {0}")]
    PathEscape(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("failed to {namespace} (code={}): {stderr}", code.map(|c| c.to_string()).unwrap_or_else(|| "signal".into()))]
    Command {
        namespace: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("unsupported format '{0}'")]
    UnsupportedFormat(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("task queue is full ({0} pending)")]
    QueueFull(usize),

    #[error("task queue is closed")]
    QueueClosed,

    #[error("task aborted before completion")]
    TaskAborted,

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

// ---------------------------------------------------------------------------
// Convenience constructors
// ---------------------------------------------------------------------------

impl Error {
    pub fn path_escape(path: impl Into<String>) -> Self {
        Self::PathEscape(path.into())
    }

    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Build a [`Error::Command`] from a failed invocation.
    pub fn command(namespace: impl Into<String>, result: &CommandResult) -> Self {
        Self::Command {
            namespace: namespace.into(),
            code: result.code,
            stderr: result.stderr.trim().to_string(),
        }
    }

    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat(format.into())
    }

    pub fn invalid_query(msg: impl Into<String>) -> Self {
        Self::InvalidQuery(msg.into())
    }

    pub fn parse(path: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Parse {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Attach the offending path to an io error, mapping `NotFound` to
    /// [`Error::NotFound`].
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        if err.kind() == std::io::ErrorKind::NotFound {
            return Self::NotFound(path.display().to_string());
        }
        Self::Io(std::io::Error::new(
            err.kind(),
            format!("{}: {}", path.display(), err),
        ))
    }

    /// Whether the error was caused by the caller's input rather than the
    /// store itself.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::PathEscape(_)
                | Self::InvalidPath(_)
                | Self::Command { .. }
                | Self::UnsupportedFormat(_)
                | Self::InvalidQuery(_)
                | Self::Parse { .. }
                | Self::Cancelled(_)
        )
    }
}
