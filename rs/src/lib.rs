//! A git working copy exposed as a serialized, versioned content store.
//!
//! `repo_api` is the core of the repo-api service. Reads go straight to the
//! working copy; every mutation is funnelled through one [`TaskQueue`] so
//! the repository only ever sees one writer.
//!
//! # Key types
//!
//! - [`TaskQueue`]: single-concurrency FIFO job runner.
//! - [`GitRepo`]: typed `git` commands over a working copy.
//! - [`RepoSync`]: clone-if-absent / fast-forward pull.
//! - [`WritePipeline`]: sync → write → stage → commit → push, with
//!   rollback on failure.
//! - [`QueryAggregator`]: single-file and glob reads with optional parsing.
//!
//! # Quick example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use repo_api::{QueryAggregator, QueryOptions, RepoSync, SyncOptions, TaskQueue};
//! use repo_api::write::{WriteOptions, WritePipeline, WriteRequest};
//!
//! # async fn demo() -> repo_api::Result<()> {
//! let queue = TaskQueue::new();
//! let sync = Arc::new(RepoSync::new("/srv/repo", SyncOptions::default()));
//! let writer = WritePipeline::new("/srv/repo", queue, sync, WriteOptions::default());
//!
//! // Write (queued, committed)
//! let body: &'static [u8] = b"hello";
//! let outcome = writer.write(WriteRequest::new("hello.txt"), body).await?;
//! println!("{}", outcome.label());
//!
//! // Read
//! let reader = QueryAggregator::new("/srv/repo");
//! let data = reader.query_file("hello.txt", &QueryOptions::default()).await?;
//! # let _ = data;
//! # Ok(())
//! # }
//! ```

pub mod bundle;
pub mod config;
pub mod error;
pub mod git;
pub mod glob;
pub mod paths;
pub mod process;
pub mod query;
pub mod queue;
pub mod sync;
pub mod types;
pub mod write;

// Re-export primary public types at crate root.
pub use bundle::{Bundle, Part, PartBody};
pub use config::Config;
pub use error::{Error, Result};
pub use git::GitRepo;
pub use process::{Cancellation, ProcessRunner};
pub use query::{Filter, Format, QueryAggregator, QueryOptions, QueryOutput};
pub use queue::{TaskHandle, TaskQueue};
pub use sync::{RepoSync, SyncOptions};
pub use types::*;
pub use write::{WritePipeline, WriteRequest};
