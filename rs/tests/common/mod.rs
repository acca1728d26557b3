use std::path::{Path, PathBuf};
use std::sync::Arc;

use repo_api::write::{WriteOptions, WritePipeline};
use repo_api::{RepoSync, Signature, SyncOptions, TaskQueue};

pub fn signature() -> git2::Signature<'static> {
    git2::Signature::now("Test", "test@example.com").unwrap()
}

/// Initialise a working copy at `dir` with `files` in its first commit.
pub fn init_repo(dir: &Path, files: &[(&str, &str)]) -> git2::Repository {
    let repo = git2::Repository::init(dir).unwrap();
    commit_files(&repo, files, "initial");
    repo
}

/// Write `files` into the working tree and commit them on HEAD.
pub fn commit_files(repo: &git2::Repository, files: &[(&str, &str)], message: &str) -> git2::Oid {
    let workdir = repo.workdir().unwrap().to_path_buf();
    let mut index = repo.index().unwrap();
    for (path, content) in files {
        let full = workdir.join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(&full, content).unwrap();
        index.add_path(Path::new(path)).unwrap();
    }
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let sig = signature();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap()
}

/// A bare remote seeded with `files`, plus the seed's path.
#[allow(dead_code)]
pub fn bare_remote(dir: &Path, files: &[(&str, &str)]) -> PathBuf {
    let seed = dir.join("seed");
    init_repo(&seed, files);
    let remote = dir.join("remote.git");
    git2::build::RepoBuilder::new()
        .bare(true)
        .clone(seed.to_str().unwrap(), &remote)
        .unwrap();
    remote
}

pub fn head_sha(dir: &Path) -> String {
    let repo = git2::Repository::open(dir).unwrap();
    let head = repo.head().unwrap().peel_to_commit().unwrap().id();
    head.to_string()
}

/// Commit summaries, newest first.
#[allow(dead_code)]
pub fn log_messages(dir: &Path) -> Vec<String> {
    let repo = git2::Repository::open(dir).unwrap();
    let mut walk = repo.revwalk().unwrap();
    walk.set_sorting(git2::Sort::TOPOLOGICAL).unwrap();
    walk.push_head().unwrap();
    walk.map(|id| {
        let commit = repo.find_commit(id.unwrap()).unwrap();
        commit.summary().unwrap_or_default().to_string()
    })
    .collect()
}

/// `true` when the working tree has no modified or untracked files.
#[allow(dead_code)]
pub fn is_clean(dir: &Path) -> bool {
    let repo = git2::Repository::open(dir).unwrap();
    let mut opts = git2::StatusOptions::new();
    opts.include_untracked(true).recurse_untracked_dirs(true);
    let statuses = repo.statuses(Some(&mut opts)).unwrap();
    statuses.is_empty()
}

#[allow(dead_code)]
pub fn test_signature() -> Signature {
    Signature {
        name: "Writer".into(),
        email: "writer@example.com".into(),
    }
}

#[allow(dead_code)]
pub fn committing() -> WriteOptions {
    WriteOptions {
        commit: true,
        signature: test_signature(),
        ..Default::default()
    }
}

/// A pipeline over `dir` with pulling disabled.
#[allow(dead_code)]
pub fn pipeline(dir: &Path, options: WriteOptions) -> WritePipeline {
    pipeline_with_sync(dir, options, SyncOptions::default())
}

#[allow(dead_code)]
pub fn pipeline_with_sync(dir: &Path, options: WriteOptions, sync: SyncOptions) -> WritePipeline {
    WritePipeline::new(
        dir,
        TaskQueue::new(),
        Arc::new(RepoSync::new(dir, sync)),
        options,
    )
}

#[allow(dead_code)]
pub fn body(data: impl Into<Vec<u8>>) -> std::io::Cursor<Vec<u8>> {
    std::io::Cursor::new(data.into())
}
