mod common;

use repo_api::{Error, GitRepo, LogFilesOptions};

fn repo(dir: &std::path::Path) -> GitRepo {
    GitRepo::new(dir).with_signature(common::test_signature())
}

#[tokio::test]
async fn head_matches_libgit2() {
    let dir = tempfile::tempdir().unwrap();
    common::init_repo(dir.path(), &[("a.txt", "a")]);

    let head = repo(dir.path()).head().await.unwrap();
    assert_eq!(head, common::head_sha(dir.path()));
    assert_eq!(head.len(), 40);
}

#[tokio::test]
async fn head_outside_a_repository_fails() {
    let dir = tempfile::tempdir().unwrap();
    let err = repo(dir.path()).head().await.unwrap_err();
    match err {
        Error::Command { namespace, stderr, .. } => {
            assert_eq!(namespace, "head");
            assert!(!stderr.is_empty());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn stage_and_commit_advance_head() {
    let dir = tempfile::tempdir().unwrap();
    common::init_repo(dir.path(), &[("a.txt", "a")]);
    let git = repo(dir.path());
    let before = git.head().await.unwrap();

    std::fs::write(dir.path().join("b.txt"), "b").unwrap();
    assert!(!git.status().await.unwrap().trim().is_empty());
    assert!(git.status_of("a.txt").await.unwrap().trim().is_empty());
    assert!(git.status_of("b.txt").await.unwrap().contains("b.txt"));

    git.stage("b.txt").await.unwrap();
    git.commit("add b").await.unwrap();

    let after = git.head().await.unwrap();
    assert_ne!(before, after);
    assert_eq!(after, common::head_sha(dir.path()));
    assert_eq!(common::log_messages(dir.path())[0], "add b");
    assert!(git.status().await.unwrap().trim().is_empty());

    let author = git2::Repository::open(dir.path())
        .unwrap()
        .head()
        .unwrap()
        .peel_to_commit()
        .unwrap()
        .author()
        .email()
        .map(str::to_string);
    assert_eq!(author.as_deref(), Some("writer@example.com"));
}

#[tokio::test]
async fn commit_with_nothing_staged_fails() {
    let dir = tempfile::tempdir().unwrap();
    common::init_repo(dir.path(), &[("a.txt", "a")]);

    let err = repo(dir.path()).commit("empty").await.unwrap_err();
    assert!(matches!(err, Error::Command { ref namespace, .. } if namespace == "commit"));
}

#[tokio::test]
async fn rollback_and_clean_restore_the_tree() {
    let dir = tempfile::tempdir().unwrap();
    common::init_repo(dir.path(), &[("a.txt", "original")]);
    let git = repo(dir.path());
    let sha = git.head().await.unwrap();

    std::fs::write(dir.path().join("a.txt"), "changed").unwrap();
    git.stage("a.txt").await.unwrap();
    git.commit("change a").await.unwrap();
    std::fs::create_dir_all(dir.path().join("junk/deep")).unwrap();
    std::fs::write(dir.path().join("junk/deep/file.txt"), "x").unwrap();
    std::fs::write(dir.path().join("stray.txt"), "x").unwrap();

    git.rollback(&sha).await.unwrap();
    git.clean().await.unwrap();

    assert_eq!(git.head().await.unwrap(), sha);
    assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "original");
    assert!(!dir.path().join("junk").exists());
    assert!(!dir.path().join("stray.txt").exists());
    assert!(common::is_clean(dir.path()));
}

#[tokio::test]
async fn rollback_to_unknown_sha_fails() {
    let dir = tempfile::tempdir().unwrap();
    common::init_repo(dir.path(), &[("a.txt", "a")]);

    let err = repo(dir.path())
        .rollback("0123456789012345678901234567890123456789")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Command { ref namespace, .. } if namespace == "rollback"));
}

#[tokio::test]
async fn log_files_are_deduplicated_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let raw = common::init_repo(dir.path(), &[("a.txt", "1"), ("docs/x.md", "1")]);
    common::commit_files(&raw, &[("b.txt", "1")], "b");
    common::commit_files(&raw, &[("a.txt", "2")], "a again");

    let git = repo(dir.path());
    let files = git.log_files(&LogFilesOptions::default()).await.unwrap();
    assert_eq!(files, vec!["a.txt", "b.txt", "docs/x.md"]);

    let docs = git
        .log_files(&LogFilesOptions {
            paths: vec!["docs".into()],
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(docs, vec!["docs/x.md"]);

    let future = git
        .log_files(&LogFilesOptions {
            since: Some("2999-01-01".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(future.is_empty());
}

#[tokio::test]
async fn push_publishes_to_the_remote() {
    let tmp = tempfile::tempdir().unwrap();
    let remote = common::bare_remote(tmp.path(), &[("a.txt", "a")]);
    let work = tmp.path().join("work");
    git2::Repository::clone(remote.to_str().unwrap(), &work).unwrap();

    let git = repo(&work);
    std::fs::write(work.join("new.txt"), "new").unwrap();
    git.stage("new.txt").await.unwrap();
    git.commit("new").await.unwrap();
    git.push().await.unwrap();

    assert_eq!(common::head_sha(&remote), git.head().await.unwrap());
}

#[cfg(unix)]
#[tokio::test]
async fn paths_are_not_pathspec_patterns() {
    let dir = tempfile::tempdir().unwrap();
    common::init_repo(dir.path(), &[("memo.txt", "m"), ("a1.txt", "a")]);
    let git = repo(dir.path());

    std::fs::write(dir.path().join(":memo.txt"), "colon").unwrap();
    std::fs::write(dir.path().join("a?.txt"), "question").unwrap();
    std::fs::write(dir.path().join("a1.txt"), "changed").unwrap();

    assert!(git.status_of(":memo.txt").await.unwrap().contains(":memo.txt"));
    let status = git.status_of("a?.txt").await.unwrap();
    assert!(status.contains("a?.txt"));
    assert!(!status.contains("a1.txt"));

    git.stage("a?.txt").await.unwrap();
    git.commit("add a?").await.unwrap();
    assert!(git.status_of("a?.txt").await.unwrap().trim().is_empty());
    assert!(!git.status_of("a1.txt").await.unwrap().trim().is_empty());
}
