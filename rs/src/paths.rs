use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// A user-supplied path resolved against the repository root.
///
/// The absolute form is always the root itself or one of its descendants;
/// construction fails otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoPath {
    relative: String,
    absolute: PathBuf,
}

impl RepoPath {
    /// Slash-separated path relative to the root (`""` for the root).
    pub fn relative(&self) -> &str {
        &self.relative
    }

    pub fn absolute(&self) -> &Path {
        &self.absolute
    }

    pub fn is_root(&self) -> bool {
        self.relative.is_empty()
    }
}

/// Resolve `input` against `root`, rejecting anything that would leave it.
///
/// # Errors
/// Returns [`Error::PathEscape`] for absolute inputs or `..` segments that
/// climb above the root, and [`Error::InvalidPath`] for paths touching the
/// `.git` directory or containing NUL bytes.
pub fn resolve(root: &Path, input: &str) -> Result<RepoPath> {
    let relative = normalize_path(input)?;
    let mut absolute = root.to_path_buf();
    for seg in relative.split('/').filter(|s| !s.is_empty()) {
        absolute.push(seg);
    }
    Ok(RepoPath { relative, absolute })
}

/// Lexically normalize a repository path.
///
/// Both `/` and `\` separate segments, empty and `.` segments collapse and
/// `..` removes the previous segment. The result is slash-joined and may be
/// empty (the root).
pub fn normalize_path(path: &str) -> Result<String> {
    if path.contains('\0') {
        return Err(Error::invalid_path("path must not contain NUL bytes"));
    }
    if path.starts_with('/') || path.starts_with('\\') {
        return Err(Error::path_escape(path));
    }

    let mut segments: Vec<&str> = Vec::new();
    for seg in path.split(['/', '\\']) {
        match seg {
            "" | "." => continue,
            ".." => {
                if segments.pop().is_none() {
                    return Err(Error::path_escape(path));
                }
            }
            ".git" => {
                return Err(Error::invalid_path(format!(
                    "'{}' addresses the repository internals",
                    path
                )));
            }
            _ => segments.push(seg),
        }
    }

    Ok(segments.join("/"))
}

/// Parent of a normalized relative path (`""` for top-level entries).
pub fn parent_of(relative: &str) -> &str {
    relative.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_empty_is_root() {
        assert_eq!(normalize_path("").unwrap(), "");
        assert_eq!(normalize_path(".").unwrap(), "");
    }

    #[test]
    fn normalize_collapses_slashes_and_dots() {
        assert_eq!(normalize_path("a//b/./c/").unwrap(), "a/b/c");
        assert_eq!(normalize_path("./a/b").unwrap(), "a/b");
    }

    #[test]
    fn normalize_resolves_dotdot_inside_root() {
        assert_eq!(normalize_path("a/../b").unwrap(), "b");
        assert_eq!(normalize_path("a/b/../../c").unwrap(), "c");
    }

    #[test]
    fn normalize_treats_backslash_as_separator() {
        assert_eq!(normalize_path("a\\b").unwrap(), "a/b");
        assert!(matches!(
            normalize_path("a\\..\\..\\x"),
            Err(Error::PathEscape(_))
        ));
    }

    #[test]
    fn rejects_traversal() {
        assert!(matches!(
            normalize_path("../../etc/passwd"),
            Err(Error::PathEscape(_))
        ));
        assert!(matches!(normalize_path("a/../../b"), Err(Error::PathEscape(_))));
    }

    #[test]
    fn rejects_absolute() {
        assert!(matches!(normalize_path("/etc/passwd"), Err(Error::PathEscape(_))));
    }

    #[test]
    fn rejects_git_internals() {
        assert!(matches!(
            normalize_path(".git/hooks/pre-commit"),
            Err(Error::InvalidPath(_))
        ));
        assert!(matches!(normalize_path("sub/.git"), Err(Error::InvalidPath(_))));
        assert_eq!(normalize_path(".gitignore").unwrap(), ".gitignore");
    }

    #[test]
    fn rejects_nul() {
        assert!(matches!(normalize_path("a\0b"), Err(Error::InvalidPath(_))));
    }

    #[test]
    fn resolve_joins_under_root() {
        let root = Path::new("/srv/repo");
        let p = resolve(root, "posts/./2024/entry.md").unwrap();
        assert_eq!(p.relative(), "posts/2024/entry.md");
        assert_eq!(p.absolute(), Path::new("/srv/repo/posts/2024/entry.md"));
        assert!(p.absolute().starts_with(root));
        assert!(resolve(root, "").unwrap().is_root());
    }

    #[test]
    fn parent_of_paths() {
        assert_eq!(parent_of("a/b/c.txt"), "a/b");
        assert_eq!(parent_of("c.txt"), "");
    }
}
