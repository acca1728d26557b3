use std::path::Path;

use crate::error::{Error, Result};

/// Match one path segment against one pattern segment.
///
/// Hidden entries (`.env`, `.github`) only match a pattern that itself
/// begins with a literal `.`, so `*` never picks them up.
pub fn glob_match(pattern: &str, name: &str) -> bool {
    let (pattern, name) = match name.strip_prefix('.') {
        Some(rest) => match pattern.strip_prefix('.') {
            Some(pat_rest) => (pat_rest, rest),
            None => return false,
        },
        None => (pattern, name),
    };

    let pat: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();
    fnmatch(&pat, &name)
}

/// `true` when the segment contains glob metacharacters.
pub fn has_magic(segment: &str) -> bool {
    segment.contains(['*', '?', '['])
}

/// fnmatch: `*` matches any chars, `?` a single char, `[...]` a class.
pub(crate) fn fnmatch(pat: &[char], name: &[char]) -> bool {
    let mut pi = 0;
    let mut ni = 0;
    let mut star: Option<(usize, usize)> = None;

    while ni < name.len() {
        if pi < pat.len() {
            let step = match pat[pi] {
                '*' => {
                    star = Some((pi, ni));
                    pi += 1;
                    continue;
                }
                '?' => Some(pi + 1),
                '[' => match match_class(pat, pi, name[ni]) {
                    Some((true, next)) => Some(next),
                    Some((false, _)) => None,
                    // Unterminated class: treat `[` literally.
                    None => (name[ni] == '[').then_some(pi + 1),
                },
                c => (c == name[ni]).then_some(pi + 1),
            };
            if let Some(next) = step {
                pi = next;
                ni += 1;
                continue;
            }
        }

        match star {
            Some((star_pi, star_ni)) => {
                pi = star_pi + 1;
                ni = star_ni + 1;
                star = Some((star_pi, star_ni + 1));
            }
            None => return false,
        }
    }

    while pi < pat.len() && pat[pi] == '*' {
        pi += 1;
    }

    pi == pat.len()
}

/// Match `c` against the class starting at `pat[start] == '['`.
///
/// Returns `(matched, index after the closing ']')`, or `None` when the
/// class is not terminated.
fn match_class(pat: &[char], start: usize, c: char) -> Option<(bool, usize)> {
    let mut i = start + 1;
    let negated = matches!(pat.get(i), Some('!') | Some('^'));
    if negated {
        i += 1;
    }

    let mut matched = false;
    let mut first = true;
    loop {
        let ch = *pat.get(i)?;
        if ch == ']' && !first {
            return Some((matched != negated, i + 1));
        }
        first = false;

        if pat.get(i + 1) == Some(&'-') && pat.get(i + 2).is_some_and(|&end| end != ']') {
            if ch <= c && c <= pat[i + 2] {
                matched = true;
            }
            i += 3;
        } else {
            if ch == c {
                matched = true;
            }
            i += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Disk expansion
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Dir,
    Other,
}

/// Expand `pattern` against the directory tree at `root`.
///
/// Returns sorted, slash-separated paths relative to `root` for every
/// matching regular file. Directories and symlinks never match, and the
/// `.git` directory is never entered. `**` matches zero or more directory
/// levels; as the last segment it matches every file below.
///
/// # Errors
/// Fails when the pattern escapes the root (see
/// [`normalize_path`](crate::paths::normalize_path)) or a directory cannot
/// be read.
pub fn expand(root: &Path, pattern: &str) -> Result<Vec<String>> {
    let pattern = crate::paths::normalize_path(pattern)?;
    if pattern.is_empty() {
        return Ok(Vec::new());
    }

    let segments: Vec<&str> = pattern.split('/').collect();
    let mut results = Vec::new();
    expand_recursive(root, &segments, "", &mut results)?;

    results.sort();
    results.dedup();
    Ok(results)
}

fn expand_recursive(
    dir: &Path,
    segments: &[&str],
    prefix: &str,
    results: &mut Vec<String>,
) -> Result<()> {
    let Some((seg, rest)) = segments.split_first() else {
        return Ok(());
    };

    if *seg != "**" && !has_magic(seg) {
        // Literal segment: no need to list the directory.
        let full = join(prefix, seg);
        match entry_kind(&dir.join(seg)) {
            EntryKind::File if rest.is_empty() => results.push(full),
            EntryKind::Dir if !rest.is_empty() => {
                expand_recursive(&dir.join(seg), rest, &full, results)?
            }
            _ => {}
        }
        return Ok(());
    }

    let entries = read_entries(dir)?;

    if *seg == "**" {
        // Zero directory levels
        expand_recursive(dir, rest, prefix, results)?;

        for (name, kind) in &entries {
            if name.starts_with('.') {
                continue;
            }
            let full = join(prefix, name);
            match kind {
                EntryKind::Dir => expand_recursive(&dir.join(name), segments, &full, results)?,
                EntryKind::File if rest.is_empty() => results.push(full),
                _ => {}
            }
        }
    } else {
        for (name, kind) in &entries {
            if !glob_match(seg, name) {
                continue;
            }
            let full = join(prefix, name);

            if rest.is_empty() {
                if *kind == EntryKind::File {
                    results.push(full);
                }
            } else if *kind == EntryKind::Dir {
                expand_recursive(&dir.join(name), rest, &full, results)?;
            }
        }
    }

    Ok(())
}

fn entry_kind(path: &Path) -> EntryKind {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => EntryKind::Dir,
        Ok(meta) if meta.is_file() => EntryKind::File,
        _ => EntryKind::Other,
    }
}

fn read_entries(dir: &Path) -> Result<Vec<(String, EntryKind)>> {
    let read_dir = match std::fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) if e.kind() == std::io::ErrorKind::NotADirectory => return Ok(Vec::new()),
        Err(e) => return Err(Error::io(dir, e)),
    };

    let mut entries = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == ".git" {
            continue;
        }
        // file_type() does not follow symlinks
        let file_type = entry.file_type().map_err(|e| Error::io(entry.path(), e))?;
        let kind = if file_type.is_dir() {
            EntryKind::Dir
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        };
        entries.push((name, kind));
    }
    Ok(entries)
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}
