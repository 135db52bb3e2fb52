//! Filesystem scanning helpers.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

/// List files under `dir` accepted by `accept`, sorted by path.
///
/// Failure to read `dir` itself is returned; unreadable subdirectories are
/// skipped. Each directory is read once by canonical path, so symlink
/// cycles terminate.
pub fn walk_files<F>(dir: &Path, recursive: bool, accept: F) -> io::Result<Vec<PathBuf>>
where
    F: Fn(&Path) -> bool,
{
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut is_root = true;

    while let Some(current) = pending.pop() {
        let canonical = std::fs::canonicalize(&current).unwrap_or_else(|_| current.clone());
        if !visited.insert(canonical) {
            tracing::debug!(dir = %current.display(), "Directory already scanned");
            continue;
        }

        let entries = match std::fs::read_dir(&current) {
            Ok(entries) => entries,
            Err(e) if is_root => return Err(e),
            Err(e) => {
                tracing::warn!(dir = %current.display(), error = %e, "Skipping unreadable directory");
                continue;
            }
        };
        is_root = false;

        let mut paths: Vec<PathBuf> = entries.flatten().map(|entry| entry.path()).collect();
        paths.sort();

        for path in paths {
            if path.is_dir() {
                if recursive {
                    pending.push(path);
                }
            } else if accept(&path) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Like [`walk_files`], but an unreadable `dir` yields nothing.
pub fn scan_files<F>(dir: &Path, recursive: bool, accept: F) -> Vec<PathBuf>
where
    F: Fn(&Path) -> bool,
{
    match walk_files(dir, recursive, accept) {
        Ok(files) => files,
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "Directory not scanned");
            Vec::new()
        }
    }
}

/// First file named `file_name` below `dir`, searching recursively.
pub fn find_file(dir: &Path, file_name: &str) -> Option<PathBuf> {
    scan_files(dir, true, |path| {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(|name| name == file_name)
            .unwrap_or(false)
    })
    .into_iter()
    .next()
}
