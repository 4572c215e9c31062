use std::path::{Path, PathBuf};

use globset::{Glob, GlobMatcher};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{MergeError, Result};

fn build_matcher(pattern: &str) -> Result<GlobMatcher> {
    Glob::new(pattern)
        .map(|g| g.compile_matcher())
        .map_err(|e| MergeError::InvalidInput(format!("bad pattern {pattern:?}: {e}")))
}

fn check_root(root: &Path) -> Result<()> {
    if !root.is_dir() {
        return Err(MergeError::InvalidInput(format!(
            "not a directory: {}",
            root.display()
        )));
    }
    Ok(())
}

/// Recursively collect every file under `root` whose basename matches
/// `pattern` (a literal name or a shell-style glob like `*.ext`).
///
/// Permission-denied subtrees are skipped silently; other I/O errors
/// propagate. Symbolic links are not followed, which also breaks link cycles.
pub fn find_files(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    check_root(root)?;
    let matcher = build_matcher(pattern)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if is_permission_denied(&err) => continue,
            Err(err) => {
                let path = err.path().unwrap_or(root).to_path_buf();
                let source = err
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("walk failed"));
                return Err(MergeError::io(path, source));
            }
        };

        if entry.file_type().is_file() && matcher.is_match(entry.file_name()) {
            files.push(entry.into_path());
        }
    }

    debug!(root = %root.display(), pattern, count = files.len(), "discovery complete");
    Ok(files)
}

/// Like `find_files`, but yields root-relative paths with forward slashes
/// for cross-platform comparison, optionally limited to the top level.
pub fn find_relative(root: &Path, pattern: &str, recursive: bool) -> Result<Vec<String>> {
    check_root(root)?;
    let matcher = build_matcher(pattern)?;

    let mut walker = WalkDir::new(root).min_depth(1);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if is_permission_denied(&err) => continue,
            Err(err) => {
                let path = err.path().unwrap_or(root).to_path_buf();
                let source = err
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("walk failed"));
                return Err(MergeError::io(path, source));
            }
        };

        if !entry.file_type().is_file() || !matcher.is_match(entry.file_name()) {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|_| MergeError::InvalidInput("failed to compute relative path".into()))?;
        let relative_str = relative
            .to_str()
            .ok_or_else(|| {
                MergeError::InvalidInput(format!("non-UTF8 path: {}", relative.display()))
            })?
            .replace('\\', "/");
        files.push(relative_str);
    }

    Ok(files)
}

fn is_permission_denied(err: &walkdir::Error) -> bool {
    err.io_error()
        .map(|e| e.kind() == std::io::ErrorKind::PermissionDenied)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(name: &str, files: &[&str]) -> PathBuf {
        let root = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&root);
        for rel in files {
            let full = root.join(rel);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(&full, b"x").unwrap();
        }
        root
    }

    #[test]
    fn test_literal_basename() {
        let root = setup(
            "blastmerge_discover_literal",
            &["a/config.toml", "b/deep/config.toml", "b/other.toml"],
        );

        let mut found = find_files(&root, "config.toml").unwrap();
        found.sort();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| p.ends_with("config.toml")));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_glob_pattern() {
        let root = setup(
            "blastmerge_discover_glob",
            &["x.rs", "sub/y.rs", "sub/z.txt"],
        );

        let found = find_files(&root, "*.rs").unwrap();
        assert_eq!(found.len(), 2);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_missing_root_is_invalid_input() {
        let err = find_files(Path::new("/nonexistent/blastmerge/root"), "*").unwrap_err();
        assert!(matches!(err, MergeError::InvalidInput(_)));
    }

    #[test]
    fn test_bad_pattern_is_invalid_input() {
        let root = setup("blastmerge_discover_badpat", &["a.txt"]);
        let err = find_files(&root, "[").unwrap_err();
        assert!(matches!(err, MergeError::InvalidInput(_)));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_relative_non_recursive() {
        let root = setup(
            "blastmerge_discover_rel",
            &["top.txt", "nested/inner.txt"],
        );

        let flat = find_relative(&root, "*.txt", false).unwrap();
        assert_eq!(flat, vec!["top.txt".to_string()]);

        let mut deep = find_relative(&root, "*.txt", true).unwrap();
        deep.sort();
        assert_eq!(deep, vec!["nested/inner.txt".to_string(), "top.txt".to_string()]);

        let _ = std::fs::remove_dir_all(&root);
    }
}
