use std::io::Write;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::debug;

use crate::error::{MergeError, Result};
use crate::group::FileGroup;

/// Result of fanning a buffer out to a group. Failed paths never abort
/// sibling writes; both lists preserve the group's path order.
#[derive(Debug)]
pub struct SyncOutcome {
    pub written: Vec<PathBuf>,
    pub failures: Vec<MergeError>,
}

/// Overwrite every path in `group` with `content`, atomically per path:
/// write to a sibling temp file, fsync, then rename over the target. A
/// reader sees either the old bytes or the new ones, never a torn write.
pub fn sync_group(content: &[u8], group: &FileGroup) -> SyncOutcome {
    let results: Vec<(PathBuf, Result<()>)> = group
        .paths
        .par_iter()
        .map(|path| (path.clone(), write_atomic(path, content)))
        .collect();

    let mut written = Vec::new();
    let mut failures = Vec::new();
    for (path, result) in results {
        match result {
            Ok(()) => written.push(path),
            Err(err) => failures.push(err),
        }
    }

    debug!(
        written = written.len(),
        failed = failures.len(),
        "sync complete"
    );
    SyncOutcome { written, failures }
}

fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| MergeError::io(path, e))?;
        }
    }

    let tmp = temp_sibling(path);
    // A stale temp from a crashed run would make create_new fail; clear it.
    let _ = std::fs::remove_file(&tmp);

    let result = write_and_rename(&tmp, path, content);
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}

fn write_and_rename(tmp: &Path, target: &Path, content: &[u8]) -> Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(tmp).map_err(|e| MergeError::io(target, e))?;
    file.write_all(content)
        .map_err(|e| MergeError::io(target, e))?;
    file.sync_all().map_err(|e| MergeError::io(target, e))?;
    drop(file);

    std::fs::rename(tmp, target).map_err(|e| MergeError::io(target, e))
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    path.with_file_name(format!(".{name}.bm-tmp"))
}
