use std::collections::HashMap;
use std::path::PathBuf;

use rayon::prelude::*;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::{MergeError, Result};
use crate::hash;

/// An equivalence class of paths sharing one byte-identical version.
#[derive(Debug, Clone)]
pub struct FileGroup {
    pub hash: String,
    pub paths: Vec<PathBuf>,
}

/// Result of a grouping run. Per-file read failures do not abort the batch;
/// they are collected here and the affected paths are left out of `groups`.
#[derive(Debug)]
pub struct GroupOutcome {
    pub groups: Vec<FileGroup>,
    pub errors: Vec<MergeError>,
    pub cancelled: bool,
}

/// Bucket paths by content hash alone. Paths keep their input order inside
/// each group; groups appear in first-occurrence order.
pub async fn group_by_hash(paths: Vec<PathBuf>, cancel: CancelToken) -> Result<GroupOutcome> {
    tokio::task::spawn_blocking(move || {
        let hashed = hash_all(&paths, &cancel);
        Ok(bucket(hashed, |_path, digest| digest.to_string(), cancel))
    })
    .await
    .map_err(|e| MergeError::InvalidInput(format!("hash worker panicked: {e}")))?
}

/// Bucket paths by final path component first, then by content hash inside
/// each basename bucket. This is the default when merging across unrelated
/// repositories where different files happen to share content.
pub async fn group_by_name_and_hash(
    paths: Vec<PathBuf>,
    cancel: CancelToken,
) -> Result<GroupOutcome> {
    tokio::task::spawn_blocking(move || {
        let hashed = hash_all(&paths, &cancel);
        Ok(bucket(
            hashed,
            |path, digest| {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                format!("{name}\u{0}{digest}")
            },
            cancel,
        ))
    })
    .await
    .map_err(|e| MergeError::InvalidInput(format!("hash worker panicked: {e}")))?
}

type Hashed = Vec<(PathBuf, Option<Result<String>>)>;

/// Parallel hash phase. Rayon bounds the worker count at the detected CPU
/// count; `None` marks paths skipped after cancellation.
fn hash_all(paths: &[PathBuf], cancel: &CancelToken) -> Hashed {
    paths
        .par_iter()
        .map(|path| {
            if cancel.is_cancelled() {
                return (path.clone(), None);
            }
            (path.clone(), Some(hash::hash_file(path)))
        })
        .collect()
}

fn bucket(
    hashed: Hashed,
    key_of: impl Fn(&PathBuf, &str) -> String,
    cancel: CancelToken,
) -> GroupOutcome {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<FileGroup> = Vec::new();
    let mut errors = Vec::new();

    for (path, outcome) in hashed {
        let digest = match outcome {
            Some(Ok(digest)) => digest,
            Some(Err(err)) => {
                errors.push(err);
                continue;
            }
            None => continue, // skipped after cancellation
        };

        let key = key_of(&path, &digest);
        match index.get(&key) {
            Some(&i) => groups[i].paths.push(path),
            None => {
                index.insert(key, groups.len());
                groups.push(FileGroup {
                    hash: digest,
                    paths: vec![path],
                });
            }
        }
    }

    debug!(
        groups = groups.len(),
        errors = errors.len(),
        "grouping complete"
    );

    GroupOutcome {
        groups,
        errors,
        cancelled: cancel.is_cancelled(),
    }
}
