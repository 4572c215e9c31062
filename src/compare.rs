use std::collections::BTreeSet;
use std::path::Path;

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::discover;
use crate::error::{MergeError, Result};
use crate::hash;

/// Classification of every relative path present under either root.
/// Buckets are lexicographically ordered.
#[derive(Debug, Default, Serialize)]
pub struct DirectoryComparison {
    pub same: Vec<String>,
    pub modified: Vec<String>,
    pub only_in_a: Vec<String>,
    pub only_in_b: Vec<String>,
}

/// Compare two directory trees by content hash.
///
/// Both roots are walked concurrently, then files present on both sides are
/// hashed in parallel. A file that cannot be read is conservatively
/// classified as modified.
pub async fn compare_directories(
    dir_a: &Path,
    dir_b: &Path,
    pattern: &str,
    recursive: bool,
    cancel: CancelToken,
) -> Result<DirectoryComparison> {
    let root_a = dir_a.to_path_buf();
    let root_b = dir_b.to_path_buf();
    let pattern_a = pattern.to_string();
    let pattern_b = pattern.to_string();

    let (files_a, files_b) = tokio::try_join!(
        tokio::task::spawn_blocking(move || discover::find_relative(&root_a, &pattern_a, recursive)),
        tokio::task::spawn_blocking(move || discover::find_relative(&root_b, &pattern_b, recursive)),
    )
    .map_err(|e| MergeError::InvalidInput(format!("walk worker panicked: {e}")))?;

    let set_a: BTreeSet<String> = files_a?.into_iter().collect();
    let set_b: BTreeSet<String> = files_b?.into_iter().collect();

    let only_in_a: Vec<String> = set_a.difference(&set_b).cloned().collect();
    let only_in_b: Vec<String> = set_b.difference(&set_a).cloned().collect();
    let in_both: Vec<String> = set_a.intersection(&set_b).cloned().collect();

    let dir_a = dir_a.to_path_buf();
    let dir_b = dir_b.to_path_buf();
    let classified: Vec<(String, bool)> = tokio::task::spawn_blocking(move || {
        in_both
            .par_iter()
            .map(|rel| {
                if cancel.is_cancelled() {
                    // Drained without reading; conservative classification.
                    return (rel.clone(), false);
                }
                let same = match (
                    hash::hash_file(&dir_a.join(rel)),
                    hash::hash_file(&dir_b.join(rel)),
                ) {
                    (Ok(ha), Ok(hb)) => ha == hb,
                    _ => false,
                };
                (rel.clone(), same)
            })
            .collect()
    })
    .await
    .map_err(|e| MergeError::InvalidInput(format!("hash worker panicked: {e}")))?;

    let mut comparison = DirectoryComparison {
        only_in_a,
        only_in_b,
        ..Default::default()
    };
    for (rel, same) in classified {
        if same {
            comparison.same.push(rel);
        } else {
            comparison.modified.push(rel);
        }
    }
    // BTreeSet iteration already sorted the inputs; par_iter preserved order.

    debug!(
        same = comparison.same.len(),
        modified = comparison.modified.len(),
        only_a = comparison.only_in_a.len(),
        only_b = comparison.only_in_b.len(),
        "directory comparison complete"
    );
    Ok(comparison)
}
