use std::path::PathBuf;

use thiserror::Error;

use crate::blocks::BlockKind;
use crate::merge::BlockChoice;

pub type Result<T> = std::result::Result<T, MergeError>;

/// Error taxonomy for the merge engine.
///
/// Per-file I/O errors inside batch operations (hashing a group, syncing a
/// group) are collected into the batch result instead of being raised through
/// this type; everything else propagates.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("i/o failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{choice:?} is not a valid choice for a {kind:?} block")]
    InvalidChoiceForBlockKind { kind: BlockKind, choice: BlockChoice },

    #[error("merge cancelled")]
    Cancelled,

    #[error("edit script exceeded the budget of {0} edits")]
    DiffOverflow(usize),
}

impl MergeError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
