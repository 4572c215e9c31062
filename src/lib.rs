//! Engine for unifying divergent copies of the same file.
//!
//! The pipeline: discover paths ([`discover`]), partition them into
//! byte-identical versions ([`group`]), rank pairs by similarity
//! ([`similarity`]), decompose the two-way diff into conflict blocks
//! ([`diff`], [`blocks`]), resolve block by block ([`merge`]), reduce N
//! versions to one ([`iterative`]), and write the survivor back everywhere
//! ([`sync`]). [`compare`] classifies two whole trees without merging.

pub mod blocks;
pub mod cancel;
pub mod compare;
pub mod diff;
pub mod discover;
pub mod error;
pub mod group;
pub mod hash;
pub mod iterative;
pub mod merge;
pub mod similarity;
pub mod sync;

pub use blocks::{block_context, extract_blocks, BlockContext, BlockKind, DiffBlock};
pub use cancel::CancelToken;
pub use compare::{compare_directories, DirectoryComparison};
pub use diff::{find_differences, unified_diff, LineDiff};
pub use error::{MergeError, Result};
pub use group::{group_by_hash, group_by_name_and_hash, FileGroup, GroupOutcome};
pub use iterative::{
    iterative_merge, MergeCompletion, MergeFailure, MergeOpSummary, MergeSessionStatus, MergeSide,
};
pub use merge::{merge_lines, BlockChoice, MergeOutcome, Resolution};
pub use similarity::similarity;
pub use sync::{sync_group, SyncOutcome};
