use std::fmt;
use std::path::PathBuf;

use tracing::debug;

use crate::blocks::{BlockContext, DiffBlock};
use crate::diff::{join_lines, read_lines, PLATFORM_NEWLINE};
use crate::error::{MergeError, Result};
use crate::group::FileGroup;
use crate::merge::{merge_lines, MergeOutcome, Resolution};
use crate::similarity::similarity;

/// Left-hand side of a round: either the carried merge buffer or a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeSide {
    Buffer,
    Path(PathBuf),
}

impl fmt::Display for MergeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeSide::Buffer => write!(f, "(merged buffer)"),
            MergeSide::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Reported to the status callback before each round's first block.
#[derive(Debug, Clone)]
pub struct MergeSessionStatus {
    pub round: usize,
    pub remaining_count: usize,
    pub completed_count: usize,
    pub chosen_pair: (MergeSide, PathBuf),
}

/// One row of the session audit log.
#[derive(Debug, Clone)]
pub struct MergeOpSummary {
    pub left: MergeSide,
    pub right: PathBuf,
    pub similarity: f64,
    pub result_lines: usize,
}

/// Why a session ended without a fully agreed result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeFailure {
    Cancelled,
    Failed(String),
}

#[derive(Debug)]
pub struct MergeCompletion {
    pub successful: bool,
    pub final_content: Option<String>,
    pub final_line_count: usize,
    pub operations: Vec<MergeOpSummary>,
    pub failure: Option<MergeFailure>,
}

struct Version {
    path: PathBuf,
    lines: Vec<String>,
    trailing_newline: bool,
}

/// Reduce N distinct versions to one by repeatedly merging the most similar
/// pair, carrying the partial result forward as a virtual left-hand side.
///
/// Exactly N−1 rounds run to completion. Cancellation (from the resolver or
/// the continue callback) and round failures preserve the best-effort buffer
/// in the returned completion.
pub fn iterative_merge(
    groups: &[FileGroup],
    resolve: &mut dyn FnMut(&DiffBlock, &BlockContext, usize) -> Resolution,
    status: &mut dyn FnMut(&MergeSessionStatus),
    ask_continue: &mut dyn FnMut() -> bool,
) -> Result<MergeCompletion> {
    if groups.len() < 2 {
        return Err(MergeError::InvalidInput(format!(
            "need at least 2 distinct versions, got {}",
            groups.len()
        )));
    }
    if let Some(empty) = groups.iter().find(|g| g.paths.is_empty()) {
        return Err(MergeError::InvalidInput(format!(
            "group {} has no paths",
            empty.hash
        )));
    }

    // One representative per group: the first path in insertion order.
    let mut remaining: Vec<Version> = Vec::with_capacity(groups.len());
    for group in groups {
        let path = group.paths[0].clone();
        match read_lines(&path) {
            Ok((lines, trailing_newline)) => remaining.push(Version {
                path,
                lines,
                trailing_newline,
            }),
            Err(err) => return Ok(failed(None, Vec::new(), err.to_string())),
        }
    }

    let total = remaining.len();
    let mut buffer: Option<(Vec<String>, bool)> = None;
    let mut operations: Vec<MergeOpSummary> = Vec::new();
    let mut round = 1usize;

    while !remaining.is_empty() {
        let (left_side, left_lines, left_trailing, right, score) = match &buffer {
            None => {
                let (i, j, score) = best_pair(&remaining);
                // Pull the higher index out first so `i` stays valid.
                let right = remaining.remove(j);
                let left = remaining.remove(i);
                (
                    MergeSide::Path(left.path),
                    left.lines,
                    left.trailing_newline,
                    right,
                    score,
                )
            }
            Some((buf_lines, buf_trailing)) => {
                let (j, score) = best_against(buf_lines, &remaining);
                let right = remaining.remove(j);
                (
                    MergeSide::Buffer,
                    buf_lines.clone(),
                    *buf_trailing,
                    right,
                    score,
                )
            }
        };

        // Counts as of the start of the round: versions not yet folded in
        // (including the pair just chosen) and versions already consumed.
        let remaining_count = remaining.len() + if buffer.is_some() { 1 } else { 2 };
        debug!(round, left = %left_side, right = %right.path.display(), score, "round pair chosen");
        status(&MergeSessionStatus {
            round,
            remaining_count,
            completed_count: total - remaining_count,
            chosen_pair: (left_side.clone(), right.path.clone()),
        });

        let outcome: MergeOutcome = match merge_lines(&left_lines, &right.lines, &mut *resolve) {
            Ok(outcome) => outcome,
            Err(err) => {
                let content = buffer
                    .as_ref()
                    .map(|(lines, trailing)| join_lines(lines, PLATFORM_NEWLINE, *trailing));
                return Ok(failed(content, operations, err.to_string()));
            }
        };

        if outcome.cancelled {
            let content = buffer
                .as_ref()
                .map(|(lines, trailing)| join_lines(lines, PLATFORM_NEWLINE, *trailing));
            return Ok(MergeCompletion {
                successful: false,
                final_line_count: content.as_deref().map(count_lines).unwrap_or(0),
                final_content: content,
                operations,
                failure: Some(MergeFailure::Cancelled),
            });
        }

        let trailing = left_trailing || right.trailing_newline;
        operations.push(MergeOpSummary {
            left: left_side,
            right: right.path,
            similarity: score,
            result_lines: outcome.merged_lines.len(),
        });
        buffer = Some((outcome.merged_lines, trailing));
        round += 1;

        // The continue callback is consulted only while more than one
        // representative is left; a single survivor forces the final round.
        if remaining.len() > 1 && !ask_continue() {
            let content = buffer
                .as_ref()
                .map(|(lines, trailing)| join_lines(lines, PLATFORM_NEWLINE, *trailing));
            return Ok(MergeCompletion {
                successful: false,
                final_line_count: content.as_deref().map(count_lines).unwrap_or(0),
                final_content: content,
                operations,
                failure: Some(MergeFailure::Cancelled),
            });
        }
    }

    let (lines, trailing) = buffer.expect("at least one merge round ran");
    let content = join_lines(&lines, PLATFORM_NEWLINE, trailing);
    Ok(MergeCompletion {
        successful: true,
        final_line_count: lines.len(),
        final_content: Some(content),
        operations,
        failure: None,
    })
}

fn failed(
    final_content: Option<String>,
    operations: Vec<MergeOpSummary>,
    reason: String,
) -> MergeCompletion {
    MergeCompletion {
        successful: false,
        final_line_count: final_content.as_deref().map(count_lines).unwrap_or(0),
        final_content,
        operations,
        failure: Some(MergeFailure::Failed(reason)),
    }
}

fn count_lines(content: &str) -> usize {
    crate::diff::split_lines(content).0.len()
}

/// The representative pair with the highest similarity; ties break toward
/// the lexicographically smallest ordered path pair.
fn best_pair(versions: &[Version]) -> (usize, usize, f64) {
    let mut best: Option<(usize, usize, f64)> = None;
    for i in 0..versions.len() {
        for j in (i + 1)..versions.len() {
            let score = similarity(&versions[i].lines, &versions[j].lines);
            let better = match best {
                None => true,
                Some((bi, bj, best_score)) => {
                    score > best_score
                        || (score == best_score
                            && pair_key(&versions[i], &versions[j])
                                < pair_key(&versions[bi], &versions[bj]))
                }
            };
            if better {
                best = Some((i, j, score));
            }
        }
    }
    best.expect("best_pair requires at least two versions")
}

fn pair_key<'a>(x: &'a Version, y: &'a Version) -> (&'a PathBuf, &'a PathBuf) {
    if x.path <= y.path {
        (&x.path, &y.path)
    } else {
        (&y.path, &x.path)
    }
}

/// The remaining file most similar to the carried buffer; ties break toward
/// the lexicographically smallest path.
fn best_against(buffer: &[String], versions: &[Version]) -> (usize, f64) {
    let mut best: Option<(usize, f64)> = None;
    for (j, version) in versions.iter().enumerate() {
        let score = similarity(buffer, &version.lines);
        let better = match best {
            None => true,
            Some((bj, best_score)) => {
                score > best_score
                    || (score == best_score && version.path < versions[bj].path)
            }
        };
        if better {
            best = Some((j, score));
        }
    }
    best.expect("best_against requires at least one version")
}
