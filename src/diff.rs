use std::fmt::Write as _;
use std::path::Path;

use memmap2::Mmap;
use tracing::trace;

use crate::error::{MergeError, Result};

/// Inputs larger than this on either side skip Myers and use the
/// prefix/suffix heuristic to bound worst-case memory.
const MYERS_MAX_LINES: usize = 5000;

/// Edit-distance budget for Myers; beyond this the trace would dominate
/// memory, so the engine falls back internally (`DiffOverflow`).
const MYERS_EDIT_BUDGET: usize = 2048;

pub const PLATFORM_NEWLINE: &str = if cfg!(windows) { "\r\n" } else { "\n" };

/// One step of a line-level edit script. Indices are 0-based positions into
/// the input line arrays; applying the script to A yields B exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOp {
    Equal { a: usize, b: usize },
    Delete { a: usize },
    Insert { b: usize },
}

/// A coalesced line difference. Variants structurally carry only the sides
/// they affect; line numbers are 1-based and content excludes terminators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineDiff {
    Added {
        line_no_b: usize,
        content_b: String,
    },
    Deleted {
        line_no_a: usize,
        content_a: String,
    },
    Modified {
        line_no_a: usize,
        line_no_b: usize,
        content_a: String,
        content_b: String,
    },
}

impl LineDiff {
    pub fn line_no_a(&self) -> Option<usize> {
        match self {
            LineDiff::Deleted { line_no_a, .. } | LineDiff::Modified { line_no_a, .. } => {
                Some(*line_no_a)
            }
            LineDiff::Added { .. } => None,
        }
    }

    pub fn line_no_b(&self) -> Option<usize> {
        match self {
            LineDiff::Added { line_no_b, .. } | LineDiff::Modified { line_no_b, .. } => {
                Some(*line_no_b)
            }
            LineDiff::Deleted { .. } => None,
        }
    }
}

/// Split text into lines on `\r\n`, `\n`, or `\r`. The second value records
/// whether the text ended with a terminator, so merge output can preserve it.
pub fn split_lines(text: &str) -> (Vec<String>, bool) {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\n' => lines.push(std::mem::take(&mut current)),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                lines.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }

    let trailing = !text.is_empty() && current.is_empty();
    if !current.is_empty() {
        lines.push(current);
    }
    (lines, trailing)
}

/// Join merged lines back into a buffer, restoring the trailing terminator
/// when the inputs carried one.
pub fn join_lines(lines: &[String], newline: &str, trailing: bool) -> String {
    let mut out = lines.join(newline);
    if trailing && !lines.is_empty() {
        out.push_str(newline);
    }
    out
}

/// Read a file and split it into lines. Invalid UTF-8 is replaced rather
/// than rejected; binary content is only ever hash-compared upstream.
pub fn read_lines(path: &Path) -> Result<(Vec<String>, bool)> {
    let file = std::fs::File::open(path).map_err(|e| MergeError::io(path, e))?;
    let meta = file.metadata().map_err(|e| MergeError::io(path, e))?;
    if meta.len() == 0 {
        return Ok((Vec::new(), false));
    }
    // SAFETY: read-only mapping; the tree is not mutated while diffing.
    let mmap =
        unsafe { Mmap::map(&file) }.map_err(|e| MergeError::io(path, e))?;
    let text = String::from_utf8_lossy(&mmap);
    Ok(split_lines(&text))
}

/// Compute a minimal line-level edit script from `a` to `b`.
///
/// Uses Myers O(ND); oversized inputs or a blown edit budget fall back to a
/// common-prefix/suffix heuristic so the call itself never fails.
pub fn edit_script(a: &[String], b: &[String]) -> Vec<EditOp> {
    // Strip the common prefix and suffix first; Myers then only sees the
    // changed core, which keeps the trace small for typical edits.
    let prefix = a
        .iter()
        .zip(b.iter())
        .take_while(|(x, y)| x == y)
        .count();
    let mut suffix = 0;
    while suffix < a.len().saturating_sub(prefix)
        && suffix < b.len().saturating_sub(prefix)
        && a[a.len() - 1 - suffix] == b[b.len() - 1 - suffix]
    {
        suffix += 1;
    }

    let core_a = &a[prefix..a.len() - suffix];
    let core_b = &b[prefix..b.len() - suffix];

    let core_ops = if core_a.len() > MYERS_MAX_LINES || core_b.len() > MYERS_MAX_LINES {
        replace_all_script(core_a.len(), core_b.len())
    } else {
        match myers(core_a, core_b, MYERS_EDIT_BUDGET) {
            Ok(ops) => ops,
            Err(MergeError::DiffOverflow(budget)) => {
                trace!(budget, "edit budget exceeded, using replace-all fallback");
                replace_all_script(core_a.len(), core_b.len())
            }
            Err(_) => replace_all_script(core_a.len(), core_b.len()),
        }
    };

    let mut ops = Vec::with_capacity(prefix + core_ops.len() + suffix);
    for i in 0..prefix {
        ops.push(EditOp::Equal { a: i, b: i });
    }
    for op in core_ops {
        ops.push(match op {
            EditOp::Equal { a: x, b: y } => EditOp::Equal {
                a: x + prefix,
                b: y + prefix,
            },
            EditOp::Delete { a: x } => EditOp::Delete { a: x + prefix },
            EditOp::Insert { b: y } => EditOp::Insert { b: y + prefix },
        });
    }
    for i in 0..suffix {
        ops.push(EditOp::Equal {
            a: a.len() - suffix + i,
            b: b.len() - suffix + i,
        });
    }
    ops
}

/// Heuristic script: delete the whole left core, insert the whole right one.
/// Valid (applying it still yields B) but not minimal.
fn replace_all_script(n: usize, m: usize) -> Vec<EditOp> {
    let mut ops = Vec::with_capacity(n + m);
    for a in 0..n {
        ops.push(EditOp::Delete { a });
    }
    for b in 0..m {
        ops.push(EditOp::Insert { b });
    }
    ops
}

/// Myers' greedy O(ND) edit script with a trace for backtracking.
fn myers(a: &[String], b: &[String], budget: usize) -> Result<Vec<EditOp>> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    if n == 0 && m == 0 {
        return Ok(Vec::new());
    }

    let bound = (n + m).min(budget as isize);
    // One slot of slack on each side so k-1/k+1 probes at |k| == bound stay
    // in range.
    let width = (2 * bound + 3) as usize;
    let idx = |k: isize| (k + bound + 1) as usize;

    let mut v = vec![0isize; width];
    let mut trace: Vec<Vec<isize>> = Vec::new();
    let mut found: Option<isize> = None;

    'outer: for d in 0..=bound {
        trace.push(v.clone());
        let mut k = -d;
        while k <= d {
            let mut x = if k == -d || (k != d && v[idx(k - 1)] < v[idx(k + 1)]) {
                v[idx(k + 1)]
            } else {
                v[idx(k - 1)] + 1
            };
            let mut y = x - k;
            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            v[idx(k)] = x;
            if x >= n && y >= m {
                found = Some(d);
                break 'outer;
            }
            k += 2;
        }
    }

    let d_final = match found {
        Some(d) => d,
        None => return Err(MergeError::DiffOverflow(budget)),
    };

    // Walk the trace backwards, reconstructing snakes and single edits.
    let mut ops = Vec::new();
    let mut x = n;
    let mut y = m;
    for d in (1..=d_final).rev() {
        let v = &trace[d as usize];
        let k = x - y;
        let prev_k = if k == -d || (k != d && v[idx(k - 1)] < v[idx(k + 1)]) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = v[idx(prev_k)];
        let prev_y = prev_x - prev_k;

        while x > prev_x && y > prev_y {
            ops.push(EditOp::Equal {
                a: (x - 1) as usize,
                b: (y - 1) as usize,
            });
            x -= 1;
            y -= 1;
        }
        if prev_k == k + 1 {
            ops.push(EditOp::Insert {
                b: prev_y as usize,
            });
        } else {
            ops.push(EditOp::Delete {
                a: prev_x as usize,
            });
        }
        x = prev_x;
        y = prev_y;
    }
    while x > 0 && y > 0 {
        ops.push(EditOp::Equal {
            a: (x - 1) as usize,
            b: (y - 1) as usize,
        });
        x -= 1;
        y -= 1;
    }

    ops.reverse();
    Ok(ops)
}

/// Coalesce an edit script into `LineDiff`s: delete/insert runs at the same
/// logical position pair up as `Modified`, leftovers stay `Deleted`/`Added`.
pub fn collect_line_diffs(ops: &[EditOp], a: &[String], b: &[String]) -> Vec<LineDiff> {
    let mut diffs = Vec::new();
    let mut deletes: Vec<usize> = Vec::new();
    let mut inserts: Vec<usize> = Vec::new();

    let flush = |deletes: &mut Vec<usize>, inserts: &mut Vec<usize>, diffs: &mut Vec<LineDiff>| {
        let paired = deletes.len().min(inserts.len());
        for i in 0..paired {
            diffs.push(LineDiff::Modified {
                line_no_a: deletes[i] + 1,
                line_no_b: inserts[i] + 1,
                content_a: a[deletes[i]].clone(),
                content_b: b[inserts[i]].clone(),
            });
        }
        for &ai in &deletes[paired..] {
            diffs.push(LineDiff::Deleted {
                line_no_a: ai + 1,
                content_a: a[ai].clone(),
            });
        }
        for &bi in &inserts[paired..] {
            diffs.push(LineDiff::Added {
                line_no_b: bi + 1,
                content_b: b[bi].clone(),
            });
        }
        deletes.clear();
        inserts.clear();
    };

    for op in ops {
        match op {
            EditOp::Equal { .. } => flush(&mut deletes, &mut inserts, &mut diffs),
            EditOp::Delete { a } => deletes.push(*a),
            EditOp::Insert { b } => inserts.push(*b),
        }
    }
    flush(&mut deletes, &mut inserts, &mut diffs);

    diffs
}

/// Line-level differences between two files on disk.
pub fn find_differences(path_a: &Path, path_b: &Path) -> Result<Vec<LineDiff>> {
    let (lines_a, _) = read_lines(path_a)?;
    let (lines_b, _) = read_lines(path_b)?;
    let ops = edit_script(&lines_a, &lines_b);
    Ok(collect_line_diffs(&ops, &lines_a, &lines_b))
}

/// Render a unified diff with `--- a/NAME` / `+++ b/NAME` headers and
/// `@@ -os,oc +ns,nc @@` hunks.
pub fn unified_diff(
    name_a: &str,
    name_b: &str,
    a: &[String],
    b: &[String],
    context: usize,
) -> String {
    let ops = edit_script(a, b);
    let change_idx: Vec<usize> = ops
        .iter()
        .enumerate()
        .filter(|(_, op)| !matches!(op, EditOp::Equal { .. }))
        .map(|(i, _)| i)
        .collect();

    let mut out = String::new();
    if change_idx.is_empty() {
        return out;
    }
    let _ = writeln!(out, "--- a/{name_a}");
    let _ = writeln!(out, "+++ b/{name_b}");

    // Group changes whose context windows touch into one hunk.
    let mut hunks: Vec<(usize, usize)> = Vec::new(); // op index ranges, inclusive
    let mut start = change_idx[0];
    let mut end = change_idx[0];
    for &i in &change_idx[1..] {
        if i - end <= 2 * context {
            end = i;
        } else {
            hunks.push((start, end));
            start = i;
            end = i;
        }
    }
    hunks.push((start, end));

    for (first, last) in hunks {
        let lo = first.saturating_sub(context);
        let hi = (last + context + 1).min(ops.len());

        let mut old_start = 0;
        let mut new_start = 0;
        let mut old_count = 0;
        let mut new_count = 0;
        for op in &ops[lo..hi] {
            match op {
                EditOp::Equal { a, b } => {
                    if old_count == 0 {
                        old_start = a + 1;
                    }
                    if new_count == 0 {
                        new_start = b + 1;
                    }
                    old_count += 1;
                    new_count += 1;
                }
                EditOp::Delete { a } => {
                    if old_count == 0 {
                        old_start = a + 1;
                    }
                    old_count += 1;
                }
                EditOp::Insert { b } => {
                    if new_count == 0 {
                        new_start = b + 1;
                    }
                    new_count += 1;
                }
            }
        }
        // Empty-side convention: start is the last line before the hunk (0
        // when the hunk sits at the top of the file).
        if old_count == 0 {
            old_start = lines_consumed_before(&ops, lo, Side::A);
        }
        if new_count == 0 {
            new_start = lines_consumed_before(&ops, lo, Side::B);
        }

        let _ = writeln!(out, "@@ -{old_start},{old_count} +{new_start},{new_count} @@");
        for op in &ops[lo..hi] {
            match op {
                EditOp::Equal { a: i, .. } => {
                    let _ = writeln!(out, " {}", a[*i]);
                }
                EditOp::Delete { a: i } => {
                    let _ = writeln!(out, "-{}", a[*i]);
                }
                EditOp::Insert { b: i } => {
                    let _ = writeln!(out, "+{}", b[*i]);
                }
            }
        }
    }

    out
}

#[derive(Clone, Copy)]
enum Side {
    A,
    B,
}

/// How many lines of the given side lie strictly before op index `lo`.
/// Used for the `-X,0` / `+X,0` headers of one-sided hunks.
fn lines_consumed_before(ops: &[EditOp], lo: usize, side: Side) -> usize {
    ops[..lo]
        .iter()
        .rev()
        .find_map(|op| match (side, op) {
            (Side::A, EditOp::Equal { a, .. }) | (Side::A, EditOp::Delete { a }) => Some(a + 1),
            (Side::B, EditOp::Equal { b, .. }) | (Side::B, EditOp::Insert { b }) => Some(b + 1),
            _ => None,
        })
        .unwrap_or(0)
}
