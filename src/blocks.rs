use crate::diff::LineDiff;

/// Unchanged lines carried on each side of a conflict block.
pub const CONTEXT_LINES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Insert,
    Delete,
    Replace,
}

/// One conflict region: the contiguous lines each side contributes, with
/// their 1-based line numbers. Kind is derived from which sides are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffBlock {
    pub kind: BlockKind,
    pub lines_a: Vec<String>,
    pub lines_b: Vec<String>,
    pub line_nos_a: Vec<usize>,
    pub line_nos_b: Vec<usize>,
}

/// Up to `CONTEXT_LINES` unchanged lines adjoining a block on each side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockContext {
    pub before_a: Vec<String>,
    pub after_a: Vec<String>,
    pub before_b: Vec<String>,
    pub after_b: Vec<String>,
}

#[derive(Default)]
struct BlockBuilder {
    lines_a: Vec<String>,
    lines_b: Vec<String>,
    line_nos_a: Vec<usize>,
    line_nos_b: Vec<usize>,
}

impl BlockBuilder {
    fn is_empty(&self) -> bool {
        self.line_nos_a.is_empty() && self.line_nos_b.is_empty()
    }

    /// A diff joins the running block iff each side it touches lands within
    /// one line of that side's running maximum. A side the block has not
    /// touched yet cannot be extended, which keeps every block aligned with
    /// one contiguous run of non-equal edit operations.
    fn accepts(&self, diff: &LineDiff) -> bool {
        let fits = |line_no: Option<usize>, max: Option<&usize>| match (line_no, max) {
            (Some(n), Some(&m)) => n <= m + 1,
            (Some(_), None) => false,
            (None, _) => true,
        };
        fits(diff.line_no_a(), self.line_nos_a.last())
            && fits(diff.line_no_b(), self.line_nos_b.last())
    }

    fn push(&mut self, diff: &LineDiff) {
        match diff {
            LineDiff::Added {
                line_no_b,
                content_b,
            } => {
                self.line_nos_b.push(*line_no_b);
                self.lines_b.push(content_b.clone());
            }
            LineDiff::Deleted {
                line_no_a,
                content_a,
            } => {
                self.line_nos_a.push(*line_no_a);
                self.lines_a.push(content_a.clone());
            }
            LineDiff::Modified {
                line_no_a,
                line_no_b,
                content_a,
                content_b,
            } => {
                self.line_nos_a.push(*line_no_a);
                self.lines_a.push(content_a.clone());
                self.line_nos_b.push(*line_no_b);
                self.lines_b.push(content_b.clone());
            }
        }
    }

    fn finish(self) -> DiffBlock {
        let kind = match (self.line_nos_a.is_empty(), self.line_nos_b.is_empty()) {
            (false, false) => BlockKind::Replace,
            (false, true) => BlockKind::Delete,
            (true, false) => BlockKind::Insert,
            (true, true) => unreachable!("finish called on an empty block"),
        };
        DiffBlock {
            kind,
            lines_a: self.lines_a,
            lines_b: self.lines_b,
            line_nos_a: self.line_nos_a,
            line_nos_b: self.line_nos_b,
        }
    }
}

/// Group consecutive line diffs into conflict blocks. Blocks are disjoint
/// and ordered by the smallest affected line number on the A side.
pub fn extract_blocks(diffs: &[LineDiff]) -> Vec<DiffBlock> {
    let mut blocks = Vec::new();
    let mut builder = BlockBuilder::default();

    for diff in diffs {
        if !builder.is_empty() && !builder.accepts(diff) {
            blocks.push(std::mem::take(&mut builder).finish());
        }
        builder.push(diff);
    }
    if !builder.is_empty() {
        blocks.push(builder.finish());
    }

    blocks
}

/// Unchanged lines around a block, clipped to each file's bounds.
pub fn block_context(block: &DiffBlock, a: &[String], b: &[String]) -> BlockContext {
    let side = |nos: &[usize], lines: &[String]| -> (Vec<String>, Vec<String>) {
        let (Some(&min), Some(&max)) = (nos.first(), nos.last()) else {
            return (Vec::new(), Vec::new());
        };
        let start = min.saturating_sub(1); // 0-based index of first affected line
        let before = lines[start.saturating_sub(CONTEXT_LINES)..start].to_vec();
        let after_start = max.min(lines.len());
        let after_end = (max + CONTEXT_LINES).min(lines.len());
        let after = lines[after_start..after_end].to_vec();
        (before, after)
    };

    let (before_a, after_a) = side(&block.line_nos_a, a);
    let (before_b, after_b) = side(&block.line_nos_b, b);
    BlockContext {
        before_a,
        after_a,
        before_b,
        after_b,
    }
}
