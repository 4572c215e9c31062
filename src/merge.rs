use crate::blocks::{block_context, extract_blocks, BlockContext, BlockKind, DiffBlock};
use crate::diff::{collect_line_diffs, edit_script, EditOp};
use crate::error::{MergeError, Result};

/// Per-block resolution. Which choices are valid depends on the block kind:
/// Insert takes Include/Skip, Delete takes Keep/Remove, Replace takes
/// UseA/UseB/UseBoth/Skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockChoice {
    Include,
    Skip,
    Keep,
    Remove,
    UseA,
    UseB,
    UseBoth,
}

/// What a resolver returns for one block. `Flag` applies the choice but
/// records the block as an advisory conflict; `Cancel` stops the merge after
/// the current block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Apply(BlockChoice),
    Flag(BlockChoice),
    Cancel,
}

/// A block the resolver flagged while still letting the merge complete.
#[derive(Debug, Clone)]
pub struct Conflict {
    pub index: usize,
    pub block: DiffBlock,
}

#[derive(Debug)]
pub struct MergeOutcome {
    pub merged_lines: Vec<String>,
    pub conflicts: Vec<Conflict>,
    pub cancelled: bool,
}

/// Merge two line sequences, delegating each conflict block to `resolve`.
///
/// Blocks come from the extractor over the coalesced diff; unchanged
/// regions between them are copied by following the edit script's Equal
/// operations, so equal runs that sit at different indexes on the two sides
/// (after an earlier insert, say) are still carried through.
pub fn merge_lines<F>(a: &[String], b: &[String], resolve: &mut F) -> Result<MergeOutcome>
where
    F: FnMut(&DiffBlock, &BlockContext, usize) -> Resolution + ?Sized,
{
    let ops = edit_script(a, b);
    let diffs = collect_line_diffs(&ops, a, b);
    let blocks = extract_blocks(&diffs);

    let mut out: Vec<String> = Vec::new();
    let mut conflicts = Vec::new();
    let mut op_cursor = 0usize;

    for (index, block) in blocks.into_iter().enumerate() {
        // Copy the equal run preceding this block. Equal ops carry both
        // indexes, so sides whose equal lines drifted apart stay paired.
        while let Some(EditOp::Equal { a: i, .. }) = ops.get(op_cursor) {
            out.push(a[*i].clone());
            op_cursor += 1;
        }
        // The block covers exactly one edit op per line it carries.
        op_cursor += block.lines_a.len() + block.lines_b.len();

        let context = block_context(&block, a, b);
        match resolve(&block, &context, index) {
            Resolution::Apply(choice) => apply_choice(&block, choice, &mut out)?,
            Resolution::Flag(choice) => {
                apply_choice(&block, choice, &mut out)?;
                conflicts.push(Conflict { index, block });
            }
            Resolution::Cancel => {
                return Ok(MergeOutcome {
                    merged_lines: out,
                    conflicts,
                    cancelled: true,
                });
            }
        }
    }

    // Trailing equal region after the last block.
    while let Some(op) = ops.get(op_cursor) {
        if let EditOp::Equal { a: i, .. } = op {
            out.push(a[*i].clone());
        }
        op_cursor += 1;
    }

    Ok(MergeOutcome {
        merged_lines: out,
        conflicts,
        cancelled: false,
    })
}

fn apply_choice(block: &DiffBlock, choice: BlockChoice, out: &mut Vec<String>) -> Result<()> {
    match (block.kind, choice) {
        (BlockKind::Insert, BlockChoice::Include) => out.extend(block.lines_b.iter().cloned()),
        (BlockKind::Insert, BlockChoice::Skip) => {}
        (BlockKind::Delete, BlockChoice::Keep) => out.extend(block.lines_a.iter().cloned()),
        (BlockKind::Delete, BlockChoice::Remove) => {}
        (BlockKind::Replace, BlockChoice::UseA) => out.extend(block.lines_a.iter().cloned()),
        (BlockKind::Replace, BlockChoice::UseB) => out.extend(block.lines_b.iter().cloned()),
        (BlockKind::Replace, BlockChoice::UseBoth) => {
            out.extend(block.lines_a.iter().cloned());
            out.extend(block.lines_b.iter().cloned());
        }
        (BlockKind::Replace, BlockChoice::Skip) => {}
        (kind, choice) => return Err(MergeError::InvalidChoiceForBlockKind { kind, choice }),
    }
    Ok(())
}
