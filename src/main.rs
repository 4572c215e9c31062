use std::io::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use blastmerge::blocks::{BlockContext, BlockKind, DiffBlock};
use blastmerge::diff::{read_lines, unified_diff};
use blastmerge::error::MergeError;
use blastmerge::group::FileGroup;
use blastmerge::iterative::{MergeFailure, MergeSessionStatus};
use blastmerge::merge::{BlockChoice, Resolution};
use blastmerge::{
    compare_directories, group_by_hash, group_by_name_and_hash, iterative_merge, sync_group,
    CancelToken,
};

#[derive(Parser)]
#[command(
    name = "blastmerge",
    about = "Unify divergent copies of the same file across directory trees"
)]
struct Cli {
    /// Worker count for the parallel hash phases (default: CPU count)
    #[arg(long, global = true)]
    workers: Option<usize>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum PreferSide {
    A,
    B,
}

#[derive(Subcommand)]
enum Commands {
    /// Find every copy matching a pattern, merge the versions, sync back
    Merge {
        /// Root directory to search
        #[arg(long)]
        root: PathBuf,
        /// Filename or glob to look for (e.g. `config.toml`, `*.env`)
        #[arg(long, short)]
        pattern: String,
        /// Group by content hash only, ignoring basenames
        #[arg(long)]
        flat: bool,
        /// Resolve every block toward one side without prompting
        #[arg(long, value_enum)]
        prefer: Option<PreferSide>,
    },
    /// Classify files under two roots as same / modified / one-sided
    Compare {
        #[arg(long)]
        dir_a: PathBuf,
        #[arg(long)]
        dir_b: PathBuf,
        /// Filename or glob filter
        #[arg(long, short, default_value = "*")]
        pattern: String,
        /// Descend into subdirectories
        #[arg(long)]
        recursive: bool,
        /// Emit the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a unified diff between two files
    Diff {
        #[arg(long)]
        file_a: PathBuf,
        #[arg(long)]
        file_b: PathBuf,
        /// Context lines around each hunk
        #[arg(long, default_value_t = 3)]
        context: usize,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Some(workers) = cli.workers {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build_global()
        {
            eprintln!("Error: failed to size worker pool: {e}");
            std::process::exit(2);
        }
    }

    let code = match run(cli.command).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

/// Exit codes: 0 success, 1 merge cancelled, 2 invalid inputs, 3 I/O failure.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<MergeError>() {
        Some(MergeError::Cancelled) => 1,
        Some(MergeError::InvalidInput(_)) | Some(MergeError::InvalidChoiceForBlockKind { .. }) => 2,
        Some(MergeError::Io { .. }) => 3,
        _ => 3,
    }
}

async fn run(command: Commands) -> Result<i32> {
    match command {
        Commands::Merge {
            root,
            pattern,
            flat,
            prefer,
        } => run_merge(root, pattern, flat, prefer).await,
        Commands::Compare {
            dir_a,
            dir_b,
            pattern,
            recursive,
            json,
        } => {
            let cmp =
                compare_directories(&dir_a, &dir_b, &pattern, recursive, CancelToken::new())
                    .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&cmp)?);
            } else {
                println!("Same:       {}", cmp.same.len());
                println!("Modified:   {}", cmp.modified.len());
                println!("Only in A:  {}", cmp.only_in_a.len());
                println!("Only in B:  {}", cmp.only_in_b.len());
                for rel in &cmp.modified {
                    println!("  M {rel}");
                }
                for rel in &cmp.only_in_a {
                    println!("  A {rel}");
                }
                for rel in &cmp.only_in_b {
                    println!("  B {rel}");
                }
            }
            Ok(0)
        }
        Commands::Diff {
            file_a,
            file_b,
            context,
        } => {
            let (lines_a, _) = read_lines(&file_a)?;
            let (lines_b, _) = read_lines(&file_b)?;
            let name_a = file_a.display().to_string();
            let name_b = file_b.display().to_string();
            print!(
                "{}",
                unified_diff(&name_a, &name_b, &lines_a, &lines_b, context)
            );
            Ok(0)
        }
    }
}

async fn run_merge(
    root: PathBuf,
    pattern: String,
    flat: bool,
    prefer: Option<PreferSide>,
) -> Result<i32> {
    println!("Searching for {pattern} under {}", root.display());
    let paths = blastmerge::discover::find_files(&root, &pattern)?;
    if paths.is_empty() {
        return Err(MergeError::InvalidInput(format!("no files match {pattern:?}")).into());
    }

    let cancel = CancelToken::new();
    let outcome = if flat {
        group_by_hash(paths, cancel).await?
    } else {
        group_by_name_and_hash(paths, cancel).await?
    };
    for err in &outcome.errors {
        eprintln!("warning: {err}");
    }

    let copies: usize = outcome.groups.iter().map(|g| g.paths.len()).sum();
    println!(
        "  {} copies in {} distinct versions",
        copies,
        outcome.groups.len()
    );

    if outcome.groups.len() < 2 {
        println!("All copies already agree; nothing to merge.");
        return Ok(0);
    }

    let interactive = prefer.is_none();
    let mut resolve = |block: &DiffBlock, ctx: &BlockContext, index: usize| match prefer {
        Some(PreferSide::A) => Resolution::Apply(match block.kind {
            BlockKind::Insert => BlockChoice::Skip,
            BlockKind::Delete => BlockChoice::Keep,
            BlockKind::Replace => BlockChoice::UseA,
        }),
        Some(PreferSide::B) => Resolution::Apply(match block.kind {
            BlockKind::Insert => BlockChoice::Include,
            BlockKind::Delete => BlockChoice::Remove,
            BlockKind::Replace => BlockChoice::UseB,
        }),
        None => prompt_for_block(block, ctx, index),
    };
    let mut status = |s: &MergeSessionStatus| {
        println!(
            "\nRound {}: merging {} with {} ({} versions left)",
            s.round,
            s.chosen_pair.0,
            s.chosen_pair.1.display(),
            s.remaining_count,
        );
    };
    let mut ask_continue = || {
        if !interactive {
            return true;
        }
        prompt_line("Continue with the next version? [y/n] ")
            .map(|line| !line.trim().eq_ignore_ascii_case("n"))
            .unwrap_or(false)
    };

    let completion =
        iterative_merge(&outcome.groups, &mut resolve, &mut status, &mut ask_continue)?;

    for op in &completion.operations {
        println!(
            "  merged {} + {} (similarity {:.2}) -> {} lines",
            op.left,
            op.right.display(),
            op.similarity,
            op.result_lines
        );
    }

    match completion.failure {
        Some(MergeFailure::Cancelled) => {
            println!("\nMerge cancelled; no files were modified.");
            return Ok(1);
        }
        Some(MergeFailure::Failed(reason)) => {
            eprintln!("\nMerge failed: {reason}");
            return Ok(3);
        }
        None => {}
    }

    let content = completion
        .final_content
        .context("completed merge carries final content")?;
    println!(
        "\nMerge complete: {} lines. Syncing to {} paths...",
        completion.final_line_count, copies
    );

    let all_paths: Vec<PathBuf> = outcome
        .groups
        .iter()
        .flat_map(|g| g.paths.iter().cloned())
        .collect();
    let target = FileGroup {
        hash: blastmerge::hash::hash_bytes(content.as_bytes()),
        paths: all_paths,
    };
    let sync_outcome = sync_group(content.as_bytes(), &target);

    println!("  Files written: {}", sync_outcome.written.len());
    if !sync_outcome.failures.is_empty() {
        println!("  Failures: {}", sync_outcome.failures.len());
        for err in &sync_outcome.failures {
            eprintln!("    {err}");
        }
        return Ok(3);
    }
    Ok(0)
}

fn prompt_for_block(block: &DiffBlock, ctx: &BlockContext, index: usize) -> Resolution {
    let kind = match block.kind {
        BlockKind::Insert => "insert",
        BlockKind::Delete => "delete",
        BlockKind::Replace => "replace",
    };
    println!("\n--- block {} ({kind}) ---", index + 1);
    let before = if ctx.before_a.is_empty() {
        &ctx.before_b
    } else {
        &ctx.before_a
    };
    let after = if ctx.after_a.is_empty() {
        &ctx.after_b
    } else {
        &ctx.after_a
    };
    for line in before {
        println!("       {line}");
    }
    for (no, line) in block.line_nos_a.iter().zip(&block.lines_a) {
        println!("- {no:>4} {line}");
    }
    for (no, line) in block.line_nos_b.iter().zip(&block.lines_b) {
        println!("+ {no:>4} {line}");
    }
    for line in after {
        println!("       {line}");
    }

    let menu = match block.kind {
        BlockKind::Insert => "[i] include  [s] skip  [q] cancel: ",
        BlockKind::Delete => "[k] keep  [r] remove  [q] cancel: ",
        BlockKind::Replace => "[a] left  [b] right  [u] both  [s] skip  [q] cancel: ",
    };

    loop {
        let Some(line) = prompt_line(menu) else {
            return Resolution::Cancel;
        };
        let choice = match (block.kind, line.trim().to_ascii_lowercase().as_str()) {
            (_, "q") => return Resolution::Cancel,
            (BlockKind::Insert, "i") => Some(BlockChoice::Include),
            (BlockKind::Insert, "s") => Some(BlockChoice::Skip),
            (BlockKind::Delete, "k") => Some(BlockChoice::Keep),
            (BlockKind::Delete, "r") => Some(BlockChoice::Remove),
            (BlockKind::Replace, "a") => Some(BlockChoice::UseA),
            (BlockKind::Replace, "b") => Some(BlockChoice::UseB),
            (BlockKind::Replace, "u") => Some(BlockChoice::UseBoth),
            (BlockKind::Replace, "s") => Some(BlockChoice::Skip),
            _ => None,
        };
        match choice {
            Some(choice) => return Resolution::Apply(choice),
            None => println!("unrecognized choice"),
        }
    }
}

/// Print a prompt and read one line; None on EOF or a broken stdin.
fn prompt_line(prompt: &str) -> Option<String> {
    print!("{prompt}");
    std::io::stdout().flush().ok()?;
    let mut line = String::new();
    match std::io::stdin().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line),
    }
}
