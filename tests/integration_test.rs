use std::fs;
use std::path::{Path, PathBuf};

use blastmerge::blocks::BlockKind;
use blastmerge::error::MergeError;
use blastmerge::group::FileGroup;
use blastmerge::iterative::{iterative_merge, MergeFailure, MergeSessionStatus, MergeSide};
use blastmerge::merge::{BlockChoice, Resolution};
use blastmerge::{group_by_name_and_hash, sync_group, CancelToken};

fn setup(name: &str, files: &[(&str, &str)]) -> PathBuf {
    let root = std::env::temp_dir().join(name);
    let _ = fs::remove_dir_all(&root);
    fs::create_dir_all(&root).unwrap();
    for (rel, content) in files {
        let full = root.join(rel);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(&full, content).unwrap();
    }
    root
}

fn group_per_file(root: &Path, rels: &[&str]) -> Vec<FileGroup> {
    rels.iter()
        .enumerate()
        .map(|(i, rel)| FileGroup {
            hash: format!("{i:016x}"),
            paths: vec![root.join(rel)],
        })
        .collect()
}

fn take_b(kind: BlockKind) -> Resolution {
    Resolution::Apply(match kind {
        BlockKind::Insert => BlockChoice::Include,
        BlockKind::Delete => BlockChoice::Remove,
        BlockKind::Replace => BlockChoice::UseB,
    })
}

#[test]
fn test_three_way_identical_tail_merge() {
    let root = setup(
        "blastmerge_it_threeway",
        &[
            ("g1.txt", "1\n2\n3\n"),
            ("g2.txt", "1\n2\nX\n"),
            ("g3.txt", "1\n2\nY\n"),
        ],
    );
    let groups = group_per_file(&root, &["g1.txt", "g2.txt", "g3.txt"]);

    let completion = iterative_merge(
        &groups,
        &mut |block, _, _| take_b(block.kind),
        &mut |_| {},
        &mut || true,
    )
    .unwrap();

    assert!(completion.successful);
    assert_eq!(completion.operations.len(), 2);
    assert_eq!(completion.final_content.as_deref(), Some("1\n2\nY\n"));
    assert_eq!(completion.final_line_count, 3);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn test_first_round_picks_unique_most_similar_pair() {
    // v1/v2 differ by one line of ten (0.9); every other pair scores lower.
    let v1: String = (0..10).map(|i| format!("line{i}\n")).collect();
    let v2: String = (0..9)
        .map(|i| format!("line{i}\n"))
        .chain(["changed\n".to_string()])
        .collect();
    let v3: String = (0..10)
        .map(|i| {
            if i < 5 {
                format!("other{i}\n")
            } else {
                format!("line{i}\n")
            }
        })
        .collect();
    let v4: String = (0..10).map(|i| format!("unrelated{i}\n")).collect();

    let root = setup(
        "blastmerge_it_ordering",
        &[
            ("v1.txt", &v1),
            ("v2.txt", &v2),
            ("v3.txt", &v3),
            ("v4.txt", &v4),
        ],
    );
    let groups = group_per_file(&root, &["v1.txt", "v2.txt", "v3.txt", "v4.txt"]);

    let mut statuses: Vec<MergeSessionStatus> = Vec::new();
    let completion = iterative_merge(
        &groups,
        &mut |block, _, _| take_b(block.kind),
        &mut |s| statuses.push(s.clone()),
        &mut || true,
    )
    .unwrap();

    assert!(completion.successful);
    // Exactly N-1 rounds for N distinct versions.
    assert_eq!(completion.operations.len(), 3);
    assert_eq!(statuses.len(), 3);
    assert_eq!(
        statuses[0].chosen_pair,
        (MergeSide::Path(root.join("v1.txt")), root.join("v2.txt"))
    );
    assert_eq!(statuses[0].round, 1);
    assert_eq!(statuses[0].remaining_count, 4);
    assert_eq!(statuses[0].completed_count, 0);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn test_status_precedes_resolution_each_round() {
    let root = setup(
        "blastmerge_it_status_order",
        &[("a.txt", "x\n1\n"), ("b.txt", "y\n1\n"), ("c.txt", "z\n1\n")],
    );
    let groups = group_per_file(&root, &["a.txt", "b.txt", "c.txt"]);

    let mut events: Vec<&'static str> = Vec::new();
    {
        let events = std::cell::RefCell::new(&mut events);
        iterative_merge(
            &groups,
            &mut |block, _, _| {
                events.borrow_mut().push("resolve");
                take_b(block.kind)
            },
            &mut |_| events.borrow_mut().push("status"),
            &mut || true,
        )
        .unwrap();
    }

    assert_eq!(events.first(), Some(&"status"));
    let mut last = "";
    for event in &events {
        if *event == "status" {
            assert_ne!(last, "status", "two statuses without a resolve between");
        }
        last = event;
    }

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn test_decline_continue_preserves_partial_buffer() {
    // Two versions are still unmerged after round one, so the continue
    // callback gets a real say; declining keeps the round-one buffer.
    let root = setup(
        "blastmerge_it_decline",
        &[
            ("a.txt", "1\n2\n3\n"),
            ("b.txt", "1\n2\nX\n"),
            ("c.txt", "foo\n"),
            ("d.txt", "bar\n"),
        ],
    );
    let groups = group_per_file(&root, &["a.txt", "b.txt", "c.txt", "d.txt"]);

    let completion = iterative_merge(
        &groups,
        &mut |block, _, _| take_b(block.kind),
        &mut |_| {},
        &mut || false,
    )
    .unwrap();

    assert!(!completion.successful);
    assert_eq!(completion.failure, Some(MergeFailure::Cancelled));
    assert_eq!(completion.operations.len(), 1);
    // The round-one result survives for salvage.
    assert_eq!(completion.final_content.as_deref(), Some("1\n2\nX\n"));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn test_continue_not_asked_when_one_version_remains() {
    let root = setup(
        "blastmerge_it_no_spurious_ask",
        &[
            ("a.txt", "1\n2\n3\n"),
            ("b.txt", "1\n2\nX\n"),
            ("c.txt", "1\n2\nY\n"),
        ],
    );
    let groups = group_per_file(&root, &["a.txt", "b.txt", "c.txt"]);

    let mut asks = 0;
    let completion = iterative_merge(
        &groups,
        &mut |block, _, _| take_b(block.kind),
        &mut |_| {},
        &mut || {
            asks += 1;
            true
        },
    )
    .unwrap();

    assert!(completion.successful);
    assert_eq!(completion.operations.len(), 2);
    // After round one a single representative remains; the final round is
    // forced, so the continue callback is never consulted.
    assert_eq!(asks, 0);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn test_resolver_cancel_in_first_round_yields_no_buffer() {
    let root = setup("blastmerge_it_cancel", &[("a.txt", "1\n"), ("b.txt", "2\n")]);
    let groups = group_per_file(&root, &["a.txt", "b.txt"]);

    let completion = iterative_merge(
        &groups,
        &mut |_, _, _| Resolution::Cancel,
        &mut |_| {},
        &mut || true,
    )
    .unwrap();

    assert!(!completion.successful);
    assert_eq!(completion.failure, Some(MergeFailure::Cancelled));
    assert!(completion.final_content.is_none());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn test_fewer_than_two_groups_is_invalid_input() {
    let root = setup("blastmerge_it_single", &[("only.txt", "x\n")]);
    let groups = group_per_file(&root, &["only.txt"]);

    let err = iterative_merge(
        &groups,
        &mut |_, _, _| Resolution::Cancel,
        &mut |_| {},
        &mut || true,
    )
    .unwrap_err();
    assert!(matches!(err, MergeError::InvalidInput(_)));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn test_unreadable_representative_fails_with_reason() {
    let root = setup("blastmerge_it_badfile", &[("a.txt", "x\n")]);
    let mut groups = group_per_file(&root, &["a.txt"]);
    groups.push(FileGroup {
        hash: "ffffffffffffffff".to_string(),
        paths: vec![root.join("missing.txt")],
    });

    let completion = iterative_merge(
        &groups,
        &mut |_, _, _| Resolution::Cancel,
        &mut |_| {},
        &mut || true,
    )
    .unwrap();
    assert!(!completion.successful);
    assert!(matches!(completion.failure, Some(MergeFailure::Failed(_))));

    let _ = fs::remove_dir_all(&root);
}

#[tokio::test]
async fn test_end_to_end_discover_group_merge_sync() {
    // Three repos carry the same config under different parents; two
    // versions exist. Fold them to one and push it back everywhere.
    let root = setup(
        "blastmerge_it_e2e",
        &[
            ("repo1/app.cfg", "host=alpha\nport=80\n"),
            ("repo2/app.cfg", "host=alpha\nport=80\n"),
            ("repo3/app.cfg", "host=alpha\nport=8080\ntls=yes\n"),
        ],
    );

    let paths = blastmerge::discover::find_files(&root, "app.cfg").unwrap();
    assert_eq!(paths.len(), 3);

    let outcome = group_by_name_and_hash(paths, CancelToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.groups.len(), 2);

    let completion = iterative_merge(
        &outcome.groups,
        &mut |block, _, _| take_b(block.kind),
        &mut |_| {},
        &mut || true,
    )
    .unwrap();
    assert!(completion.successful);
    let merged = completion.final_content.unwrap();

    let all_paths: Vec<PathBuf> = outcome
        .groups
        .iter()
        .flat_map(|g| g.paths.iter().cloned())
        .collect();
    let target = FileGroup {
        hash: blastmerge::hash::hash_bytes(merged.as_bytes()),
        paths: all_paths.clone(),
    };
    let synced = sync_group(merged.as_bytes(), &target);
    assert_eq!(synced.written.len(), 3);
    assert!(synced.failures.is_empty());

    for path in &all_paths {
        assert_eq!(fs::read_to_string(path).unwrap(), merged);
    }

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn test_trailing_newline_preserved_through_session() {
    let root = setup(
        "blastmerge_it_trailing",
        &[("a.txt", "alpha\nshared\n"), ("b.txt", "beta\nshared\n")],
    );
    let groups = group_per_file(&root, &["a.txt", "b.txt"]);

    let completion = iterative_merge(
        &groups,
        &mut |block, _, _| take_b(block.kind),
        &mut |_| {},
        &mut || true,
    )
    .unwrap();
    let content = completion.final_content.unwrap();
    assert!(content.ends_with('\n'));
    assert_eq!(content, "beta\nshared\n");

    let _ = fs::remove_dir_all(&root);
}
