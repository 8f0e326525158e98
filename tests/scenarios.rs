//! End-to-end scenarios exercising the dispatcher, VFS, diff engine, and PR
//! check gate together against a real (in-memory) database and filesystem
//! blob store, rather than against individual module internals.

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use stageflow::blobstore::filesystem::FilesystemBlobStore;
use stageflow::blobstore::BlobStore;
use stageflow::canonical::sha256_hex;
use stageflow::{checks, db, dispatch, repo_ops};

async fn test_db() -> DatabaseConnection {
    db::connect("sqlite::memory:").await.expect("in-memory db")
}

fn test_store() -> Arc<dyn BlobStore> {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.keep().expect("detach tempdir");
    Arc::new(FilesystemBlobStore::new(path))
}

#[tokio::test]
async fn scenario_1_invocation_deduplication() {
    let db = test_db().await;
    let args = serde_json::json!({});

    let first = dispatch::create_call(&db, None, "r".into(), "C".into(), "w.py".into(), "main".into(), &args, None, None, true)
        .await
        .unwrap();
    assert_eq!(first.id, sha256_hex(b"|C|w.py|main|{}"));

    let second = dispatch::create_call(&db, None, "r".into(), "C".into(), "w.py".into(), "main".into(), &args, None, None, true)
        .await
        .unwrap();
    assert_eq!(first.id, second.id);

    let all = dispatch::list_calls(&db, None, 10).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn scenario_2_parent_chain_and_vfs_walk() {
    let db = test_db().await;
    let store = test_store();
    let repo = repo_ops::create_repository(&db, "r".into(), None).await.unwrap();

    let tree_hash = repo_ops::update_file(&db, store.as_ref(), repo.id, None, "w.py", b"print(1)")
        .await
        .unwrap();
    let commit = repo_ops::create_commit(&db, repo.id, tree_hash.clone(), "init".into(), "a".into(), "a@x.com".into(), None)
        .await
        .unwrap();
    repo_ops::create_or_update_ref(&db, repo.id, "refs/heads/main", &commit.hash).await.unwrap();

    let args = serde_json::json!({});
    let root = dispatch::create_call(&db, None, "r".into(), commit.hash.clone(), "w.py".into(), "main".into(), &args, None, None, true)
        .await
        .unwrap();
    assert_eq!(root.id, sha256_hex(format!("|{}|w.py|main|{{}}", commit.hash).as_bytes()));

    let child = dispatch::create_call(
        &db,
        Some(root.id.clone()),
        "r".into(),
        commit.hash.clone(),
        "w.py".into(),
        "sub".into(),
        &args,
        None,
        None,
        true,
    )
    .await
    .unwrap();
    let expected_child_id = sha256_hex(format!("{}|{}|w.py|sub|{{}}", root.id, commit.hash).as_bytes());
    assert_eq!(child.id, expected_child_id);

    // Navigate the VFS: commit root -> w.py (blob) -> main (root stage run) -> sub.
    let node = stageflow::vfs::resolve_stage_path(&db, repo.id, &commit.hash, &tree_hash, &["w.py", "main", "sub"])
        .await
        .unwrap()
        .expect("path resolves");
    match node {
        stageflow::vfs::Node::StageRun { id, .. } => assert_eq!(id, child.id),
        other => panic!("expected StageRun node, got {other:?}"),
    }
}

#[tokio::test]
async fn scenario_3_directory_diff_order() {
    let db = test_db().await;
    let store = test_store();
    let repo = repo_ops::create_repository(&db, "r".into(), None).await.unwrap();

    // "subdir" is synthesised in this very first write (no base tree yet);
    // every later write to a path under "subdir" recurses into an existing
    // directory rather than conjuring a new one.
    let tree_a = repo_ops::update_file(&db, store.as_ref(), repo.id, None, "subdir/b.txt", b"b1")
        .await
        .unwrap();
    let tree_a = repo_ops::update_file(&db, store.as_ref(), repo.id, Some(&tree_a), "a.txt", b"a")
        .await
        .unwrap();

    let tree_b = repo_ops::update_file(&db, store.as_ref(), repo.id, Some(&tree_a), "subdir/b.txt", b"b2")
        .await
        .unwrap();
    let tree_b = repo_ops::update_file(&db, store.as_ref(), repo.id, Some(&tree_b), "subdir/c.txt", b"c")
        .await
        .unwrap();

    let events = stageflow::diff::diff_trees(&db, repo.id, Some(&tree_a), &tree_b).await.unwrap();
    let paths: Vec<&str> = events.iter().map(|e| e.path()).collect();
    assert_eq!(paths, vec!["subdir/b.txt", "subdir/c.txt"]);
    assert!(matches!(events[0], stageflow::diff::Event::Modified { .. }));
    assert!(matches!(events[1], stageflow::diff::Event::Added { .. }));
}

#[tokio::test]
async fn scenario_3b_new_directory_segment_is_rejected() {
    let db = test_db().await;
    let store = test_store();
    let repo = repo_ops::create_repository(&db, "r".into(), None).await.unwrap();

    let tree = repo_ops::update_file(&db, store.as_ref(), repo.id, None, "a.txt", b"a")
        .await
        .unwrap();

    // "subdir" has no entry at all in `tree`, and `tree` is a real, existing
    // base tree (not the `None` first-commit case), so introducing it here
    // must fail rather than silently synthesise an empty directory.
    let err = repo_ops::update_file(&db, store.as_ref(), repo.id, Some(&tree), "subdir/b.txt", b"b1")
        .await
        .unwrap_err();
    assert!(matches!(err, stageflow::errors::EngineError::PathNotFound(ref p) if p == "subdir/b.txt"));
}

#[tokio::test]
async fn scenario_4_file_edit_synthesises_parent_trees() {
    let db = test_db().await;
    let store = test_store();
    let repo = repo_ops::create_repository(&db, "r".into(), None).await.unwrap();

    // "src/utils" is synthesised in this very first write (no base tree
    // yet); the following writes only ever add a leaf to an already-existing
    // directory, so they succeed even once missing intermediate segments are
    // rejected.
    let mut tree = repo_ops::update_file(&db, store.as_ref(), repo.id, None, "src/utils/helper.py", b"def f(): pass")
        .await
        .unwrap();
    tree = repo_ops::update_file(&db, store.as_ref(), repo.id, Some(&tree), "README.md", b"hello")
        .await
        .unwrap();
    tree = repo_ops::update_file(&db, store.as_ref(), repo.id, Some(&tree), "src/main.py", b"print(1)")
        .await
        .unwrap();

    let readme_hash = repo_ops::get_blob_hash_from_path(&db, repo.id, &tree, "README.md").await.unwrap().unwrap();
    let main_hash = repo_ops::get_blob_hash_from_path(&db, repo.id, &tree, "src/main.py").await.unwrap().unwrap();
    let root_before = repo_ops::get_tree(&db, repo.id, &tree).await.unwrap().unwrap();
    let src_before = repo_ops::get_tree(&db, repo.id, &root_before.entry("src").unwrap().target_hash).await.unwrap().unwrap();
    let utils_before = src_before.entry("utils").unwrap().target_hash.clone();

    let new_tree = repo_ops::update_file(&db, store.as_ref(), repo.id, Some(&tree), "src/utils/helper.py", b"def f(): return 1")
        .await
        .unwrap();
    assert_ne!(new_tree, tree);

    let root_after = repo_ops::get_tree(&db, repo.id, &new_tree).await.unwrap().unwrap();
    assert_ne!(root_after.hash, root_before.hash);
    let src_after = repo_ops::get_tree(&db, repo.id, &root_after.entry("src").unwrap().target_hash).await.unwrap().unwrap();
    assert_ne!(src_after.hash, src_before.hash);
    assert_ne!(src_after.entry("utils").unwrap().target_hash, utils_before);

    // Untouched leaves keep their hash.
    assert_eq!(
        repo_ops::get_blob_hash_from_path(&db, repo.id, &new_tree, "README.md").await.unwrap().unwrap(),
        readme_hash
    );
    assert_eq!(
        repo_ops::get_blob_hash_from_path(&db, repo.id, &new_tree, "src/main.py").await.unwrap().unwrap(),
        main_hash
    );
}

#[tokio::test]
async fn scenario_5_merge_gate() {
    let db = test_db().await;
    let store = test_store();
    let repo = repo_ops::create_repository(&db, "r".into(), None).await.unwrap();

    let checks_yaml = b"version: \"1\"\nchecks:\n  - name: tests\n    workflow_file: w.py\n    stage_name: run_tests\n  - name: lint\n    workflow_file: w.py\n    stage_name: run_lint\n  - name: style\n    workflow_file: w.py\n    stage_name: run_style\n    required: false\n";
    let tree = repo_ops::update_file(&db, store.as_ref(), repo.id, None, ".pr-checks.yml", checks_yaml)
        .await
        .unwrap();
    let commit = repo_ops::create_commit(&db, repo.id, tree, "init".into(), "a".into(), "a@x.com".into(), None)
        .await
        .unwrap();
    repo_ops::create_or_update_ref(&db, repo.id, "refs/heads/main", &commit.hash).await.unwrap();
    repo_ops::create_branch(&db, repo.id, "feature", &commit.hash).await.unwrap();

    let (pr, runs) = checks::create_pull_request(&db, &store, repo.id, "main".into(), "feature".into(), "t".into(), None, "a".into())
        .await
        .unwrap();
    assert_eq!(runs.len(), 3);

    for run in &runs {
        assert_eq!(run.trigger_event.as_deref(), Some(pr.trigger_event().as_str()));
    }
    let style_run = runs.iter().find(|r| r.stage_name == "run_style").unwrap();
    assert!(!style_run.required);
    let required_runs: Vec<_> = runs.iter().filter(|r| r.stage_name != "run_style").collect();
    assert_eq!(required_runs.len(), 2);
    assert!(required_runs.iter().all(|r| r.required));

    // All three running, but only the two required checks count towards the
    // block: the optional `style` check never shows up in the reason.
    let (mergeable, reason) = checks::can_merge_pr(&db, &pr).await.unwrap();
    assert!(!mergeable);
    assert_eq!(reason.as_deref(), Some("2 check(s) still running"));

    for run in &required_runs {
        dispatch::start_call(&db, &run.id, "worker-1").await.unwrap();
        dispatch::finish_call(&db, &run.id, dispatch::FinishOutcome::Completed(serde_json::Value::Null))
            .await
            .unwrap();
    }

    // Required checks are done; the optional `style` check is still pending
    // and must not block the merge.
    let (mergeable, reason) = checks::can_merge_pr(&db, &pr).await.unwrap();
    assert!(mergeable);
    assert!(reason.is_none());
}

#[tokio::test]
async fn scenario_7_vfs_diff_surfaces_stage_run_children() {
    let db = test_db().await;
    let store = test_store();
    let repo = repo_ops::create_repository(&db, "r".into(), None).await.unwrap();

    let tree = repo_ops::update_file(&db, store.as_ref(), repo.id, None, "w.py", b"print(1)")
        .await
        .unwrap();
    let commit_a = repo_ops::create_commit(&db, repo.id, tree.clone(), "init".into(), "a".into(), "a@x.com".into(), None)
        .await
        .unwrap();
    repo_ops::create_or_update_ref(&db, repo.id, "refs/heads/main", &commit_a.hash).await.unwrap();

    let args = serde_json::json!({});
    dispatch::create_call(&db, None, "r".into(), commit_a.hash.clone(), "w.py".into(), "main".into(), &args, None, None, true)
        .await
        .unwrap();

    // Same tree, new commit: the blob is unchanged, but it was only ever
    // bound to a StageRun under commit_a's commit hash (stage runs are
    // scoped by exact commit_hash), so the subtree looks removed from B's
    // perspective even though the base blob hash never moved.
    let commit_b = repo_ops::create_commit(&db, repo.id, tree.clone(), "noop".into(), "a".into(), "a@x.com".into(), Some(commit_a.hash.clone()))
        .await
        .unwrap();

    let events = stageflow::diff::diff_commits(&db, repo.id, Some(&commit_a.hash), Some(&tree), &commit_b.hash, &tree)
        .await
        .unwrap();

    assert!(
        events
            .iter()
            .any(|e| matches!(e, stageflow::diff::Event::Removed { path, kind, .. } if path == "w.py/main" && *kind == "StageRun")),
        "expected a removed StageRun event for w.py/main, got {events:?}"
    );
    // The base blob itself did not change.
    assert!(!events.iter().any(|e| e.path() == "w.py" && matches!(e, stageflow::diff::Event::Modified { .. })));

    // Diffing a commit against itself surfaces the StageRun as both present
    // (no event) rather than spuriously added/removed.
    let events_self = stageflow::diff::diff_commits(&db, repo.id, Some(&commit_a.hash), Some(&tree), &commit_a.hash, &tree)
        .await
        .unwrap();
    assert!(events_self.is_empty());
}

#[tokio::test]
async fn scenario_6_log_tailing_window() {
    let db = test_db().await;
    let repo = repo_ops::create_repository(&db, "r".into(), None).await.unwrap();
    let args = serde_json::json!({});
    let run = dispatch::create_call(&db, None, repo.name.clone(), "C".into(), "w.py".into(), "main".into(), &args, None, None, true)
        .await
        .unwrap();

    let lines: Vec<stageflow::model::StageLogLine> = (0..50)
        .map(|i| stageflow::model::StageLogLine {
            stage_run_id: run.id.clone(),
            log_line_index: i,
            timestamp: chrono::Utc::now(),
            log_contents: format!("line {i}"),
        })
        .collect();
    dispatch::append_logs(&db, &run.id, &lines).await.unwrap();

    let (page, has_more) = dispatch::get_logs(&db, &run.id, 5, 10).await.unwrap();
    let indices: Vec<i64> = page.iter().map(|l| l.log_line_index).collect();
    assert_eq!(indices, (6..=15).collect::<Vec<i64>>());
    assert!(has_more);
}
