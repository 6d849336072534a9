//! Replay Engine tests (§4.E, §8): the six literal scenarios from the spec,
//! plus the round-trip and atomicity properties they're drawn from.

use crate::base_model::BaseModel;
use crate::error::ReplayError;
use crate::model::conflict::Resolution;
use crate::model::{Column, EditValue, EditableModel};
use crate::replay::{ReplayOptions, run_replay_blocking};
use crate::repo::Repository;
use git_executor::git_command_executor::GitCommandExecutor;
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::path::Path;
use test_log::test;
use test_utils::fixtures::{advance_branch_externally, linear_history};

fn repo_for(path: &Path) -> Repository {
  Repository::new(GitCommandExecutor::new(), path.to_string_lossy().to_string())
}

fn model_over(path: &Path) -> EditableModel {
  let base = BaseModel::load(&repo_for(path), "master").unwrap();
  EditableModel::from_base(base)
}

/// *Round trip.* Load, edit nothing, write: the branch's tip hexsha must be
/// unchanged.
#[test]
fn no_op_write_is_a_true_round_trip() {
  let history = linear_history(4);
  let repo = repo_for(history.repo.path());
  let model = model_over(history.repo.path());

  let outcome = run_replay_blocking(&repo, model, &ReplayOptions::default());
  let summary = outcome.result.unwrap();
  assert_eq!(summary.final_sha, *history.hexshas.last().unwrap());
  assert_eq!(repo.rev_parse("master").unwrap(), *history.hexshas.last().unwrap());
}

/// Scenario 1: *Rename only.*
#[test]
fn scenario_rename_only_renames_the_branch_in_place() {
  let history = linear_history(1);
  let repo = repo_for(history.repo.path());
  let mut model = model_over(history.repo.path());
  model.start_history_event();
  model.set_new_branch_name(&repo, Some("trunk".to_string())).unwrap();

  let outcome = run_replay_blocking(&repo, model, &ReplayOptions::default());
  let summary = outcome.result.unwrap();

  assert_eq!(summary.branch_name, "trunk");
  assert_eq!(summary.final_sha, history.hexshas[0]);
  assert!(repo.branch_exists("trunk"));
  assert!(!repo.branch_exists("master"));
  assert_eq!(repo.rev_parse("trunk").unwrap(), history.hexshas[0]);
}

/// Scenario 2: *Message edit.* Editing one interior commit's message
/// rewrites it and everything above it (newer); older rows are untouched.
#[test]
fn scenario_message_edit_rewrites_only_the_affected_and_newer_rows() {
  let history = linear_history(5);
  let repo = repo_for(history.repo.path());
  let mut model = model_over(history.repo.path());

  // row 2 = "commit 2" (newest-first: row0=commit4 .. row4=commit0).
  model.start_history_event();
  model.set_data(2, Column::Message, EditValue::Text("see".to_string())).unwrap();

  let outcome = run_replay_blocking(&repo, model, &ReplayOptions::default());
  let summary = outcome.result.unwrap();
  let new_model = outcome.model;

  // Rows 3-4 (commit 1, commit 0), older than the edit, keep their hexshas.
  assert_eq!(new_model.data(4, Column::Hexsha).unwrap().as_text(), history.hexshas[0]);
  assert_eq!(new_model.data(3, Column::Hexsha).unwrap().as_text(), history.hexshas[1]);
  // Rows 0-2 were rewritten: new hexshas, row 2's message updated.
  assert_ne!(new_model.data(2, Column::Hexsha).unwrap().as_text(), history.hexshas[2]);
  assert_ne!(new_model.data(0, Column::Hexsha).unwrap().as_text(), history.hexshas[4]);
  assert_eq!(new_model.data(2, Column::Message).unwrap().as_text(), "see");
  assert_eq!(new_model.data(0, Column::Hexsha).unwrap().as_text(), summary.final_sha);
}

/// Scenario 3: *Timestamp merge.* `merge_mode` on, set a row's committed
/// date; both author and committer stamps land on the new instant.
#[test]
fn scenario_timestamp_merge_applies_to_both_stamps_after_write() {
  let history = linear_history(5);
  let repo = repo_for(history.repo.path());
  let mut model = model_over(history.repo.path());
  model.set_merge_mode(true);

  model.start_history_event();
  model.set_data(3, Column::CommittedDate, EditValue::Time(1331465000, "+0100".to_string())).unwrap();

  let outcome = run_replay_blocking(&repo, model, &ReplayOptions { force_committed_date: true, dont_populate: false });
  let summary = outcome.result.unwrap();
  let new_model = outcome.model;
  let new_hexsha = new_model.data(3, Column::Hexsha).unwrap().as_text().to_string();
  let data = repo.commit(&new_hexsha).unwrap();

  assert_eq!(data.authored_date, 1331465000);
  assert_eq!(data.author_tz, "+0100");
  assert_eq!(data.committed_date, 1331465000);
  assert_eq!(data.committer_tz, "+0100");
  assert_eq!(new_model.base().branch_name(), "master");
  let _ = summary;
}

/// Scenario 4 / 5: *Delete middle commit, then resolve the conflict it
/// causes.* Deleting a commit whose file a later commit also touches
/// produces `MergeConflict`; supplying an `AddCustom` resolution and
/// replaying again succeeds.
#[test]
fn scenario_delete_middle_commit_conflicts_then_resolves() {
  let history_repo = test_utils::git_test_utils::TestRepo::new();
  let c0 = history_repo.create_commit("base", "shared.txt", "base\n");
  let c1 = history_repo.create_commit("touch shared", "shared.txt", "touched\n");
  let c2 = history_repo.create_commit("touch shared again", "shared.txt", "touched again\n");
  let _ = c0;

  let repo = repo_for(history_repo.path());
  let mut model = model_over(history_repo.path());
  // rows: 0 = c2 (newest), 1 = c1, 2 = c0.
  model.start_history_event();
  model.remove_rows(1, 1).unwrap();

  let outcome = run_replay_blocking(&repo, model, &ReplayOptions::default());
  let err = outcome.result.unwrap_err();
  let conflicting_hexsha = match &err {
    ReplayError::MergeConflict { conflicting_hexsha, unmerged_files } => {
      assert!(!unmerged_files.is_empty());
      assert!(unmerged_files.contains_key("shared.txt"));
      conflicting_hexsha.clone()
    }
    other => panic!("expected MergeConflict, got {other:?}"),
  };
  assert_eq!(conflicting_hexsha, c2);

  // Original branch must be untouched: no ref besides the scratch ref is
  // ever modified until the final atomic rename.
  assert_eq!(repo.rev_parse("master").unwrap(), c2);
  assert!(!repo.branch_exists("gitbuster_rebase"));

  let mut model = outcome.model;
  assert_eq!(model.conflicting_commit(), Some(model.row_commit(0).unwrap()));

  let mut resolutions = HashMap::new();
  resolutions.insert("shared.txt".to_string(), Resolution::AddCustom(b"merged\n".to_vec()));
  model.set_conflict_solutions(resolutions);

  let outcome = run_replay_blocking(&repo, model, &ReplayOptions::default());
  let summary = outcome.result.unwrap();
  let data = repo.commit(&summary.final_sha).unwrap();
  let blob = repo.tree_blob(&data.tree, "shared.txt").unwrap();
  assert_eq!(blob.as_slice(), b"merged\n");
}

/// Scenario 6: *Stale model.* The branch moves between load and `write()`:
/// the applicability pre-check fails with `RepoMoved` and nothing is
/// touched.
#[test]
fn scenario_stale_model_fails_with_repo_moved() {
  let history = linear_history(3);
  let repo = repo_for(history.repo.path());
  let mut model = model_over(history.repo.path());
  model.start_history_event();
  model.set_data(0, Column::Message, EditValue::Text("late edit".to_string())).unwrap();

  let advanced = advance_branch_externally(&history.repo, "master", "file-3.txt", "content 3\n");

  let outcome = run_replay_blocking(&repo, model, &ReplayOptions::default());
  match outcome.result.unwrap_err() {
    ReplayError::RepoMoved { expected, actual } => {
      assert_eq!(expected, history.hexshas[2]);
      assert_eq!(actual, advanced);
    }
    other => panic!("expected RepoMoved, got {other:?}"),
  }
  assert_eq!(repo.rev_parse("master").unwrap(), advanced);
}

/// Edits to fields that never touch tree content (message/author/date)
/// leave the tree object at each rewritten row identical to the original.
#[test]
fn non_content_edits_preserve_tree_identity_at_each_row() {
  let history = linear_history(3);
  let repo = repo_for(history.repo.path());
  let mut model = model_over(history.repo.path());
  let original_trees: Vec<String> = (0..model.row_count()).map(|r| model.data(r, Column::Tree).unwrap().as_text().to_string()).collect();

  model.start_history_event();
  model.set_data(1, Column::Message, EditValue::Text("renamed message".to_string())).unwrap();
  model.set_data(2, Column::AuthorName, EditValue::Text("Someone Else".to_string())).unwrap();

  let outcome = run_replay_blocking(&repo, model, &ReplayOptions::default());
  let new_model = outcome.result.map(|_| outcome.model);
  let new_model = new_model.unwrap();

  for row in 0..new_model.row_count() {
    assert_eq!(new_model.data(row, Column::Tree).unwrap().as_text(), original_trees[row]);
  }
}
