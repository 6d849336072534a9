//! Editable Model tests (§4.C, §8): overlay reads/writes, undo/redo, the
//! rewrite frontier's antichain property, and branch-rename bookkeeping.

use crate::base_model::BaseModel;
use crate::model::{Column, EditValue, EditableModel};
use crate::repo::Repository;
use git_executor::git_command_executor::GitCommandExecutor;
use pretty_assertions::assert_eq;
use std::path::Path;
use test_log::test;
use test_utils::fixtures::linear_history;

fn repo_for(path: &Path) -> Repository {
  Repository::new(GitCommandExecutor::new(), path.to_string_lossy().to_string())
}

fn model_over(n: usize) -> (test_utils::fixtures::LinearHistory, EditableModel) {
  let history = linear_history(n);
  let base = BaseModel::load(&repo_for(history.repo.path()), "master").unwrap();
  let model = EditableModel::from_base(base);
  (history, model)
}

#[test]
fn set_data_round_trips_and_undo_restores_the_original() {
  let (_history, mut model) = model_over(3);
  let original = model.data(1, Column::Message).unwrap().as_text().to_string();

  model.start_history_event();
  model.set_data(1, Column::Message, EditValue::Text("see".to_string())).unwrap();
  assert_eq!(model.data(1, Column::Message).unwrap().as_text(), "see");
  assert!(model.can_undo());

  model.undo();
  assert_eq!(model.data(1, Column::Message).unwrap().as_text(), original);
  assert!(!model.can_undo());
  assert!(model.can_redo());

  model.redo();
  assert_eq!(model.data(1, Column::Message).unwrap().as_text(), "see");
}

#[test]
fn starting_a_new_event_after_undo_drops_the_redo_tail() {
  let (_history, mut model) = model_over(2);
  model.start_history_event();
  model.set_data(0, Column::Message, EditValue::Text("first edit".to_string())).unwrap();
  model.undo();
  assert!(model.can_redo());

  model.start_history_event();
  model.set_data(0, Column::Message, EditValue::Text("second edit".to_string())).unwrap();
  assert!(!model.can_redo());
}

#[test]
fn setting_a_cell_to_its_current_value_is_a_no_op() {
  let (_history, mut model) = model_over(1);
  let original = model.data(0, Column::Message).unwrap().as_text().to_string();
  model.start_history_event();
  model.set_data(0, Column::Message, EditValue::Text(original)).unwrap();
  assert!(!model.can_undo());
}

#[test]
fn insert_rows_then_undo_restores_the_original_row_sequence() {
  let (_history, mut model) = model_over(2);
  let before: Vec<_> = (0..model.row_count()).map(|r| model.row_commit(r)).collect();

  model.start_history_event();
  model.insert_rows(1, 2).unwrap();
  assert_eq!(model.row_count(), 4);
  assert_eq!(model.get_modified_count(), 2);

  model.undo();
  let after: Vec<_> = (0..model.row_count()).map(|r| model.row_commit(r)).collect();
  assert_eq!(before, after);
}

#[test]
fn remove_rows_marks_deleted_without_shrinking_commits_and_undo_clears_it() {
  let (_history, mut model) = model_over(3);
  let commit = model.row_commit(1).unwrap();
  let row_count_before = model.row_count();

  model.start_history_event();
  model.remove_rows(1, 1).unwrap();
  assert!(model.is_deleted(commit));
  assert_eq!(model.row_count(), row_count_before);

  model.undo();
  assert!(!model.is_deleted(commit));
}

#[test]
fn merge_mode_propagates_committed_date_to_authored_date() {
  let (_history, mut model) = model_over(2);
  model.set_merge_mode(true);

  model.start_history_event();
  model.set_data(0, Column::CommittedDate, EditValue::Time(1331465000, "+0100".to_string())).unwrap();

  let authored = model.data(0, Column::AuthoredDate).unwrap();
  let time = authored.as_time().unwrap();
  assert_eq!(time.epoch, 1331465000);
  assert_eq!(time.tz, "+0100");

  // Merge propagation does not add a second history action: one undo clears both.
  model.undo();
  let committed = model.data(0, Column::CommittedDate).unwrap().as_time().unwrap().epoch;
  assert_ne!(committed, 1331465000);
  assert_ne!(model.data(0, Column::AuthoredDate).unwrap().as_time().unwrap().epoch, 1331465000);
}

#[test]
fn merge_mode_propagates_author_name_and_email_pairs() {
  let (_history, mut model) = model_over(1);
  model.set_merge_mode(true);
  model.start_history_event();
  model.set_data(0, Column::AuthorName, EditValue::Text("New Name".to_string())).unwrap();
  assert_eq!(model.data(0, Column::CommitterName).unwrap().as_text(), "New Name");
}

#[test]
fn without_merge_mode_fields_stay_independent() {
  let (_history, mut model) = model_over(1);
  let original_committer = model.data(0, Column::CommitterName).unwrap().as_text().to_string();
  model.start_history_event();
  model.set_data(0, Column::AuthorName, EditValue::Text("New Name".to_string())).unwrap();
  assert_eq!(model.data(0, Column::CommitterName).unwrap().as_text(), original_committer);
}

#[test]
fn time_edit_by_epoch_preserves_the_original_timezone() {
  let (_history, mut model) = model_over(1);
  let original_tz = model.data(0, Column::AuthoredDate).unwrap().as_time().unwrap().tz.clone();
  model.start_history_event();
  model.set_data(0, Column::AuthoredDate, EditValue::Epoch(42)).unwrap();
  let updated = model.data(0, Column::AuthoredDate).unwrap();
  let time = updated.as_time().unwrap();
  assert_eq!(time.epoch, 42);
  assert_eq!(time.tz, original_tz);
}

#[test]
fn frontier_keeps_only_the_most_ancestral_modified_commit_on_a_linear_chain() {
  let (_history, mut model) = model_over(5);
  model.start_history_event();
  // row 1 = "commit 3", row 3 = "commit 1" (newest-first); commit 1 is an
  // ancestor of commit 3, so only commit 1's row should survive pruning.
  model.set_data(1, Column::Message, EditValue::Text("edited-3".to_string())).unwrap();
  model.set_data(3, Column::Message, EditValue::Text("edited-1".to_string())).unwrap();

  let frontier = model.get_start_write_from();
  assert_eq!(frontier, vec![model.row_commit(3).unwrap()]);
}

#[test]
fn frontier_is_an_antichain_with_two_sibling_edits() {
  // `left` and `right` both descend from `base` but neither is an ancestor
  // of the other, so editing both must keep both in the frontier.
  let merge = test_utils::fixtures::merge_history();
  let base = BaseModel::load(&repo_for(merge.repo.path()), "master").unwrap();
  let mut model = EditableModel::from_base(base);

  let rows: Vec<_> = (0..model.row_count())
    .map(|r| (r, model.data(r, Column::Hexsha).unwrap().as_text().to_string()))
    .collect();
  let left_row = rows.iter().find(|(_, sha)| *sha == merge.left).unwrap().0;
  let right_row = rows.iter().find(|(_, sha)| *sha == merge.right).unwrap().0;

  model.start_history_event();
  model.set_data(left_row, Column::Message, EditValue::Text("edited-left".to_string())).unwrap();
  model.set_data(right_row, Column::Message, EditValue::Text("edited-right".to_string())).unwrap();

  let frontier = model.get_start_write_from();
  assert_eq!(frontier.len(), 2);
  for &p in &frontier {
    for &q in &frontier {
      if p != q {
        assert!(!model.all_parents(p).contains(&q));
      }
    }
  }
}

#[test]
fn frontier_and_rewrite_count_are_empty_with_no_edits() {
  let (_history, model) = model_over(3);
  assert!(model.get_start_write_from().is_empty());
  assert_eq!(model.get_to_rewrite_count(), 0);
}

#[test]
fn dummy_commit_is_always_counted_as_modified() {
  let (_history, mut model) = model_over(1);
  model.start_history_event();
  model.insert_rows(0, 1).unwrap();
  assert_eq!(model.get_modified_count(), 1);
  assert!(model.commit_is_modified(0));
}

#[test]
fn set_new_branch_name_validates_and_clears_on_the_current_name() {
  let history = linear_history(1);
  let repo = repo_for(history.repo.path());
  let base = BaseModel::load(&repo, "master").unwrap();
  let mut model = EditableModel::from_base(base);

  model.start_history_event();
  assert!(model.set_new_branch_name(&repo, Some("has space".to_string())).is_err());
  assert!(model.new_branch_name().is_none());

  model.set_new_branch_name(&repo, Some("trunk".to_string())).unwrap();
  assert_eq!(model.new_branch_name(), Some("trunk"));

  model.set_new_branch_name(&repo, Some("master".to_string())).unwrap();
  assert_eq!(model.new_branch_name(), None);
}

#[test]
fn invalid_row_index_is_reported_not_panicked() {
  let (_history, model) = model_over(1);
  assert!(model.data(5, Column::Message).is_err());
}
