//! Base Model tests (§4.B): the immutable snapshot loaded from one
//! `walk()`, plus the pushed/unpushed classification against a tracking
//! branch.

use crate::base_model::{BaseColumn, BaseModel};
use crate::repo::Repository;
use git_executor::git_command_executor::GitCommandExecutor;
use pretty_assertions::assert_eq;
use std::path::Path;
use std::process::Command;
use test_log::test;
use test_utils::fixtures::linear_history;

fn repo_for(path: &Path) -> Repository {
  Repository::new(GitCommandExecutor::new(), path.to_string_lossy().to_string())
}

#[test]
fn loads_linear_history_newest_first() {
  let history = linear_history(3);
  let repo = repo_for(history.repo.path());
  let base = BaseModel::load(&repo, "master").unwrap();

  assert_eq!(base.row_count(), 3);
  assert_eq!(base.data_text(0, BaseColumn::Message).unwrap().trim(), "commit 2");
  assert_eq!(base.data_text(2, BaseColumn::Message).unwrap().trim(), "commit 0");
  assert_eq!(base.arena().get(base.row(0).unwrap()).hexsha, history.hexshas[2]);
  assert_eq!(base.arena().get(base.row(2).unwrap()).hexsha, history.hexshas[0]);
}

#[test]
fn row_of_inverts_row() {
  let history = linear_history(3);
  let repo = repo_for(history.repo.path());
  let base = BaseModel::load(&repo, "master").unwrap();
  for row in 0..base.row_count() {
    let id = base.row(row).unwrap();
    assert_eq!(base.row_of(id), Some(row));
  }
}

#[test]
fn data_time_reports_author_and_committer_dates() {
  let history = linear_history(1);
  let repo = repo_for(history.repo.path());
  let base = BaseModel::load(&repo, "master").unwrap();
  let authored = base.data_time(0, BaseColumn::AuthoredDate).unwrap();
  let committed = base.data_time(0, BaseColumn::CommittedDate).unwrap();
  assert!(authored.epoch > 0);
  assert!(committed.epoch > 0);
  assert!(authored.tz.starts_with('+') || authored.tz.starts_with('-'));
}

#[test]
fn unpushed_classification_without_a_tracking_branch_is_everything() {
  let history = linear_history(3);
  let repo = repo_for(history.repo.path());
  let base = BaseModel::load(&repo, "master").unwrap();
  for row in 0..3 {
    assert!(base.is_unpushed(base.row(row).unwrap()));
  }
}

#[test]
fn unpushed_classification_stops_at_the_tracking_tip() {
  let history = linear_history(3);
  let path = history.repo.path();
  // commit 1 (hexshas[1]) becomes the tracking branch's tip: only commit 2
  // (row 0), the one commit past it, should be unpushed.
  Command::new("git").args(["update-ref", "refs/remotes/origin/master", &history.hexshas[1]]).current_dir(path).output().unwrap();
  Command::new("git").args(["config", "branch.master.remote", "origin"]).current_dir(path).output().unwrap();
  Command::new("git").args(["config", "branch.master.merge", "refs/heads/master"]).current_dir(path).output().unwrap();

  let repo = repo_for(path);
  let base = BaseModel::load(&repo, "master").unwrap();
  assert!(base.is_unpushed(base.row(0).unwrap()));
  assert!(!base.is_unpushed(base.row(1).unwrap()));
  assert!(!base.is_unpushed(base.row(2).unwrap()));
}

#[test]
fn fake_model_has_no_rows_and_reports_its_name() {
  let base = BaseModel::fake("scratch");
  assert!(base.is_fake());
  assert_eq!(base.row_count(), 0);
  assert_eq!(base.branch_name(), "scratch");
}
