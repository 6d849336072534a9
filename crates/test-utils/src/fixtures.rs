//! Repository-fixture builder shared by every component's test module.
//!
//! Mirrors the shape of `git_test_utils::TestRepo`, but adds the handful of
//! topologies the history-rewriting engine's tests need repeatedly: a linear
//! chain of N commits, a three-way merge, and "advance the branch externally"
//! (simulating another process moving the tip between model load and write).

use crate::git_test_utils::TestRepo;
use std::process::Command;

/// A linear chain of `n` commits on the repository's current branch, oldest
/// first. `hexshas[i]` is the commit introducing `file-i.txt`.
pub struct LinearHistory {
  pub repo: TestRepo,
  pub hexshas: Vec<String>,
}

/// Builds a repository with `n` commits on `master`, each adding one file
/// (`file-0.txt` .. `file-{n-1}.txt`) with a one-line body, messages `"commit
/// 0"` .. `"commit {n-1}"`.
pub fn linear_history(n: usize) -> LinearHistory {
  let repo = TestRepo::new();
  let mut hexshas = Vec::with_capacity(n);
  for i in 0..n {
    let filename = format!("file-{i}.txt");
    let sha = repo.create_commit(&format!("commit {i}"), &filename, &format!("content {i}\n"));
    hexshas.push(sha);
  }
  LinearHistory { repo, hexshas }
}

/// A repository with a single merge commit: `base` has one commit, two
/// branches (`left`, `right`) each add a distinct file, then `left` merges
/// `right`. Returns hexshas in chronological order: `[base, left_commit,
/// right_commit, merge_commit]`.
pub struct MergeHistory {
  pub repo: TestRepo,
  pub base: String,
  pub left: String,
  pub right: String,
  pub merge: String,
}

pub fn merge_history() -> MergeHistory {
  let repo = TestRepo::new();
  let base = repo.create_commit("base", "base.txt", "base\n");
  repo.create_branch("right").unwrap();

  let left = repo.create_commit("left change", "left.txt", "left\n");

  repo.checkout("right").unwrap();
  let right = repo.create_commit("right change", "right.txt", "right\n");

  repo.checkout("master").unwrap();
  let output = Command::new("git").args(["merge", "--no-ff", "-m", "merge right into left", "right"]).current_dir(repo.path()).output().unwrap();
  if !output.status.success() {
    panic!("merge failed: {}", String::from_utf8_lossy(&output.stderr));
  }
  let merge = repo.head();

  MergeHistory { repo, base, left, right, merge }
}

/// Simulates another process advancing `branch` by one commit after a model
/// has already been loaded, to exercise the replay engine's `RepoMoved`
/// applicability check.
pub fn advance_branch_externally(repo: &TestRepo, branch: &str, filename: &str, content: &str) -> String {
  repo.checkout(branch).unwrap();
  repo.create_commit("externally advanced", filename, content)
}
