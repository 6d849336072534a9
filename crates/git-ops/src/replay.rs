//! Replay Engine (§4.E): rewrites every commit from the Editable Model's
//! rewrite frontier down through its descendants, via `checkout -f` +
//! `cherry-pick -n` + `write-tree` + `commit-tree` against a real working
//! tree, then atomically swaps the rewritten history onto the branch.
//!
//! The model is moved into the worker thread rather than shared behind a
//! lock: the spec's "the edit domain must treat the model as read-only
//! during replay" protocol is easier to uphold by transferring ownership for
//! the duration of the replay and handing it back (rewritten, or annotated
//! with conflict state) once the worker finishes. See DESIGN.md.

use crate::error::{ReplayError, ReplayResult};
use crate::model::conflict::{FileConflict, GitStatus, Resolution};
use crate::model::{EditableModel, RowCommit};
use crate::repo::{CherryPickOutcome, Repository};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Knobs the caller can set before a replay (§10, ambient configuration).
#[derive(Debug, Clone)]
pub struct ReplayOptions {
  /// When set, every rewritten commit's `GIT_COMMITTER_*` trio is taken from
  /// the model rather than left for git to stamp fresh.
  pub force_committed_date: bool,
  /// Skip re-populating the Base/Editable models after a successful write
  /// (the caller will reload separately, e.g. to diff before/after).
  pub dont_populate: bool,
}

impl Default for ReplayOptions {
  fn default() -> Self {
    Self { force_committed_date: false, dont_populate: false }
  }
}

pub struct ReplaySummary {
  pub branch_name: String,
  pub final_sha: String,
}

/// The model, handed back to the caller once the worker finishes. On
/// success it has been repopulated (unless `dont_populate`); on
/// `MergeConflict` it carries the conflict state the caller resolves through
/// `set_conflict_solutions` before replaying again.
pub struct ReplayOutcome {
  pub model: EditableModel,
  pub result: ReplayResult<ReplaySummary>,
}

/// Handle to a replay running on its own thread. Progress/finished/success
/// are plain atomics rather than a channel: the edit domain polls them from
/// its own event loop instead of blocking on a receive.
pub struct ReplayHandle {
  progress: Arc<AtomicU32>,
  finished: Arc<AtomicBool>,
  success: Arc<AtomicBool>,
  outcome: Arc<Mutex<Option<ReplayOutcome>>>,
  join: Option<JoinHandle<()>>,
}

impl ReplayHandle {
  /// Current progress in `[0.0, 1.0]`, saturating rather than overflowing
  /// past 1.0 (§9: fixes the float-overflow bug in the progress reporter).
  pub fn progress(&self) -> f32 {
    f32::from_bits(self.progress.load(Ordering::Relaxed))
  }

  pub fn is_finished(&self) -> bool {
    self.finished.load(Ordering::Relaxed)
  }

  /// `None` while running; `Some(true/false)` once `is_finished()`.
  pub fn is_success(&self) -> Option<bool> {
    self.is_finished().then(|| self.success.load(Ordering::Relaxed))
  }

  /// Blocks until the worker finishes and returns its outcome. Panics if
  /// called twice.
  pub fn join(mut self) -> ReplayOutcome {
    if let Some(handle) = self.join.take() {
      let _ = handle.join();
    }
    self.outcome.lock().unwrap().take().expect("ReplayHandle::join called twice")
  }
}

/// Spawns the replay on a background thread and returns immediately.
pub fn spawn_replay(repo: Repository, model: EditableModel, options: ReplayOptions) -> ReplayHandle {
  let progress = Arc::new(AtomicU32::new(0.0f32.to_bits()));
  let finished = Arc::new(AtomicBool::new(false));
  let success = Arc::new(AtomicBool::new(false));
  let outcome: Arc<Mutex<Option<ReplayOutcome>>> = Arc::new(Mutex::new(None));

  let progress_w = progress.clone();
  let finished_w = finished.clone();
  let success_w = success.clone();
  let outcome_w = outcome.clone();

  let join = thread::spawn(move || {
    let mut model = model;
    let result = run_replay(&repo, &mut model, &options, &progress_w);
    let ok = result.is_ok();
    *outcome_w.lock().unwrap() = Some(ReplayOutcome { model, result });
    success_w.store(ok, Ordering::Relaxed);
    finished_w.store(true, Ordering::Relaxed);
  });

  ReplayHandle { progress, finished, success, outcome, join: Some(join) }
}

/// Runs a replay to completion on the calling thread. `spawn_replay` is a
/// thin wrapper around this for callers that want a background worker.
pub fn run_replay_blocking(repo: &Repository, mut model: EditableModel, options: &ReplayOptions) -> ReplayOutcome {
  let progress = AtomicU32::new(0.0f32.to_bits());
  let result = run_replay(repo, &mut model, options, &progress);
  ReplayOutcome { model, result }
}

fn run_replay(repo: &Repository, model: &mut EditableModel, options: &ReplayOptions, progress: &AtomicU32) -> ReplayResult<ReplaySummary> {
  precheck(repo, model)?;

  let frontier = model.get_start_write_from();
  let should_be_updated: HashSet<RowCommit> = {
    let mut set = model.all_children(&frontier);
    set.extend(frontier.iter().copied());
    set
  };
  let to_rewrite_count = (frontier.len() + model.all_children(&frontier).len()).max(1);

  let mut updated_refs: HashMap<RowCommit, String> = HashMap::new();
  let mut last_updated_sha: Option<String> = None;
  let mut done: HashSet<RowCommit> = HashSet::new();

  for &start in &frontier {
    if let Err(e) = ref_update(repo, model, options, start, &should_be_updated, &mut updated_refs, &mut last_updated_sha, &mut done, to_rewrite_count, progress) {
      let _ = cleanup(repo, model);
      return Err(e);
    }
  }

  let (final_sha, final_branch_name) = match finalize(repo, model, last_updated_sha) {
    Ok(result) => result,
    Err(e) => {
      let _ = cleanup(repo, model);
      return Err(e);
    }
  };
  cleanup(repo, model)?;

  if !options.dont_populate {
    repopulate(repo, model, &final_branch_name)?;
  }

  Ok(ReplaySummary { branch_name: final_branch_name, final_sha })
}

/// §4.E step 1: if the model was loaded against a real branch, the branch's
/// tip must still be the model's topmost real commit, or someone else moved
/// it between load and write.
fn precheck(repo: &Repository, model: &EditableModel) -> ReplayResult<()> {
  if model.base().is_fake() {
    return Ok(());
  }
  let Some(expected) = model.top_row_hexsha() else {
    return Ok(());
  };
  let actual = repo.rev_parse(model.base().branch_name())?;
  if actual != expected {
    return Err(ReplayError::RepoMoved { expected, actual });
  }
  Ok(())
}

/// Resolves `commit` to the hexsha it should be referenced by in a rewritten
/// parent/children list: its freshly-written sha if already rewritten,
/// recursively its nearest surviving ancestor's sha if deleted, or its own
/// original hexsha if untouched.
fn translate(model: &EditableModel, updated_refs: &HashMap<RowCommit, String>, commit: RowCommit) -> ReplayResult<String> {
  if let Some(sha) = updated_refs.get(&commit) {
    return Ok(sha.clone());
  }
  if model.is_deleted(commit) {
    return match model.primary_parent(commit) {
      Some(parent) => translate(model, updated_refs, parent),
      None => Err(ReplayError::Generic(anyhow::anyhow!("deleted root commit has no surviving ancestor to fall back to"))),
    };
  }
  match model.original_hexsha(commit) {
    Some(hexsha) => Ok(hexsha),
    None => Err(ReplayError::Generic(anyhow::anyhow!("inserted commit referenced before it was replayed"))),
  }
}

#[allow(clippy::too_many_arguments)]
fn ref_update(
  repo: &Repository,
  model: &mut EditableModel,
  options: &ReplayOptions,
  commit: RowCommit,
  should_be_updated: &HashSet<RowCommit>,
  updated_refs: &mut HashMap<RowCommit, String>,
  last_updated_sha: &mut Option<String>,
  done: &mut HashSet<RowCommit>,
  to_rewrite_count: usize,
  progress: &AtomicU32,
) -> ReplayResult<()> {
  if done.contains(&commit) {
    return Ok(());
  }

  if model.is_deleted(commit) {
    if last_updated_sha.is_none() && model.row_of(commit) == Some(0) {
      if let Some(parent) = model.primary_parent(commit) {
        *last_updated_sha = Some(translate(model, updated_refs, parent)?);
      }
    }
    done.insert(commit);
    for child in model.model_children(commit) {
      if should_be_updated.contains(&child) {
        ref_update(repo, model, options, child, should_be_updated, updated_refs, last_updated_sha, done, to_rewrite_count, progress)?;
      }
    }
    return Ok(());
  }

  let parents = model.parents_of(commit);
  if parents.len() > 1 {
    let ready = parents.iter().all(|p| !should_be_updated.contains(p) || updated_refs.contains_key(p) || model.is_deleted(*p));
    if !ready {
      // A sibling parent hasn't been rewritten yet; whichever parent
      // finishes last will re-enter this function and find `ready == true`.
      return Ok(());
    }
  }

  let new_sha = match commit {
    RowCommit::Real(_) => replay_real_commit(repo, model, options, commit, &parents, updated_refs)?,
    RowCommit::Dummy(_) => replay_dummy_commit(repo, model, options, commit, updated_refs)?,
  };

  updated_refs.insert(commit, new_sha.clone());
  *last_updated_sha = Some(new_sha);
  done.insert(commit);
  bump_progress(progress, to_rewrite_count);

  for child in model.model_children(commit) {
    if should_be_updated.contains(&child) {
      ref_update(repo, model, options, child, should_be_updated, updated_refs, last_updated_sha, done, to_rewrite_count, progress)?;
    }
  }
  Ok(())
}

fn replay_real_commit(
  repo: &Repository,
  model: &mut EditableModel,
  options: &ReplayOptions,
  commit: RowCommit,
  parents: &[RowCommit],
  updated_refs: &HashMap<RowCommit, String>,
) -> ReplayResult<String> {
  let primary = parents.first().copied();
  let parent_sha = match primary {
    Some(p) => translate(model, updated_refs, p)?,
    None => return Err(ReplayError::Generic(anyhow::anyhow!("root commit has no parent to checkout"))),
  };
  repo.checkout_force(&parent_sha)?;

  let original_hexsha = model.original_hexsha(commit).expect("RowCommit::Real always has an original hexsha");
  let mainline = if parents.len() > 1 { Some(1u32) } else { None };

  match repo.cherry_pick_no_commit(&original_hexsha, mainline)? {
    CherryPickOutcome::Conflict { .. } => {
      if let Some(resolutions) = model.solutions_for(commit).cloned() {
        apply_resolutions(repo, &resolutions)?;
      } else {
        let unmerged = collect_conflict(repo, &original_hexsha, &parent_sha)?;
        model.set_conflict_state(commit, unmerged.clone());
        let _ = cleanup(repo, model);
        return Err(ReplayError::MergeConflict { conflicting_hexsha: original_hexsha, unmerged_files: unmerged });
      }
    }
    CherryPickOutcome::Applied => {}
  }

  model.clear_conflict_state();
  let tree = repo.write_tree()?;
  let parent_shas: Vec<String> = parents.iter().map(|&p| translate(model, updated_refs, p)).collect::<ReplayResult<_>>()?;
  let parent_refs: Vec<&str> = parent_shas.iter().map(String::as_str).collect();
  let message = model.message_of(commit);
  let env = model.commit_env(commit, options.force_committed_date);
  let env_refs: Vec<(&str, &str)> = env.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
  repo.commit_tree(&tree, &parent_refs, message.as_bytes(), &env_refs).map_err(ReplayError::from)
}

/// An inserted row has no cherry-pick to apply: it reuses its parent's tree
/// verbatim (a blank commit), differing only in message/author/committer.
fn replay_dummy_commit(repo: &Repository, model: &EditableModel, options: &ReplayOptions, commit: RowCommit, updated_refs: &HashMap<RowCommit, String>) -> ReplayResult<String> {
  let parent = model.primary_parent(commit);
  let parent_sha = match parent {
    Some(p) => translate(model, updated_refs, p)?,
    None => return Err(ReplayError::Generic(anyhow::anyhow!("inserted commit has no row below it to branch from"))),
  };
  repo.checkout_force(&parent_sha)?;
  let tree = repo.write_tree()?;
  let message = model.message_of(commit);
  let env = model.commit_env(commit, options.force_committed_date);
  let env_refs: Vec<(&str, &str)> = env.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
  repo.commit_tree(&tree, &[parent_sha.as_str()], message.as_bytes(), &env_refs).map_err(ReplayError::from)
}

fn bump_progress(progress: &AtomicU32, to_rewrite_count: usize) {
  let delta = 1.0f32 / to_rewrite_count as f32;
  let mut current = f32::from_bits(progress.load(Ordering::Relaxed));
  loop {
    let next = (current + delta).clamp(0.0, 1.0);
    match progress.compare_exchange(current.to_bits(), next.to_bits(), Ordering::Relaxed, Ordering::Relaxed) {
      Ok(_) => break,
      Err(actual) => current = f32::from_bits(actual),
    }
  }
}

fn apply_resolutions(repo: &Repository, resolutions: &HashMap<String, Resolution>) -> ReplayResult<()> {
  for (path, resolution) in resolutions {
    match resolution {
      Resolution::Delete => repo.rm(path)?,
      Resolution::Add => repo.add(path)?,
      Resolution::AddCustom(content) => {
        let full_path = PathBuf::from(repo.path()).join(path);
        std::fs::write(&full_path, content).map_err(|e| ReplayError::Generic(anyhow::anyhow!("writing {path}: {e}")))?;
        repo.add(path)?;
      }
    }
  }
  Ok(())
}

/// Builds the `path -> FileConflict` map from `git status --porcelain` plus
/// `git diff <commit>~ <commit>`, split into per-path hunks the same way the
/// sync engine splits its own merge-conflict diffs.
fn collect_conflict(repo: &Repository, conflicting_hexsha: &str, checked_out_sha: &str) -> ReplayResult<HashMap<String, FileConflict>> {
  let status_lines = repo.status_porcelain()?;
  let mut statuses: Vec<(String, GitStatus)> = Vec::new();
  for line in &status_lines {
    if line.len() < 4 {
      continue;
    }
    let code = &line[0..2];
    if let Some(status) = GitStatus::from_porcelain(code) {
      statuses.push((line[3..].trim().to_string(), status));
    }
  }

  let diff_text = repo.diff(&format!("{conflicting_hexsha}~"), conflicting_hexsha)?;
  let hunks_by_path = split_diff_by_path(&diff_text);

  let parent_commit = repo.commit(checked_out_sha)?;

  let mut result = HashMap::new();
  for (path, status) in statuses {
    let unmerged_content = if status != GitStatus::DD {
      std::fs::read(PathBuf::from(repo.path()).join(&path)).unwrap_or_default()
    } else {
      Vec::new()
    };
    let orig_content =
      if matches!(status, GitStatus::UA | GitStatus::DU | GitStatus::DD) { Vec::new() } else { repo.tree_blob(&parent_commit.tree, &path).unwrap_or_default() };
    let diff = hunks_by_path.get(&path).cloned().unwrap_or_default();
    result.insert(path, FileConflict { git_status: status, unmerged_content, orig_content, diff });
  }
  Ok(result)
}

fn split_diff_by_path(diff: &str) -> HashMap<String, String> {
  let mut result = HashMap::new();
  let mut current_path: Option<String> = None;
  let mut current = String::new();
  for line in diff.lines() {
    if let Some(rest) = line.strip_prefix("diff --git a/") {
      if let Some(path) = current_path.take() {
        result.insert(path, current.trim_end().to_string());
      }
      current.clear();
      current_path = rest.find(" b/").map(|idx| rest[..idx].to_string());
      continue;
    }
    if current_path.is_some() {
      current.push_str(line);
      current.push('\n');
    }
  }
  if let Some(path) = current_path.take() {
    result.insert(path, current.trim_end().to_string());
  }
  result
}

/// §4.E step 4: point a scratch ref at the last commit actually rewritten,
/// check it out, then swap names with the original branch. If nothing was
/// rewritten (`last_updated_sha` is `None`, an empty-frontier round trip),
/// this is a no-op beyond reporting the branch's current tip. Returns the sha
/// and the branch name the rewritten history now lives under, since a rename
/// means that is no longer `model.base().branch_name()`.
fn finalize(repo: &Repository, model: &mut EditableModel, last_updated_sha: Option<String>) -> ReplayResult<(String, String)> {
  let original_name = model.base().branch_name().to_string();
  let renaming = model.new_branch_name().is_some();

  // An empty frontier (e.g. a rename with no field/row edits) leaves
  // `last_updated_sha` at `None`; fall back to the branch's current tip so a
  // rename-only replay still goes through the checkout/rename below.
  let sha = match last_updated_sha {
    Some(sha) => sha,
    None if !renaming => return Ok((repo.rev_parse(&original_name)?, original_name)),
    None => repo.rev_parse(&original_name)?,
  };

  repo.update_ref("refs/heads/gitbuster_rebase", &sha)?;
  let (ok, stderr) = repo.try_checkout_branch("gitbuster_rebase")?;
  if !ok {
    return if stderr.contains("did not match") { Err(ReplayError::ReplayLost) } else { Err(ReplayError::Generic(anyhow::anyhow!("checkout gitbuster_rebase: {stderr}"))) };
  }

  let target_name = model.new_branch_name().map(str::to_string).unwrap_or_else(|| original_name.clone());
  if renaming {
    // An actual rename to a different name must never clobber an existing
    // branch by that name; `-m` fails instead, surfaced as `Generic` with
    // git's own message. `-M` is reserved for the branch below: replacing
    // the original name with itself, the step-4 atomic swap.
    repo.move_current_branch(&target_name)?;
    if !model.base().is_fake() {
      repo.delete_branch(&original_name)?;
    }
  } else {
    repo.rename_current_branch(&target_name)?;
  }

  Ok((sha, target_name))
}

/// Always runs once, regardless of outcome: resets a dirty working tree left
/// behind by a failed cherry-pick, and drops the scratch branch if it's
/// still around (it normally is not, having been renamed away in
/// `finalize`).
fn cleanup(repo: &Repository, model: &EditableModel) -> ReplayResult<()> {
  if repo.is_dirty()? {
    repo.reset_hard()?;
  }
  if repo.branch_exists("gitbuster_rebase") {
    let fallback = if model.base().is_fake() { repo.branches()?.into_iter().next().map(|b| b.name) } else { Some(model.base().branch_name().to_string()) };
    if let Some(name) = fallback
      && repo.branch_exists(&name)
    {
      let _ = repo.checkout_branch(&name);
    }
    repo.delete_branch("gitbuster_rebase")?;
  }
  Ok(())
}

/// §4.E step 5: reload the Base Model from the branch's new tip and hand
/// back a fresh, unmodified Editable Model. Takes the *post-finalize* branch
/// name explicitly, since a rename means it no longer matches
/// `model.base().branch_name()`.
fn repopulate(repo: &Repository, model: &mut EditableModel, branch_name: &str) -> ReplayResult<()> {
  let new_base = crate::base_model::BaseModel::load(repo, branch_name)?;
  *model = EditableModel::from_base(new_base);
  Ok(())
}
