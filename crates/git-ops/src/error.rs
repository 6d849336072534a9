use std::fmt;

use crate::model::conflict::FileConflict;
use std::collections::HashMap;

/// Errors raised by the repository adapter and the base model it backs.
#[derive(Debug)]
pub enum RepoError {
  /// HEAD does not point at a branch.
  DetachedHead,
  /// Any other subprocess or parsing failure.
  Generic(anyhow::Error),
}

impl fmt::Display for RepoError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RepoError::DetachedHead => write!(f, "HEAD is not on a branch"),
      RepoError::Generic(e) => write!(f, "{e}"),
    }
  }
}

impl std::error::Error for RepoError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      RepoError::DetachedHead => None,
      RepoError::Generic(e) => e.source(),
    }
  }
}

impl From<anyhow::Error> for RepoError {
  fn from(e: anyhow::Error) -> Self {
    RepoError::Generic(e)
  }
}

pub type Result<T> = std::result::Result<T, RepoError>;

/// Errors raised by the Editable Model's own mutators (row/rename bookkeeping;
/// never involves a subprocess).
#[derive(Debug)]
pub enum ModelError {
  /// A row index passed to `set_data`/`is_deleted` is out of `[0, row_count)`.
  InvalidIndex { row: usize, row_count: usize },
  /// `set_current_branch` was called a second time without `force`.
  DoubleBranchChange,
  /// `set_new_branch_name` failed the branch-name validator (§4.F).
  InvalidRefName { name: String, reason: String },
}

impl fmt::Display for ModelError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ModelError::InvalidIndex { row, row_count } => write!(f, "row {row} out of range (model has {row_count} rows)"),
      ModelError::DoubleBranchChange => write!(f, "current branch was already changed once this session"),
      ModelError::InvalidRefName { name, reason } => write!(f, "'{name}' is not a valid branch name: {reason}"),
    }
  }
}

impl std::error::Error for ModelError {}

pub type ModelResult<T> = std::result::Result<T, ModelError>;

/// Errors raised by the Replay Engine (§4.E, §7).
#[derive(Debug)]
pub enum ReplayError {
  /// The branch tip moved between model load and `write()`.
  RepoMoved { expected: String, actual: String },
  /// A cherry-pick conflicted and no resolution was supplied. `unmerged_files`
  /// mirrors what was written into `EditableModel::unmerged_files`.
  MergeConflict { conflicting_hexsha: String, unmerged_files: HashMap<String, FileConflict> },
  /// The final `checkout gitbuster_rebase` reported `pathspec ... did not
  /// match` - the scratch branch vanished before finalization could read it.
  ReplayLost,
  /// Any other subprocess failure the engine cannot recover from.
  Generic(anyhow::Error),
}

impl fmt::Display for ReplayError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ReplayError::RepoMoved { expected, actual } => {
        write!(f, "branch moved since the model was loaded (expected tip {expected}, found {actual})")
      }
      ReplayError::MergeConflict { conflicting_hexsha, unmerged_files } => {
        write!(f, "cherry-pick of {conflicting_hexsha} conflicted in {} file(s)", unmerged_files.len())
      }
      ReplayError::ReplayLost => write!(f, "lost track of the scratch branch during finalization; original branch untouched"),
      ReplayError::Generic(e) => write!(f, "{e}"),
    }
  }
}

impl std::error::Error for ReplayError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      ReplayError::Generic(e) => e.source(),
      _ => None,
    }
  }
}

impl From<anyhow::Error> for ReplayError {
  fn from(e: anyhow::Error) -> Self {
    ReplayError::Generic(e)
  }
}

impl From<RepoError> for ReplayError {
  fn from(e: RepoError) -> Self {
    match e {
      RepoError::DetachedHead => ReplayError::Generic(anyhow::anyhow!("HEAD is not on a branch")),
      RepoError::Generic(e) => ReplayError::Generic(e),
    }
  }
}

impl From<ModelError> for ReplayError {
  fn from(e: ModelError) -> Self {
    ReplayError::Generic(anyhow::anyhow!("{e}"))
  }
}

pub type ReplayResult<T> = std::result::Result<T, ReplayError>;
