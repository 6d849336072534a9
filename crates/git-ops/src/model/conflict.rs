//! Conflict introspection types surfaced by the Replay Engine (§4.E) and
//! resolved by the caller through `EditableModel::set_conflict_solutions`.

use std::fmt;

/// The seven two-letter `git status --porcelain` codes a failed, index-level
/// `cherry-pick -n` can leave behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GitStatus {
  /// Deleted by both sides.
  DD,
  /// Added by us, unmerged.
  AU,
  /// Deleted by us, unmerged (present upstream, gone on our side).
  UD,
  /// Unmerged, added by us.
  UA,
  /// Deleted by us (present on our side, gone upstream).
  DU,
  /// Added by both sides.
  AA,
  /// Both sides modified the same path.
  UU,
}

impl GitStatus {
  /// Parses the two leading status columns of one `status --porcelain` line.
  /// Returns `None` for any code outside the seven unmerged states (i.e. an
  /// ordinary staged/unstaged change, which is not a conflict).
  pub fn from_porcelain(code: &str) -> Option<Self> {
    match code {
      "DD" => Some(Self::DD),
      "AU" => Some(Self::AU),
      "UD" => Some(Self::UD),
      "UA" => Some(Self::UA),
      "DU" => Some(Self::DU),
      "AA" => Some(Self::AA),
      "UU" => Some(Self::UU),
      _ => None,
    }
  }
}

impl fmt::Display for GitStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Self::DD => "DD",
      Self::AU => "AU",
      Self::UD => "UD",
      Self::UA => "UA",
      Self::DU => "DU",
      Self::AA => "AA",
      Self::UU => "UU",
    };
    write!(f, "{s}")
  }
}

/// Everything the caller needs to render and resolve one conflicted path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileConflict {
  pub git_status: GitStatus,
  /// The working-tree content left behind by the failed apply, if the path
  /// still exists on disk (absent for `UD`/`DU`/`DD`).
  pub unmerged_content: Vec<u8>,
  /// The path's content in the commit being cherry-picked onto, before the
  /// pick was attempted.
  pub orig_content: Vec<u8>,
  /// The hunk text for this path, sliced out of `git diff <c>~ <c>`.
  pub diff: String,
}

/// A caller-supplied fix for one conflicted path, applied before the replay
/// engine resumes (§4.E).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
  /// `git rm <path>`.
  Delete,
  /// `git add <path>` - keep whatever content cherry-pick left on disk.
  Add,
  /// Overwrite the working-tree file with `content`, then `git add <path>`.
  AddCustom(Vec<u8>),
}
