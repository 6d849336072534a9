//! Base Model: the immutable snapshot an Editable Model is layered on top of.

use crate::commit::{CommitArena, CommitId};
use crate::error::Result;
use crate::repo::Repository;
use std::collections::HashSet;
use tracing::instrument;

/// One of the eight columns the Base Model can answer `data()` for directly.
/// (`parents`/`children`/`hexsha` are read straight off `CommitData`; this
/// enum covers the remaining actor/time/message fields which have a
/// meaningfully different shape depending on the column.)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseColumn {
  AuthoredDate,
  CommittedDate,
  AuthorName,
  AuthorEmail,
  CommitterName,
  CommitterEmail,
  Message,
}

/// `(epoch-seconds, ±HHMM timezone)`, the shape time columns are read in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeValue {
  pub epoch: i64,
  pub tz: String,
}

pub struct BaseModel {
  arena: CommitArena,
  /// commits, newest first, same index space as row numbers
  rows: Vec<CommitId>,
  unpushed: HashSet<CommitId>,
  branch_name: String,
  /// A Base Model built without a real underlying branch (see Glossary,
  /// "Fake model"); `rows` starts empty and gains its first row only once the
  /// replay engine materializes a commit.
  fake: bool,
}

impl BaseModel {
  /// Build from `walk(branch.tip)`, precomputing the pushed/unpushed split
  /// against the branch's tracking ref, if any.
  #[instrument(skip(repo))]
  pub fn load(repo: &Repository, branch_name: &str) -> Result<Self> {
    let arena = repo.walk(branch_name)?;
    let rows: Vec<CommitId> = arena.iter().map(|(id, _)| id).collect();

    // `rows` runs newest-first; everything strictly newer than the tracking
    // branch's tip is unpushed. No tracking branch at all means every commit
    // is unpushed.
    let tracking_tip = repo.tracking_branch_tip(branch_name);
    let mut unpushed = HashSet::new();
    for &id in &rows {
      if let Some(tip) = &tracking_tip
        && arena.get(id).hexsha == *tip
      {
        break;
      }
      unpushed.insert(id);
    }

    Ok(Self { arena, rows, unpushed, branch_name: branch_name.to_string(), fake: false })
  }

  /// A scratchpad model with no underlying branch yet (see Glossary, "Fake
  /// model"). `rows` is empty until the replay engine's first successful
  /// write gives it a real branch identity.
  pub fn fake(branch_name: impl Into<String>) -> Self {
    Self {
      arena: CommitArena::new(),
      rows: Vec::new(),
      unpushed: HashSet::new(),
      branch_name: branch_name.into(),
      fake: true,
    }
  }

  pub fn is_fake(&self) -> bool {
    self.fake
  }

  pub fn branch_name(&self) -> &str {
    &self.branch_name
  }

  pub fn arena(&self) -> &CommitArena {
    &self.arena
  }

  pub fn row_count(&self) -> usize {
    self.rows.len()
  }

  pub fn row(&self, index: usize) -> Option<CommitId> {
    self.rows.get(index).copied()
  }

  pub fn row_of(&self, id: CommitId) -> Option<usize> {
    self.rows.iter().position(|&r| r == id)
  }

  pub fn is_unpushed(&self, id: CommitId) -> bool {
    self.unpushed.contains(&id)
  }

  pub fn data_time(&self, row: usize, column: BaseColumn) -> Option<TimeValue> {
    let id = self.row(row)?;
    let c = self.arena.get(id);
    match column {
      BaseColumn::AuthoredDate => Some(TimeValue { epoch: c.authored_date, tz: c.author_tz.clone() }),
      BaseColumn::CommittedDate => Some(TimeValue { epoch: c.committed_date, tz: c.committer_tz.clone() }),
      _ => None,
    }
  }

  pub fn data_text(&self, row: usize, column: BaseColumn) -> Option<String> {
    let id = self.row(row)?;
    let c = self.arena.get(id);
    match column {
      BaseColumn::AuthorName => Some(c.author_name.clone()),
      BaseColumn::AuthorEmail => Some(c.author_email.clone()),
      BaseColumn::CommitterName => Some(c.committer_name.clone()),
      BaseColumn::CommitterEmail => Some(c.committer_email.clone()),
      BaseColumn::Message => Some(c.message.clone()),
      _ => None,
    }
  }
}
