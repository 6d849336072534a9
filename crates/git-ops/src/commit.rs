//! Arena-based representation of the immutable commit graph.
//!
//! `Commit`'s natural shape is cyclic (a commit points at its parents, which
//! point at their own parents, and we additionally want the reverse `children`
//! edges) which does not translate directly into owned Rust values. Instead we
//! store every commit reachable from a walk in a flat `CommitArena` and refer
//! to them by a small integer id; parents/children are id lists indexed into
//! the same arena.

use std::collections::HashMap;

/// Address of a commit within a `CommitArena`. Distinct from `hexsha`: a
/// `CommitId` is only meaningful relative to the arena that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommitId(pub(crate) u32);

impl CommitId {
  pub fn from_index(index: usize) -> Self {
    CommitId(index as u32)
  }
}

/// Immutable, fully-populated snapshot of one commit's fields.
#[derive(Debug, Clone)]
pub struct CommitData {
  pub hexsha: String,
  pub parents: Vec<CommitId>,
  pub children: Vec<CommitId>,
  pub tree: String,
  pub author_name: String,
  pub author_email: String,
  pub authored_date: i64,
  pub author_tz: String,
  pub committer_name: String,
  pub committer_email: String,
  pub committed_date: i64,
  pub committer_tz: String,
  pub message: String,
}

impl CommitData {
  pub fn summary(&self) -> &str {
    self.message.lines().next().unwrap_or("")
  }
}

/// Dense store of every commit produced by one `walk()`, addressed by
/// `CommitId`. `children` edges are derived after the initial parse: they are
/// not present in `git rev-list --parents` output.
#[derive(Debug, Default)]
pub struct CommitArena {
  commits: Vec<CommitData>,
  by_hexsha: HashMap<String, CommitId>,
}

impl CommitArena {
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert a commit whose `children` field is not yet populated (filled in
  /// later by `link_children`). Returns the id it was assigned.
  pub fn push(&mut self, mut data: CommitData) -> CommitId {
    data.children.clear();
    let id = CommitId(self.commits.len() as u32);
    self.by_hexsha.insert(data.hexsha.clone(), id);
    self.commits.push(data);
    id
  }

  /// Populate every commit's `children` list from the `parents` lists already
  /// present in the arena. Idempotent.
  pub fn link_children(&mut self) {
    for c in &mut self.commits {
      c.children.clear();
    }
    let edges: Vec<(CommitId, CommitId)> = self
      .commits
      .iter()
      .enumerate()
      .flat_map(|(i, c)| c.parents.iter().map(move |&p| (p, CommitId(i as u32))))
      .collect();
    for (parent, child) in edges {
      self.commits[parent.0 as usize].children.push(child);
    }
  }

  pub fn get(&self, id: CommitId) -> &CommitData {
    &self.commits[id.0 as usize]
  }

  /// Set a commit's parent ids. Used right after a bulk `push` pass once
  /// every hexsha in the walk has been assigned a `CommitId`.
  pub fn set_parents(&mut self, id: CommitId, parents: Vec<CommitId>) {
    self.commits[id.0 as usize].parents = parents;
  }

  pub fn id_of(&self, hexsha: &str) -> Option<CommitId> {
    self.by_hexsha.get(hexsha).copied()
  }

  pub fn len(&self) -> usize {
    self.commits.len()
  }

  pub fn is_empty(&self) -> bool {
    self.commits.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (CommitId, &CommitData)> {
    self.commits.iter().enumerate().map(|(i, c)| (CommitId(i as u32), c))
  }
}
