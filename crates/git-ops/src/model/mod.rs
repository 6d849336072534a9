//! Editable Model (§4.C): a layered overlay over the Base Model. Every read
//! checks the overlay first and falls back to the immutable snapshot
//! underneath; every write goes through the Action Log so it can be undone.

pub mod action;
pub mod branch_validator;
pub mod conflict;

use crate::base_model::{BaseModel, TimeValue};
use crate::commit::CommitId;
use crate::error::{ModelError, ModelResult};
use crate::repo::Repository;
use action::{Action, ActionLog};
use conflict::{FileConflict, Resolution};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};

/// The eleven columns a row can be read through `data()`. `Hexsha`,
/// `Parents`, `Tree` and `Children` are read-only (derived straight from the
/// arena, never overlaid); the rest accept `set_data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
  Hexsha,
  Parents,
  Tree,
  Children,
  AuthoredDate,
  CommittedDate,
  AuthorName,
  AuthorEmail,
  CommitterName,
  CommitterEmail,
  Message,
}

/// The author/committer column pairs the merge-mode invariant keeps in sync.
const PAIRS: [(Column, Column); 3] =
  [(Column::AuthoredDate, Column::CommittedDate), (Column::AuthorName, Column::CommitterName), (Column::AuthorEmail, Column::CommitterEmail)];

fn paired_column(column: Column) -> Option<Column> {
  for (a, b) in PAIRS {
    if column == a {
      return Some(b);
    }
    if column == b {
      return Some(a);
    }
  }
  None
}

/// Every column except the read-only structural ones, i.e. the set
/// `commit_is_modified` compares against the Base Model.
const EDITABLE_COLUMNS: [Column; 7] = [
  Column::AuthoredDate,
  Column::CommittedDate,
  Column::AuthorName,
  Column::AuthorEmail,
  Column::CommitterName,
  Column::CommitterEmail,
  Column::Message,
];

/// The value shape a cell can hold. `Ids` is only produced for `Parents`
/// and `Children`, which are read-only and never stored in the overlay.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
  Text(String),
  Time(TimeValue),
  Ids(Vec<RowCommit>),
}

impl FieldValue {
  pub fn as_text(&self) -> &str {
    match self {
      FieldValue::Text(s) => s,
      _ => "",
    }
  }

  pub fn as_time(&self) -> Option<&TimeValue> {
    match self {
      FieldValue::Time(t) => Some(t),
      _ => None,
    }
  }
}

/// What a caller asks `set_data` to write. Editing a time column with
/// `Epoch` preserves whichever timezone the cell already carries; `Time`
/// replaces both epoch and timezone explicitly.
#[derive(Debug, Clone, PartialEq)]
pub enum EditValue {
  Text(String),
  Epoch(i64),
  Time(i64, String),
}

/// Identifies one row's underlying commit: either a real commit from the
/// Base Model's arena, or a not-yet-materialized insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RowCommit {
  Real(CommitId),
  Dummy(u32),
}

/// Snapshot key used to invalidate the frontier/children caches: the set of
/// commits the overlay currently touches. Cheap to compare, expensive to
/// recompute the antichain from scratch, hence the cache.
type CacheKey = BTreeSet<RowCommit>;

pub struct EditableModel {
  base: BaseModel,
  /// Display order, newest first; grows/shrinks only through
  /// `insert_rows`/undo of `insert_rows`.
  commits: Vec<RowCommit>,
  next_dummy_id: u32,
  modifications: HashMap<RowCommit, HashMap<Column, FieldValue>>,
  deleted: HashSet<RowCommit>,
  log: ActionLog,
  merge_mode: bool,
  new_branch_name: Option<String>,
  conflicting_commit: Option<RowCommit>,
  unmerged_files: HashMap<String, FileConflict>,
  solutions: HashMap<RowCommit, HashMap<String, Resolution>>,
  frontier_cache: RefCell<Option<(CacheKey, Vec<RowCommit>)>>,
  children_cache: RefCell<Option<(CacheKey, HashSet<RowCommit>)>>,
}

impl EditableModel {
  /// Wraps a freshly loaded `BaseModel` with an empty overlay.
  pub fn from_base(base: BaseModel) -> Self {
    let commits: Vec<RowCommit> = (0..base.row_count()).filter_map(|row| base.row(row)).map(RowCommit::Real).collect();
    Self {
      base,
      commits,
      next_dummy_id: 0,
      modifications: HashMap::new(),
      deleted: HashSet::new(),
      log: ActionLog::new(),
      merge_mode: false,
      new_branch_name: None,
      conflicting_commit: None,
      unmerged_files: HashMap::new(),
      solutions: HashMap::new(),
      frontier_cache: RefCell::new(None),
      children_cache: RefCell::new(None),
    }
  }

  /// A scratchpad model with no underlying branch yet (Glossary, "Fake
  /// model"). Starts with exactly one synthetic `Dummy` row so the editor
  /// has something to insert content on top of before the first write.
  pub fn new_fake(branch_name: impl Into<String>) -> Self {
    let base = BaseModel::fake(branch_name);
    let seed = RowCommit::Dummy(0);
    let mut modifications = HashMap::new();
    modifications.insert(seed, HashMap::new());
    Self {
      base,
      commits: vec![seed],
      next_dummy_id: 1,
      modifications,
      deleted: HashSet::new(),
      log: ActionLog::new(),
      merge_mode: false,
      new_branch_name: None,
      conflicting_commit: None,
      unmerged_files: HashMap::new(),
      solutions: HashMap::new(),
      frontier_cache: RefCell::new(None),
      children_cache: RefCell::new(None),
    }
  }

  pub fn base(&self) -> &BaseModel {
    &self.base
  }

  pub fn row_count(&self) -> usize {
    self.commits.len()
  }

  pub fn row_commit(&self, row: usize) -> Option<RowCommit> {
    self.commits.get(row).copied()
  }

  pub(crate) fn commits(&self) -> &[RowCommit] {
    &self.commits
  }

  pub fn row_of(&self, commit: RowCommit) -> Option<usize> {
    self.commits.iter().position(|&c| c == commit)
  }

  pub fn is_deleted(&self, commit: RowCommit) -> bool {
    self.deleted.contains(&commit)
  }

  pub fn merge_mode(&self) -> bool {
    self.merge_mode
  }

  pub fn set_merge_mode(&mut self, merge_mode: bool) {
    self.merge_mode = merge_mode;
  }

  // ---- reads ----

  /// The original (non-overlaid) value for one cell. `Dummy` rows report the
  /// null value for every column: empty text, epoch 0 at `+0000`, empty id
  /// lists.
  fn original_field(&self, commit: RowCommit, column: Column) -> FieldValue {
    let id = match commit {
      RowCommit::Dummy(_) => {
        return match column {
          Column::Parents | Column::Children => FieldValue::Ids(Vec::new()),
          Column::AuthoredDate | Column::CommittedDate => FieldValue::Time(TimeValue { epoch: 0, tz: "+0000".to_string() }),
          _ => FieldValue::Text(String::new()),
        };
      }
      RowCommit::Real(id) => id,
    };
    let data = self.base.arena().get(id);
    match column {
      Column::Hexsha => FieldValue::Text(data.hexsha.clone()),
      Column::Tree => FieldValue::Text(data.tree.clone()),
      Column::Parents => FieldValue::Ids(data.parents.iter().copied().map(RowCommit::Real).collect()),
      Column::Children => FieldValue::Ids(data.children.iter().copied().map(RowCommit::Real).collect()),
      Column::AuthoredDate => FieldValue::Time(TimeValue { epoch: data.authored_date, tz: data.author_tz.clone() }),
      Column::CommittedDate => FieldValue::Time(TimeValue { epoch: data.committed_date, tz: data.committer_tz.clone() }),
      Column::AuthorName => FieldValue::Text(data.author_name.clone()),
      Column::AuthorEmail => FieldValue::Text(data.author_email.clone()),
      Column::CommitterName => FieldValue::Text(data.committer_name.clone()),
      Column::CommitterEmail => FieldValue::Text(data.committer_email.clone()),
      Column::Message => FieldValue::Text(data.message.clone()),
    }
  }

  /// The value a caller sees: overlay if present, else the original.
  pub fn data_for(&self, commit: RowCommit, column: Column) -> FieldValue {
    if matches!(column, Column::Parents | Column::Children) {
      // Structural columns are always read straight off the arena; rows
      // never carry an overlay entry for them.
      return self.original_field(commit, column);
    }
    if let Some(overlay) = self.modifications.get(&commit)
      && let Some(value) = overlay.get(&column)
    {
      return value.clone();
    }
    self.original_field(commit, column)
  }

  pub fn data(&self, row: usize, column: Column) -> ModelResult<FieldValue> {
    let commit = self.commits.get(row).copied().ok_or(ModelError::InvalidIndex { row, row_count: self.commits.len() })?;
    Ok(self.data_for(commit, column))
  }

  fn is_commit_modified(&self, commit: RowCommit) -> bool {
    if matches!(commit, RowCommit::Dummy(_)) || self.deleted.contains(&commit) {
      return true;
    }
    EDITABLE_COLUMNS.iter().any(|&column| self.data_for(commit, column) != self.original_field(commit, column))
  }

  pub fn commit_is_modified(&self, row: usize) -> bool {
    self.commits.get(row).map(|&c| self.is_commit_modified(c)).unwrap_or(false)
  }

  /// Count of commits whose overlay differs from the Base Model in any
  /// non-structural field, `Dummy` rows always included.
  pub fn get_modified_count(&self) -> usize {
    let candidates: HashSet<RowCommit> = self.modifications.keys().copied().chain(self.commits.iter().copied()).collect();
    candidates.into_iter().filter(|&c| self.is_commit_modified(c)).count()
  }

  // ---- writes ----

  fn resolve_edit_value(&self, commit: RowCommit, column: Column, value: EditValue) -> FieldValue {
    match (column, value) {
      (Column::AuthoredDate | Column::CommittedDate, EditValue::Epoch(epoch)) => {
        let tz = self.data_for(commit, column).as_time().map(|t| t.tz.clone()).unwrap_or_else(|| "+0000".to_string());
        FieldValue::Time(TimeValue { epoch, tz })
      }
      (Column::AuthoredDate | Column::CommittedDate, EditValue::Time(epoch, tz)) => FieldValue::Time(TimeValue { epoch, tz }),
      (_, EditValue::Text(text)) => FieldValue::Text(text),
      (_, other) => {
        // A time-shaped edit on a text column (or vice versa) is a caller
        // bug; fall back to the textual form rather than panic.
        match other {
          EditValue::Epoch(epoch) => FieldValue::Text(epoch.to_string()),
          EditValue::Time(epoch, tz) => FieldValue::Text(format!("{epoch} {tz}")),
          EditValue::Text(text) => FieldValue::Text(text),
        }
      }
    }
  }

  fn apply_set_internal(&mut self, commit: RowCommit, column: Column, value: FieldValue) {
    self.modifications.entry(commit).or_default().insert(column, value.clone());
    if self.merge_mode && let Some(paired) = paired_column(column) {
      self.modifications.entry(commit).or_default().insert(paired, value);
    }
    self.invalidate_caches();
  }

  pub fn set_data(&mut self, row: usize, column: Column, value: EditValue) -> ModelResult<()> {
    if matches!(column, Column::Hexsha | Column::Parents | Column::Tree | Column::Children) {
      return Err(ModelError::InvalidIndex { row, row_count: self.commits.len() });
    }
    let commit = self.commits.get(row).copied().ok_or(ModelError::InvalidIndex { row, row_count: self.commits.len() })?;
    let field_value = self.resolve_edit_value(commit, column, value);
    let current = self.data_for(commit, column);
    if current == field_value {
      return Ok(());
    }
    self.log.push(Action::Set { commit, column, old_value: current, new_value: field_value.clone() });
    self.apply_set_internal(commit, column, field_value);
    Ok(())
  }

  pub fn insert_rows(&mut self, position: usize, count: usize) -> ModelResult<()> {
    if position > self.commits.len() {
      return Err(ModelError::InvalidIndex { row: position, row_count: self.commits.len() });
    }
    for i in 0..count {
      let commit = RowCommit::Dummy(self.next_dummy_id);
      self.next_dummy_id += 1;
      let at = position + i;
      self.commits.insert(at, commit);
      self.modifications.insert(commit, HashMap::new());
      self.log.push(Action::Insert { position: at, commit, snapshot: Some(HashMap::new()) });
    }
    self.invalidate_caches();
    Ok(())
  }

  /// Marks `count` rows starting at `position` deleted. Deletion hides a row
  /// from replay but keeps it addressable (and editable) until a later
  /// `undelete_commit`/undo brings it back.
  pub fn remove_rows(&mut self, position: usize, count: usize) -> ModelResult<()> {
    if position + count > self.commits.len() {
      return Err(ModelError::InvalidIndex { row: position, row_count: self.commits.len() });
    }
    for i in 0..count {
      let commit = self.commits[position + i];
      if self.deleted.insert(commit) {
        let snapshot = self.modifications.get(&commit).cloned();
        self.log.push(Action::Remove { position: position + i, commit, snapshot });
      }
    }
    self.invalidate_caches();
    Ok(())
  }

  /// Physically drops a row, used only to invert `Insert` during undo. Never
  /// itself logged.
  fn remove_row_really(&mut self, position: usize, expect: RowCommit) {
    debug_assert_eq!(self.commits.get(position).copied(), Some(expect));
    if position < self.commits.len() {
      self.commits.remove(position);
    }
    self.modifications.remove(&expect);
    self.deleted.remove(&expect);
    self.invalidate_caches();
  }

  /// Restores a deleted commit to the `commits` view, rewinding its overlay
  /// to `snapshot` (`None` meaning no overlay existed when it was removed).
  pub fn undelete_commit(&mut self, commit: RowCommit, snapshot: Option<HashMap<Column, FieldValue>>) {
    self.deleted.remove(&commit);
    match snapshot {
      Some(s) => {
        self.modifications.insert(commit, s);
      }
      None => {
        self.modifications.remove(&commit);
      }
    }
    self.invalidate_caches();
  }

  pub fn set_new_branch_name(&mut self, repo: &Repository, name: Option<String>) -> ModelResult<()> {
    let old_name = self.new_branch_name.clone();
    let resolved = match name {
      Some(n) if n == self.base.branch_name() => None,
      Some(n) => {
        branch_validator::validate_branch_name(repo, &n)?;
        Some(n)
      }
      None => None,
    };
    if resolved == old_name {
      return Ok(());
    }
    self.log.push(Action::SetBranchName { old_name: old_name.clone(), new_name: resolved.clone() });
    self.new_branch_name = resolved;
    Ok(())
  }

  pub fn new_branch_name(&self) -> Option<&str> {
    self.new_branch_name.as_deref()
  }

  // ---- history ----

  pub fn start_history_event(&mut self) {
    self.log.start_event();
  }

  pub fn can_undo(&self) -> bool {
    self.log.can_undo()
  }

  pub fn can_redo(&self) -> bool {
    self.log.can_redo()
  }

  pub fn undo(&mut self) {
    let Some(actions) = self.log.current_event().map(<[Action]>::to_vec) else {
      return;
    };
    for action in actions.iter().rev() {
      self.invert_action(action);
    }
    self.log.move_cursor_back();
  }

  pub fn redo(&mut self) {
    let Some(actions) = self.log.advance_and_peek().map(<[Action]>::to_vec) else {
      return;
    };
    for action in &actions {
      self.apply_action_forward(action);
    }
  }

  fn invert_action(&mut self, action: &Action) {
    match action {
      Action::Insert { position, commit, .. } => self.remove_row_really(*position, *commit),
      Action::Remove { commit, snapshot, .. } => self.undelete_commit(*commit, snapshot.clone()),
      Action::Set { commit, column, old_value, .. } => self.apply_set_internal(*commit, *column, old_value.clone()),
      Action::SetBranchName { old_name, .. } => self.new_branch_name = old_name.clone(),
    }
  }

  fn apply_action_forward(&mut self, action: &Action) {
    match action {
      Action::Insert { position, commit, snapshot } => {
        self.commits.insert(*position, *commit);
        self.modifications.insert(*commit, snapshot.clone().unwrap_or_default());
        self.invalidate_caches();
      }
      Action::Remove { commit, .. } => {
        self.deleted.insert(*commit);
        self.invalidate_caches();
      }
      Action::Set { commit, column, new_value, .. } => self.apply_set_internal(*commit, *column, new_value.clone()),
      Action::SetBranchName { new_name, .. } => self.new_branch_name = new_name.clone(),
    }
  }

  // ---- graph traversal (rewrite frontier, §4.C/§4.E) ----

  fn cache_key(&self) -> CacheKey {
    self.modifications.keys().copied().collect()
  }

  fn invalidate_caches(&mut self) {
    *self.frontier_cache.borrow_mut() = None;
    *self.children_cache.borrow_mut() = None;
  }

  /// Transitive closure of `commit`'s arena parents. `Dummy` rows have no
  /// arena edges and so always return an empty set.
  pub fn all_parents(&self, commit: RowCommit) -> HashSet<RowCommit> {
    let mut result = HashSet::new();
    let mut stack = vec![commit];
    while let Some(cur) = stack.pop() {
      if let RowCommit::Real(id) = cur {
        for &p in &self.base.arena().get(id).parents {
          let parent = RowCommit::Real(p);
          if result.insert(parent) {
            stack.push(parent);
          }
        }
      }
    }
    result
  }

  /// The model-level children of one row: arena children for a real commit,
  /// plus - for a `Dummy` row - the row immediately above it in display
  /// order (the row that now treats this insertion as its parent).
  pub(crate) fn model_children(&self, commit: RowCommit) -> Vec<RowCommit> {
    match commit {
      RowCommit::Real(id) => self.base.arena().get(id).children.iter().copied().map(RowCommit::Real).collect(),
      RowCommit::Dummy(_) => match self.row_of(commit) {
        Some(idx) if idx > 0 => vec![self.commits[idx - 1]],
        _ => Vec::new(),
      },
    }
  }

  /// Transitive closure of `model_children` over every commit in `roots`,
  /// cached against the current overlay key set.
  pub fn all_children(&self, roots: &[RowCommit]) -> HashSet<RowCommit> {
    let key = self.cache_key();
    if let Some((k, v)) = &*self.children_cache.borrow()
      && *k == key
    {
      return v.clone();
    }
    let mut result = HashSet::new();
    let mut stack: Vec<RowCommit> = roots.to_vec();
    while let Some(cur) = stack.pop() {
      for child in self.model_children(cur) {
        if result.insert(child) {
          stack.push(child);
        }
      }
    }
    *self.children_cache.borrow_mut() = Some((key, result.clone()));
    result
  }

  /// The rewrite frontier: the minimal antichain of modified commits such
  /// that every other modified commit is one of their descendants. Computed
  /// against a fixed snapshot of the candidate set so that removing one
  /// candidate never changes another already-decided candidate's fate
  /// (§9's antichain-pruning bug, fixed per SPEC_FULL §9).
  pub fn get_start_write_from(&self) -> Vec<RowCommit> {
    let key = self.cache_key();
    if let Some((k, v)) = &*self.frontier_cache.borrow()
      && *k == key
    {
      return v.clone();
    }

    let candidates: Vec<RowCommit> =
      self.modifications.keys().copied().chain(self.deleted.iter().copied()).collect::<HashSet<_>>().into_iter().filter(|&c| self.is_commit_modified(c)).collect();
    let mut antichain: Vec<RowCommit> = Vec::new();
    for &candidate in &candidates {
      let ancestors = self.all_parents(candidate);
      let dominated = candidates.iter().any(|&other| other != candidate && ancestors.contains(&other));
      if !dominated {
        antichain.push(candidate);
      }
    }

    let result = if antichain.is_empty() && self.base.is_fake() {
      self.commits.first().copied().map(|c| vec![c]).unwrap_or_default()
    } else {
      antichain
    };

    *self.frontier_cache.borrow_mut() = Some((key, result.clone()));
    result
  }

  pub fn get_to_rewrite_count(&self) -> usize {
    let frontier = self.get_start_write_from();
    let descendants = self.all_children(&frontier);
    frontier.len() + descendants.len()
  }

  // ---- conflict state, consulted/produced by the Replay Engine ----

  pub fn conflicting_commit(&self) -> Option<RowCommit> {
    self.conflicting_commit
  }

  pub fn unmerged_files(&self) -> &HashMap<String, FileConflict> {
    &self.unmerged_files
  }

  pub(crate) fn set_conflict_state(&mut self, commit: RowCommit, unmerged_files: HashMap<String, FileConflict>) {
    self.conflicting_commit = Some(commit);
    self.unmerged_files = unmerged_files;
  }

  pub(crate) fn clear_conflict_state(&mut self) {
    self.conflicting_commit = None;
    self.unmerged_files.clear();
  }

  /// Accepts the caller's fix for the currently conflicting commit. Panics
  /// if there is no pending conflict - callers are expected to check
  /// `conflicting_commit()` first.
  pub fn set_conflict_solutions(&mut self, resolutions: HashMap<String, Resolution>) {
    let commit = self.conflicting_commit.expect("set_conflict_solutions called with no pending conflict");
    self.solutions.insert(commit, resolutions);
  }

  pub(crate) fn solutions_for(&self, commit: RowCommit) -> Option<&HashMap<String, Resolution>> {
    self.solutions.get(&commit)
  }

  // ---- replay-engine accessors ----

  pub(crate) fn parents_of(&self, commit: RowCommit) -> Vec<RowCommit> {
    match commit {
      RowCommit::Real(id) => self.base.arena().get(id).parents.iter().copied().map(RowCommit::Real).collect(),
      RowCommit::Dummy(_) => Vec::new(),
    }
  }

  /// The first ancestor a rewritten commit should attach to: the arena's
  /// first parent for a real commit, or - for a `Dummy` row - the next row
  /// below it in display order (skipping past it is `translate`'s job, not
  /// this method's).
  pub(crate) fn primary_parent(&self, commit: RowCommit) -> Option<RowCommit> {
    match commit {
      RowCommit::Real(id) => self.base.arena().get(id).parents.first().copied().map(RowCommit::Real),
      RowCommit::Dummy(_) => {
        let idx = self.row_of(commit)?;
        self.commits.get(idx + 1).copied()
      }
    }
  }

  pub(crate) fn original_hexsha(&self, commit: RowCommit) -> Option<String> {
    match commit {
      RowCommit::Real(id) => Some(self.base.arena().get(id).hexsha.clone()),
      RowCommit::Dummy(_) => None,
    }
  }

  /// The hexsha of the first non-`Dummy` row, used by the replay engine's
  /// applicability pre-check.
  pub(crate) fn top_row_hexsha(&self) -> Option<String> {
    self.commits.iter().find_map(|&c| self.original_hexsha(c))
  }

  pub(crate) fn message_of(&self, commit: RowCommit) -> String {
    self.data_for(commit, Column::Message).as_text().to_string()
  }

  /// `GIT_AUTHOR_*`/`GIT_COMMITTER_*` overrides for `commit-tree`.
  /// Committer overrides are included only when `force_committed_date` is
  /// set, otherwise git stamps the committer fields itself.
  pub(crate) fn commit_env(&self, commit: RowCommit, force_committed_date: bool) -> Vec<(String, String)> {
    let mut env = Vec::new();
    env.push(("GIT_AUTHOR_NAME".to_string(), self.data_for(commit, Column::AuthorName).as_text().to_string()));
    env.push(("GIT_AUTHOR_EMAIL".to_string(), self.data_for(commit, Column::AuthorEmail).as_text().to_string()));
    if let Some(t) = self.data_for(commit, Column::AuthoredDate).as_time() {
      env.push(("GIT_AUTHOR_DATE".to_string(), format!("{} {}", t.epoch, t.tz)));
    }
    if force_committed_date {
      env.push(("GIT_COMMITTER_NAME".to_string(), self.data_for(commit, Column::CommitterName).as_text().to_string()));
      env.push(("GIT_COMMITTER_EMAIL".to_string(), self.data_for(commit, Column::CommitterEmail).as_text().to_string()));
      if let Some(t) = self.data_for(commit, Column::CommittedDate).as_time() {
        env.push(("GIT_COMMITTER_DATE".to_string(), format!("{} {}", t.epoch, t.tz)));
      }
    }
    env
  }
}
