//! Action Log: self-inverting records of every mutation the Editable Model
//! applies, grouped into undoable/redoable events (§4.G).

use super::{Column, FieldValue, RowCommit};
use std::collections::HashMap;

/// One reversible mutation. Each variant carries enough state to invert
/// itself without consulting the model.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
  /// A row was inserted at `position`. `snapshot` is the overlay the row
  /// carried at insertion time (empty for a fresh `insert_rows` call, but
  /// present so `Insert` stays structurally symmetric with `Remove`).
  Insert { position: usize, commit: RowCommit, snapshot: Option<HashMap<Column, FieldValue>> },
  /// `commit` was marked deleted at `position`. `snapshot` is its overlay at
  /// the moment of removal, restored verbatim on undo.
  Remove { position: usize, commit: RowCommit, snapshot: Option<HashMap<Column, FieldValue>> },
  /// `column` on `commit` changed from `old_value` to `new_value`.
  Set { commit: RowCommit, column: Column, old_value: FieldValue, new_value: FieldValue },
  /// The pending branch rename changed from `old_name` to `new_name`.
  SetBranchName { old_name: Option<String>, new_name: Option<String> },
}

/// Undo/redo log grouped into events: `start_event` opens a new event and
/// discards any redo tail, `push` appends to the currently open event, and
/// `cursor` tracks which event undo/redo act on next.
#[derive(Debug, Default)]
pub struct ActionLog {
  events: Vec<Vec<Action>>,
  /// Index of the last applied event, or `-1` if nothing has happened yet
  /// (or everything has been undone).
  cursor: i64,
}

impl ActionLog {
  pub fn new() -> Self {
    Self { events: Vec::new(), cursor: -1 }
  }

  /// Opens a new event, discarding any events past the current cursor (the
  /// redo tail becomes unreachable once a fresh edit is made).
  pub fn start_event(&mut self) {
    let next = (self.cursor + 1) as usize;
    self.events.truncate(next);
    self.events.push(Vec::new());
    self.cursor = next as i64;
  }

  /// Appends to the currently open event. No-op if `start_event` was never
  /// called (callers that bypass history, e.g. during undo/redo replay,
  /// simply never invoke this).
  pub fn push(&mut self, action: Action) {
    if self.cursor >= 0 {
      self.events[self.cursor as usize].push(action);
    }
  }

  pub fn can_undo(&self) -> bool {
    self.cursor >= 0
  }

  pub fn can_redo(&self) -> bool {
    self.cursor + 1 < self.events.len() as i64
  }

  /// The event undo would act on next, oldest-to-newest action order.
  pub fn current_event(&self) -> Option<&[Action]> {
    if self.cursor >= 0 { self.events.get(self.cursor as usize).map(Vec::as_slice) } else { None }
  }

  pub fn move_cursor_back(&mut self) {
    self.cursor -= 1;
  }

  /// Advances the cursor and returns the event it now points at, or `None`
  /// if there was nothing to redo.
  pub fn advance_and_peek(&mut self) -> Option<&[Action]> {
    if !self.can_redo() {
      return None;
    }
    self.cursor += 1;
    self.events.get(self.cursor as usize).map(Vec::as_slice)
  }
}
