//! Git history rewriting engine: loads a branch into an immutable
//! [`base_model`], lets a caller stage edits on an [`model::EditableModel`]
//! overlay with full undo/redo, optionally redistributes dates with
//! [`timelapse`], then replays the edits back onto the branch with
//! [`replay`].

pub mod base_model;
pub mod commit;
pub mod error;
pub mod model;
pub mod repo;
pub mod replay;
pub mod timelapse;

#[cfg(test)]
mod base_model_test;

#[cfg(test)]
mod model_test;


#[cfg(test)]
mod replay_test;

#[cfg(test)]
mod timelapse_test;
