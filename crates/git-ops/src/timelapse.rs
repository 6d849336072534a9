//! Timelapse Redistributor (§4.D): scatters a batch of commits' dates
//! uniformly across an admissible set of date ranges x weekdays x
//! time-of-day windows, preserving their relative (row) order.

use crate::model::{Column, EditValue, EditableModel};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use rand::Rng;
use std::collections::HashSet;

/// A half-open `[start, end)` span of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
  pub start: NaiveDate,
  pub end: NaiveDate,
}

/// A half-open `[start, end)` span of time-of-day, interpreted within a
/// single calendar day (does not wrap past midnight).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
  pub start: NaiveTime,
  pub end: NaiveTime,
}

/// The set of instants a redistributed commit is allowed to land on: every
/// day in `dates` whose weekday is in `weekdays` (or every weekday, if
/// `weekdays` is `None`), crossed with every window in `times`. Dates and
/// times are interpreted as UTC; timestamps are always written with a
/// `+0000` offset (DESIGN.md records this as a resolved ambiguity - the spec
/// is silent on timezone handling for redistributed dates).
pub struct Timelapse {
  /// Sorted, non-overlapping `(start_epoch, end_epoch)` cells.
  cells: Vec<(i64, i64)>,
}

impl Timelapse {
  pub fn build(dates: &[DateRange], times: &[TimeWindow], weekdays: Option<&HashSet<Weekday>>) -> Self {
    let mut cells = Vec::new();
    for range in dates {
      let mut day = range.start;
      while day < range.end {
        let allowed = weekdays.map(|set| set.contains(&day.weekday())).unwrap_or(true);
        if allowed {
          for window in times {
            let day_start = NaiveDateTime::new(day, window.start);
            let day_end = NaiveDateTime::new(day, window.end);
            if day_end > day_start {
              cells.push((day_start.and_utc().timestamp(), day_end.and_utc().timestamp()));
            }
          }
        }
        day = match day.succ_opt() {
          Some(next) => next,
          None => break,
        };
      }
    }
    cells.sort_unstable_by_key(|&(start, _)| start);
    Self { cells }
  }

  pub fn total_seconds(&self) -> i64 {
    self.cells.iter().map(|&(start, end)| end - start).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.total_seconds() <= 0
  }

  /// Maps an offset in `[0, total_seconds())` to the corresponding instant,
  /// walking the sorted cells and subtracting each one's width in turn.
  pub fn datetime_from_seconds(&self, mut offset: i64) -> Option<i64> {
    if offset < 0 {
      return None;
    }
    for &(start, end) in &self.cells {
      let width = end - start;
      if offset < width {
        return Some(start + offset);
      }
      offset -= width;
    }
    None
  }
}

/// Draws one uniform offset per row, sorts the draws ascending, and assigns
/// the k-th smallest draw to the k-th row (in display order), setting both
/// `authored_date` and `committed_date` to the same `+0000` instant. Recorded
/// as a single history event, so one `undo()` reverts the whole batch.
pub fn reorder_commits(model: &mut EditableModel, timelapse: &Timelapse, rng: &mut impl Rng) -> Vec<i64> {
  let total = timelapse.total_seconds().max(1);
  let n = model.row_count();
  let mut offsets: Vec<i64> = (0..n).map(|_| rng.gen_range(0..total)).collect();
  offsets.sort_unstable();

  model.start_history_event();
  let mut assigned = Vec::with_capacity(n);
  for (row, offset) in offsets.into_iter().enumerate() {
    let epoch = timelapse.datetime_from_seconds(offset).unwrap_or(0);
    assigned.push(epoch);
    let tz = "+0000".to_string();
    let _ = model.set_data(row, Column::AuthoredDate, EditValue::Time(epoch, tz.clone()));
    let _ = model.set_data(row, Column::CommittedDate, EditValue::Time(epoch, tz));
  }
  assigned
}
