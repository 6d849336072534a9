//! Timelapse Redistributor tests (§4.D, §8): admissibility, monotonicity,
//! and the nondecreasing row-order assignment `reorder_commits` produces.

use crate::base_model::BaseModel;
use crate::model::{Column, EditableModel};
use crate::repo::Repository;
use crate::timelapse::{DateRange, Timelapse, TimeWindow, reorder_commits};
use chrono::{NaiveDate, NaiveTime};
use git_executor::git_command_executor::GitCommandExecutor;
use pretty_assertions::assert_eq;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::Path;
use test_log::test;
use test_utils::fixtures::linear_history;

fn repo_for(path: &Path) -> Repository {
  Repository::new(GitCommandExecutor::new(), path.to_string_lossy().to_string())
}

fn one_day_one_window() -> Timelapse {
  let dates = [DateRange { start: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(), end: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap() }];
  let times = [TimeWindow { start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(), end: NaiveTime::from_hms_opt(17, 0, 0).unwrap() }];
  Timelapse::build(&dates, &times, None)
}

#[test]
fn total_seconds_is_the_sum_of_every_admissible_window() {
  // 2024-03-04 is a Monday; two business days x one 8-hour window each.
  let dates = [
    DateRange { start: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(), end: NaiveDate::from_ymd_opt(2024, 3, 6).unwrap() },
  ];
  let times = [TimeWindow { start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(), end: NaiveTime::from_hms_opt(17, 0, 0).unwrap() }];
  let timelapse = Timelapse::build(&dates, &times, None);
  assert_eq!(timelapse.total_seconds(), 2 * 8 * 3600);
}

#[test]
fn weekday_filter_excludes_disallowed_days() {
  use chrono::Weekday;
  use std::collections::HashSet;
  // 2024-03-04..2024-03-11 spans a full week (Mon..Sun); restrict to weekdays only.
  let dates = [DateRange { start: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(), end: NaiveDate::from_ymd_opt(2024, 3, 11).unwrap() }];
  let times = [TimeWindow { start: NaiveTime::from_hms_opt(0, 0, 0).unwrap(), end: NaiveTime::from_hms_opt(1, 0, 0).unwrap() }];
  let mut weekdays = HashSet::new();
  weekdays.insert(Weekday::Mon);
  weekdays.insert(Weekday::Tue);
  weekdays.insert(Weekday::Wed);
  weekdays.insert(Weekday::Thu);
  weekdays.insert(Weekday::Fri);
  let timelapse = Timelapse::build(&dates, &times, Some(&weekdays));
  assert_eq!(timelapse.total_seconds(), 5 * 3600);
}

#[test]
fn datetime_from_seconds_is_monotone_and_stays_inside_a_configured_window() {
  let timelapse = one_day_one_window();
  let total = timelapse.total_seconds();
  assert!(total > 0);

  let day_start = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap().and_hms_opt(9, 0, 0).unwrap().and_utc().timestamp();
  let day_end = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap().and_hms_opt(17, 0, 0).unwrap().and_utc().timestamp();

  let mut previous = None;
  for offset in (0..total).step_by(600) {
    let instant = timelapse.datetime_from_seconds(offset).unwrap();
    assert!(instant >= day_start && instant < day_end);
    if let Some(prev) = previous {
      assert!(instant >= prev);
    }
    previous = Some(instant);
  }
}

#[test]
fn datetime_from_seconds_rejects_offsets_past_the_end() {
  let timelapse = one_day_one_window();
  assert!(timelapse.datetime_from_seconds(timelapse.total_seconds()).is_none());
  assert!(timelapse.datetime_from_seconds(-1).is_none());
}

#[test]
fn reorder_commits_assigns_a_nondecreasing_sequence_in_row_order() {
  let history = linear_history(6);
  let base = BaseModel::load(&repo_for(history.repo.path()), "master").unwrap();
  let mut model = EditableModel::from_base(base);
  let timelapse = one_day_one_window();
  let mut rng = ChaCha8Rng::seed_from_u64(7);

  let assigned = reorder_commits(&mut model, &timelapse, &mut rng);

  assert_eq!(assigned.len(), model.row_count());
  for window in assigned.windows(2) {
    assert!(window[0] <= window[1]);
  }
  for (row, &epoch) in assigned.iter().enumerate() {
    let data = model.data(row, Column::AuthoredDate).unwrap();
    assert_eq!(data.as_time().unwrap().epoch, epoch);
    let committed = model.data(row, Column::CommittedDate).unwrap();
    assert_eq!(committed.as_time().unwrap().epoch, epoch);
  }
}

#[test]
fn reorder_commits_records_a_single_undoable_history_event() {
  let history = linear_history(3);
  let base = BaseModel::load(&repo_for(history.repo.path()), "master").unwrap();
  let mut model = EditableModel::from_base(base);
  let timelapse = one_day_one_window();
  let mut rng = ChaCha8Rng::seed_from_u64(1);

  let originals: Vec<i64> = (0..model.row_count()).map(|r| model.data(r, Column::AuthoredDate).unwrap().as_time().unwrap().epoch).collect();
  reorder_commits(&mut model, &timelapse, &mut rng);
  assert!(model.can_undo());
  model.undo();
  assert!(!model.can_undo());
  for (row, original) in originals.into_iter().enumerate() {
    assert_eq!(model.data(row, Column::AuthoredDate).unwrap().as_time().unwrap().epoch, original);
  }
}
