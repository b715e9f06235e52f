//! Weekly project-hours allocation.
//!
//! An employee splits at most five working days per ISO week across
//! projects, in half-day steps.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use super::models::{ProjectAllocation, Timesheet, TimesheetStatus};
use crate::client::{CollectionClient, CollectionError, Updated};
use crate::store::{Criteria, Document, SearchOptions};

/// Upper bound on allocated days in one week.
pub const MAX_DAYS_PER_WEEK: f64 = 5.0;

#[derive(Debug, Error)]
pub enum TimesheetError {
  #[error(transparent)]
  Collection(#[from] CollectionError),

  #[error("Invalid ISO week {0:?}, expected e.g. 2026-W42")]
  InvalidWeek(String),

  #[error("Invalid amount {0}: days must be a non-negative multiple of 0.5")]
  InvalidAmount(f64),

  #[error("Cannot allocate {requested} day(s), only {available} left this week")]
  OverAllocated { requested: f64, available: f64 },

  #[error("Timesheet for {week} is {status:?} and can no longer change")]
  Locked {
    week: WeekId,
    status: TimesheetStatus,
  },

  #[error("Timesheet for {0} has no allocation")]
  Empty(WeekId),
}

/// An ISO-8601 week, held as its Monday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WeekId {
  monday: NaiveDate,
}

impl WeekId {
  pub fn new(year: i32, week: u32) -> Option<Self> {
    NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).map(|monday| Self { monday })
  }

  /// The week a date falls in.
  pub fn containing(date: NaiveDate) -> Self {
    let offset = date.weekday().num_days_from_monday();
    Self {
      monday: date - chrono::Duration::days(i64::from(offset)),
    }
  }

  pub fn monday(&self) -> NaiveDate {
    self.monday
  }

  /// Monday to Friday.
  pub fn working_days(&self) -> Vec<NaiveDate> {
    self.monday.iter_days().take(5).collect()
  }

  pub fn year(&self) -> i32 {
    self.monday.iso_week().year()
  }

  pub fn week(&self) -> u32 {
    self.monday.iso_week().week()
  }
}

impl fmt::Display for WeekId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}-W{:02}", self.year(), self.week())
  }
}

impl FromStr for WeekId {
  type Err = TimesheetError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let invalid = || TimesheetError::InvalidWeek(s.to_string());
    let (year, week) = s.trim().split_once("-W").ok_or_else(invalid)?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let week: u32 = week.parse().map_err(|_| invalid())?;
    WeekId::new(year, week).ok_or_else(invalid)
  }
}

fn check_amount(days: f64) -> Result<(), TimesheetError> {
  if !days.is_finite() || days < 0.0 || (days * 2.0).fract() != 0.0 {
    return Err(TimesheetError::InvalidAmount(days));
  }
  Ok(())
}

/// Per-project split of one week, never above [`MAX_DAYS_PER_WEEK`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeeklyAllocation {
  allocations: Vec<ProjectAllocation>,
}

impl WeeklyAllocation {
  pub fn new() -> Self {
    Self::default()
  }

  /// Rebuild from stored allocations, re-checking every bound.
  pub fn from_allocations(allocations: Vec<ProjectAllocation>) -> Result<Self, TimesheetError> {
    let mut week = Self::new();
    for allocation in allocations {
      let already = week.days_for(&allocation.project_id);
      week.set(&allocation.project_id, already + allocation.days)?;
    }
    Ok(week)
  }

  pub fn total(&self) -> f64 {
    self.allocations.iter().map(|a| a.days).sum()
  }

  pub fn remaining(&self) -> f64 {
    MAX_DAYS_PER_WEEK - self.total()
  }

  pub fn days_for(&self, project_id: &str) -> f64 {
    self
      .allocations
      .iter()
      .find(|a| a.project_id == project_id)
      .map_or(0.0, |a| a.days)
  }

  /// Replace a project's share. Zero removes the project.
  ///
  /// On error the allocation is left as it was.
  pub fn set(&mut self, project_id: &str, days: f64) -> Result<(), TimesheetError> {
    check_amount(days)?;

    let others = self.total() - self.days_for(project_id);
    if others + days > MAX_DAYS_PER_WEEK {
      return Err(TimesheetError::OverAllocated {
        requested: days,
        available: MAX_DAYS_PER_WEEK - others,
      });
    }

    if days == 0.0 {
      self.remove(project_id);
      return Ok(());
    }

    match self.allocations.iter_mut().find(|a| a.project_id == project_id) {
      Some(existing) => existing.days = days,
      None => self.allocations.push(ProjectAllocation {
        project_id: project_id.to_string(),
        days,
      }),
    }
    Ok(())
  }

  /// Drop a project. Returns whether it was allocated.
  pub fn remove(&mut self, project_id: &str) -> bool {
    let before = self.allocations.len();
    self.allocations.retain(|a| a.project_id != project_id);
    self.allocations.len() != before
  }

  pub fn allocations(&self) -> &[ProjectAllocation] {
    &self.allocations
  }

  pub fn is_empty(&self) -> bool {
    self.allocations.is_empty()
  }

  pub fn into_allocations(self) -> Vec<ProjectAllocation> {
    self.allocations
  }
}

#[derive(Serialize)]
struct AllocationsPatch<'a> {
  allocations: &'a [ProjectAllocation],
}

#[derive(Serialize)]
struct StatusPatch {
  status: TimesheetStatus,
}

fn updated_stamp(updated: &Updated) -> Option<String> {
  updated
    .fields
    .get("updatedAt")
    .and_then(|v| v.as_str())
    .map(String::from)
}

/// Timesheet feature hooks over the `timesheets` collection.
#[derive(Clone)]
pub struct Timesheets {
  sheets: CollectionClient<Timesheet>,
}

impl Timesheets {
  pub fn new(sheets: CollectionClient<Timesheet>) -> Self {
    Self { sheets }
  }

  /// The sheet of one employee for one week, if any.
  pub async fn week(
    &self,
    employee_id: &str,
    week: WeekId,
  ) -> Result<Option<Document<Timesheet>>, TimesheetError> {
    let criteria = Criteria::field("employeeId", employee_id).and("week", week.to_string());
    let found = self
      .sheets
      .search(criteria, SearchOptions::default().limit(1))
      .await?;
    Ok(found.into_iter().next())
  }

  /// Set the days spent on a project, creating the sheet on first use.
  ///
  /// Returns `None` when there is no sheet and nothing to store, i.e. zero
  /// days for a week that has no sheet yet.
  pub async fn allocate(
    &self,
    employee_id: &str,
    week: WeekId,
    project_id: &str,
    days: f64,
  ) -> Result<Option<Document<Timesheet>>, TimesheetError> {
    let Some(mut doc) = self.week(employee_id, week).await? else {
      let mut allocation = WeeklyAllocation::new();
      allocation.set(project_id, days)?;
      if allocation.is_empty() {
        return Ok(None);
      }
      let sheet = Timesheet {
        employee_id: employee_id.to_string(),
        week: week.to_string(),
        allocations: allocation.into_allocations(),
        status: TimesheetStatus::Draft,
        created_at: None,
        updated_at: None,
      };
      let created = self.sheets.add(&sheet).await?;
      info!(id = %created.id, employee = employee_id, %week, "timesheet created");
      return Ok(Some(created));
    };

    if doc.data.status != TimesheetStatus::Draft {
      return Err(TimesheetError::Locked {
        week,
        status: doc.data.status,
      });
    }

    let mut allocation = WeeklyAllocation::from_allocations(doc.data.allocations.clone())?;
    allocation.set(project_id, days)?;
    let allocations = allocation.into_allocations();

    let updated = self
      .sheets
      .update(&doc.id, &AllocationsPatch {
        allocations: &allocations,
      })
      .await?;
    doc.data.allocations = allocations;
    doc.data.updated_at = updated_stamp(&updated);
    Ok(Some(doc))
  }

  /// Hand in a draft sheet with at least one allocation.
  pub async fn submit(
    &self,
    employee_id: &str,
    week: WeekId,
  ) -> Result<Document<Timesheet>, TimesheetError> {
    let mut doc = self
      .week(employee_id, week)
      .await?
      .ok_or(TimesheetError::Empty(week))?;

    if doc.data.status != TimesheetStatus::Draft {
      return Err(TimesheetError::Locked {
        week,
        status: doc.data.status,
      });
    }
    if doc.data.allocations.is_empty() {
      return Err(TimesheetError::Empty(week));
    }

    let updated = self
      .sheets
      .update(&doc.id, &StatusPatch {
        status: TimesheetStatus::Submitted,
      })
      .await?;
    doc.data.status = TimesheetStatus::Submitted;
    doc.data.updated_at = updated_stamp(&updated);
    info!(id = %doc.id, employee = employee_id, %week, "timesheet submitted");
    Ok(doc)
  }
}
