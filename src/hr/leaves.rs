//! Employee leave requests, decisions and yearly allocation.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use super::models::{Leave, LeaveStatus, LeaveType};
use crate::client::{CollectionClient, CollectionError};
use crate::store::{Criteria, Direction, Document, SearchOptions};

#[derive(Debug, Error)]
pub enum LeaveError {
  #[error(transparent)]
  Collection(#[from] CollectionError),

  #[error("Leave ends on {end}, before it starts on {start}")]
  InvalidRange { start: NaiveDate, end: NaiveDate },

  #[error("Leave from {start} to {end} covers no working day")]
  NoWorkingDays { start: NaiveDate, end: NaiveDate },

  #[error("Leave overlaps existing leave {existing}")]
  Overlap { existing: String },

  #[error("Leave {0} not found")]
  NotFound(String),

  #[error("Cannot move a {} leave to {}", .from.as_str(), .to.as_str())]
  InvalidTransition { from: LeaveStatus, to: LeaveStatus },

  #[error("Year {0} is out of range")]
  InvalidYear(i32),
}

/// Monday to Friday days between `start` and `end`, both included.
pub fn working_days(start: NaiveDate, end: NaiveDate) -> u32 {
  start
    .iter_days()
    .take_while(|day| *day <= end)
    .filter(|day| day.weekday().number_from_monday() <= 5)
    .count() as u32
}

/// What an employee asks for.
#[derive(Debug, Clone)]
pub struct LeaveRequest {
  pub employee_id: String,
  pub leave_type: LeaveType,
  pub start: NaiveDate,
  pub end: NaiveDate,
  pub reason: Option<String>,
}

/// Paid-leave position of one employee for one year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveBalance {
  pub employee_id: String,
  pub year: i32,
  pub entitled: u32,
  pub taken: u32,
  pub pending: u32,
  /// Negative when the employee is over-booked
  pub remaining: i64,
}

#[derive(Serialize)]
struct StatusPatch {
  status: LeaveStatus,
}

/// Leave feature hooks over the `leaves` collection.
#[derive(Clone)]
pub struct EmployeeLeaves {
  leaves: CollectionClient<Leave>,
}

impl EmployeeLeaves {
  pub fn new(leaves: CollectionClient<Leave>) -> Self {
    Self { leaves }
  }

  /// Leaves of one employee, latest start first.
  pub async fn for_employee(&self, employee_id: &str) -> Result<Vec<Document<Leave>>, LeaveError> {
    let options = SearchOptions::default().order_by("startDate", Direction::Desc);
    Ok(self.leaves.search(("employeeId", employee_id), options).await?)
  }

  /// Leaves waiting for a decision, earliest start first.
  pub async fn pending(&self) -> Result<Vec<Document<Leave>>, LeaveError> {
    let options = SearchOptions::default().order_by("startDate", Direction::Asc);
    Ok(
      self
        .leaves
        .search(("status", LeaveStatus::Pending.as_str()), options)
        .await?,
    )
  }

  /// File a new pending leave.
  pub async fn request(&self, request: LeaveRequest) -> Result<Document<Leave>, LeaveError> {
    let LeaveRequest {
      employee_id,
      leave_type,
      start,
      end,
      reason,
    } = request;

    if end < start {
      return Err(LeaveError::InvalidRange { start, end });
    }
    let days = working_days(start, end);
    if days == 0 {
      return Err(LeaveError::NoWorkingDays { start, end });
    }

    let existing = self.for_employee(&employee_id).await?;
    if let Some(clash) = existing.iter().find(|doc| {
      doc.data.status.is_active() && doc.data.start_date <= end && start <= doc.data.end_date
    }) {
      return Err(LeaveError::Overlap {
        existing: clash.id.clone(),
      });
    }

    let leave = Leave {
      employee_id,
      leave_type,
      start_date: start,
      end_date: end,
      status: LeaveStatus::Pending,
      days,
      reason,
      created_at: None,
      updated_at: None,
    };
    let created = self.leaves.add(&leave).await?;
    info!(id = %created.id, employee = %created.data.employee_id, days, "leave requested");
    Ok(created)
  }

  pub async fn approve(&self, id: &str) -> Result<Document<Leave>, LeaveError> {
    self.transition(id, LeaveStatus::Approved).await
  }

  pub async fn reject(&self, id: &str) -> Result<Document<Leave>, LeaveError> {
    self.transition(id, LeaveStatus::Rejected).await
  }

  pub async fn cancel(&self, id: &str) -> Result<Document<Leave>, LeaveError> {
    self.transition(id, LeaveStatus::Cancelled).await
  }

  async fn transition(&self, id: &str, to: LeaveStatus) -> Result<Document<Leave>, LeaveError> {
    let mut doc = self
      .leaves
      .get_by_id(id)
      .await?
      .ok_or_else(|| LeaveError::NotFound(id.to_string()))?;

    let from = doc.data.status;
    let allowed = match to {
      LeaveStatus::Approved | LeaveStatus::Rejected => from == LeaveStatus::Pending,
      LeaveStatus::Cancelled => from.is_active(),
      LeaveStatus::Pending => false,
    };
    if !allowed {
      return Err(LeaveError::InvalidTransition { from, to });
    }

    let updated = self.leaves.update(id, &StatusPatch { status: to }).await?;
    doc.data.status = to;
    doc.data.updated_at = updated
      .fields
      .get("updatedAt")
      .and_then(|v| v.as_str())
      .map(String::from);

    info!(id, from = from.as_str(), to = to.as_str(), "leave status changed");
    Ok(doc)
  }

  /// Paid leave taken and booked against a yearly entitlement.
  ///
  /// Only working days inside `year` count, so a leave spanning New Year is
  /// split between the two years.
  pub async fn balance(
    &self,
    employee_id: &str,
    year: i32,
    entitlement: u32,
  ) -> Result<LeaveBalance, LeaveError> {
    let first = NaiveDate::from_ymd_opt(year, 1, 1).ok_or(LeaveError::InvalidYear(year))?;
    let last = NaiveDate::from_ymd_opt(year, 12, 31).ok_or(LeaveError::InvalidYear(year))?;

    let criteria = Criteria::field("employeeId", employee_id).and("leaveType", "paid");
    let leaves = self.leaves.search(criteria, SearchOptions::default()).await?;

    let mut taken = 0;
    let mut pending = 0;
    for doc in &leaves {
      let start = doc.data.start_date.max(first);
      let end = doc.data.end_date.min(last);
      if start > end {
        continue;
      }
      let days = working_days(start, end);
      match doc.data.status {
        LeaveStatus::Approved => taken += days,
        LeaveStatus::Pending => pending += days,
        LeaveStatus::Rejected | LeaveStatus::Cancelled => {}
      }
    }

    Ok(LeaveBalance {
      employee_id: employee_id.to_string(),
      year,
      entitled: entitlement,
      taken,
      pending,
      remaining: i64::from(entitlement) - i64::from(taken) - i64::from(pending),
    })
  }
}
