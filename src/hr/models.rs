//! Records stored in the HR collections.
//!
//! Foreign keys (`employeeId`, `companyId`, `projectId`) are plain document
//! ids; nothing enforces that the referenced document exists.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::client::Collection;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmployeeStatus {
  #[default]
  Active,
  OnLeave,
  Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
  pub first_name: String,
  pub last_name: String,
  pub email: String,
  #[serde(default)]
  pub department: Option<String>,
  #[serde(default)]
  pub position: Option<String>,
  #[serde(default)]
  pub status: EmployeeStatus,
  #[serde(default)]
  pub hire_date: Option<NaiveDate>,
  #[serde(default)]
  pub manager_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated_at: Option<String>,
}

impl Employee {
  pub fn full_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name)
  }
}

impl Collection for Employee {
  const NAME: &'static str = "employees";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveType {
  Paid,
  Sick,
  Unpaid,
  Parental,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveStatus {
  #[default]
  Pending,
  Approved,
  Rejected,
  Cancelled,
}

impl LeaveStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      LeaveStatus::Pending => "pending",
      LeaveStatus::Approved => "approved",
      LeaveStatus::Rejected => "rejected",
      LeaveStatus::Cancelled => "cancelled",
    }
  }

  /// Pending and approved leaves block the calendar.
  pub fn is_active(self) -> bool {
    matches!(self, LeaveStatus::Pending | LeaveStatus::Approved)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Leave {
  pub employee_id: String,
  pub leave_type: LeaveType,
  pub start_date: NaiveDate,
  pub end_date: NaiveDate,
  #[serde(default)]
  pub status: LeaveStatus,
  /// Working days covered, computed at request time
  #[serde(default)]
  pub days: u32,
  #[serde(default)]
  pub reason: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated_at: Option<String>,
}

impl Collection for Leave {
  const NAME: &'static str = "leaves";
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimesheetStatus {
  #[default]
  Draft,
  Submitted,
  Approved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectAllocation {
  pub project_id: String,
  pub days: f64,
}

/// One employee's project allocation for one ISO week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timesheet {
  pub employee_id: String,
  /// ISO week, e.g. `2026-W42`
  pub week: String,
  #[serde(default)]
  pub allocations: Vec<ProjectAllocation>,
  #[serde(default)]
  pub status: TimesheetStatus,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated_at: Option<String>,
}

impl Collection for Timesheet {
  const NAME: &'static str = "timesheets";
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeStatus {
  Active,
  #[default]
  Pending,
  Revoked,
  Lost,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
  pub employee_id: String,
  pub badge_number: String,
  #[serde(default)]
  pub status: BadgeStatus,
  #[serde(default)]
  pub access_zones: Vec<String>,
  #[serde(default)]
  pub issued_on: Option<NaiveDate>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated_at: Option<String>,
}

impl Collection for Badge {
  const NAME: &'static str = "badges";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractType {
  Permanent,
  FixedTerm,
  Internship,
  Freelance,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
  #[default]
  Draft,
  Active,
  Ended,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
  pub employee_id: String,
  pub company_id: String,
  pub contract_type: ContractType,
  pub start_date: NaiveDate,
  #[serde(default)]
  pub end_date: Option<NaiveDate>,
  #[serde(default)]
  pub annual_salary: Option<f64>,
  #[serde(default)]
  pub status: ContractStatus,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated_at: Option<String>,
}

impl Collection for Contract {
  const NAME: &'static str = "contracts";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
  pub name: String,
  #[serde(default)]
  pub registration_number: Option<String>,
  #[serde(default)]
  pub address: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated_at: Option<String>,
}

impl Collection for Company {
  const NAME: &'static str = "companies";
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStatus {
  #[default]
  Planned,
  InProgress,
  Completed,
  Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Training {
  pub title: String,
  #[serde(default)]
  pub provider: Option<String>,
  #[serde(default)]
  pub participant_ids: Vec<String>,
  pub start_date: NaiveDate,
  #[serde(default)]
  pub end_date: Option<NaiveDate>,
  #[serde(default)]
  pub status: TrainingStatus,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated_at: Option<String>,
}

impl Collection for Training {
  const NAME: &'static str = "trainings";
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
  #[default]
  Scheduled,
  Completed,
  Acknowledged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
  pub employee_id: String,
  pub evaluator_id: String,
  /// Review period label, e.g. `2026-H1`
  pub period: String,
  #[serde(default)]
  pub score: Option<u8>,
  #[serde(default)]
  pub comments: Option<String>,
  #[serde(default)]
  pub status: EvaluationStatus,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated_at: Option<String>,
}

impl Collection for Evaluation {
  const NAME: &'static str = "evaluations";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
  pub name: String,
  #[serde(default)]
  pub category: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated_at: Option<String>,
}

impl Collection for Skill {
  const NAME: &'static str = "skills";
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
  #[default]
  Active,
  OnHold,
  Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
  pub name: String,
  pub code: String,
  #[serde(default)]
  pub company_id: Option<String>,
  #[serde(default)]
  pub status: ProjectStatus,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated_at: Option<String>,
}

impl Collection for Project {
  const NAME: &'static str = "projects";
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_leave_wire_shape() {
    let leave = Leave {
      employee_id: "e1".into(),
      leave_type: LeaveType::Paid,
      start_date: NaiveDate::from_ymd_opt(2026, 8, 3).unwrap(),
      end_date: NaiveDate::from_ymd_opt(2026, 8, 7).unwrap(),
      status: LeaveStatus::Pending,
      days: 5,
      reason: None,
      created_at: None,
      updated_at: None,
    };
    assert_eq!(
      serde_json::to_value(&leave).unwrap(),
      json!({
        "employeeId": "e1",
        "leaveType": "paid",
        "startDate": "2026-08-03",
        "endDate": "2026-08-07",
        "status": "pending",
        "days": 5,
        "reason": null
      })
    );
  }

  #[test]
  fn test_employee_defaults_from_sparse_record() {
    let employee: Employee = serde_json::from_value(json!({
      "firstName": "Ada",
      "lastName": "Lovelace",
      "email": "ada@example.com",
      "updatedAt": "2026-01-01T00:00:00.000Z"
    }))
    .unwrap();
    assert_eq!(employee.status, EmployeeStatus::Active);
    assert_eq!(employee.full_name(), "Ada Lovelace");
    assert!(employee.updated_at.is_some());
  }

  #[test]
  fn test_status_strings_match_serde() {
    for status in [
      LeaveStatus::Pending,
      LeaveStatus::Approved,
      LeaveStatus::Rejected,
      LeaveStatus::Cancelled,
    ] {
      assert_eq!(serde_json::to_value(status).unwrap(), json!(status.as_str()));
    }
  }
}
