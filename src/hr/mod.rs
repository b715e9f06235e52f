//! HR records and the feature hooks built on the collection client.

pub mod leaves;
pub mod models;
pub mod timesheet;

pub use leaves::{working_days, EmployeeLeaves, LeaveBalance, LeaveError, LeaveRequest};
pub use models::*;
pub use timesheet::{TimesheetError, Timesheets, WeekId, WeeklyAllocation, MAX_DAYS_PER_WEEK};
