use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct LeaveRequest {
    pub id: u64,
    pub employee_id: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub leave_type: String,
    pub status: String,
}

impl LeaveRequest {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.status == "approved" && self.start_date <= date && date <= self.end_date
    }

    /// Unknown leave types still count as leave; they just carry no window adjustment.
    pub fn kind(&self) -> LeaveKind {
        self.leave_type.parse().unwrap_or(LeaveKind::Annual)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema,
    strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LeaveKind {
    Annual,
    Sick,
    Unpaid,
    /// Approved in advance for the second half of the shift.
    PlannedHalfDay,
    /// Approved on the day; releases the employee without an early check-out mark.
    Emergency,
}

impl LeaveKind {
    /// Full-day kinds exempt the whole date from attendance.
    pub fn is_full_day(&self) -> bool {
        matches!(self, LeaveKind::Annual | LeaveKind::Sick | LeaveKind::Unpaid)
    }
}
