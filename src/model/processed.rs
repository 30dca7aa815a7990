use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema,
    strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DayStatus {
    Present,
    Absent,
    Incomplete,
    Holiday,
    Off,
    Overtime,
}

/// Derived, read-only view of one calendar day. Minutes are exact; hours are
/// the same values in quarter-hour steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "date": "2026-03-02",
    "status": "present",
    "check_in": "08:20",
    "check_out": "18:10",
    "regular_minutes": 520,
    "overtime_minutes": 60,
    "regular_hours": 8.75,
    "overtime_hours": 1.0,
    "detailed_status": "present,late,overtime"
}))]
pub struct ProcessedAttendance {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub status: DayStatus,
    pub check_in: Option<String>,
    pub check_out: Option<String>,
    pub regular_minutes: i64,
    pub overtime_minutes: i64,
    pub regular_hours: f64,
    pub overtime_hours: f64,
    pub detailed_status: String,
}

impl ProcessedAttendance {
    pub fn new(date: NaiveDate, status: DayStatus) -> Self {
        Self {
            date,
            status,
            check_in: None,
            check_out: None,
            regular_minutes: 0,
            overtime_minutes: 0,
            regular_hours: 0.0,
            overtime_hours: 0.0,
            detailed_status: status.to_string(),
        }
    }

    pub fn with_minutes(mut self, regular: i64, overtime: i64) -> Self {
        self.regular_minutes = regular;
        self.overtime_minutes = overtime;
        self.regular_hours = minutes_to_hours(regular);
        self.overtime_hours = minutes_to_hours(overtime);
        self
    }

    /// Counts toward `total_present` in payroll summaries.
    pub fn is_present(&self) -> bool {
        self.status == DayStatus::Present
    }
}

/// Hours are reported in quarter-hour steps. Quarters are exact in binary
/// floating point, so daily hours add up to period totals in any order.
pub const HOUR_QUANTUM_MINUTES: i64 = 15;

/// Whole quarter-hours in `minutes`, rounded half-up.
pub fn quarter_hours(minutes: i64) -> i64 {
    (minutes.max(0) * 2 + HOUR_QUANTUM_MINUTES) / (2 * HOUR_QUANTUM_MINUTES)
}

pub fn minutes_to_hours(minutes: i64) -> f64 {
    quarter_hours(minutes) as f64 / 4.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hours_step_in_quarters_half_up() {
        assert_eq!(minutes_to_hours(0), 0.0);
        assert_eq!(minutes_to_hours(7), 0.0);
        assert_eq!(minutes_to_hours(8), 0.25);
        assert_eq!(minutes_to_hours(520), 8.75);
        assert_eq!(minutes_to_hours(540), 9.0);
    }
}
