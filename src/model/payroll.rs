use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Day of month on which every payroll period closes.
pub const PERIOD_CLOSING_DAY: u32 = 25;

/// A 26th-to-25th salary cycle, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PayrollPeriod {
    #[schema(value_type = String, format = "date")]
    pub start: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end: NaiveDate,
}

impl PayrollPeriod {
    /// Period closing on the 25th of `year`/`month`.
    pub fn ending_in(year: i32, month: u32) -> Option<Self> {
        let end = NaiveDate::from_ymd_opt(year, month, PERIOD_CLOSING_DAY)?;
        let start = (end - Months::new(1)).succ_opt()?;
        Some(Self { start, end })
    }

    pub fn containing(date: NaiveDate) -> Option<Self> {
        if date.day() <= PERIOD_CLOSING_DAY {
            Self::ending_in(date.year(), date.month())
        } else {
            let next = date.with_day(1)? + Months::new(1);
            Self::ending_in(next.year(), next.month())
        }
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |d| *d <= self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "employee_id": 42,
    "period": { "start": "2026-02-26", "end": "2026-03-25" },
    "total_working_days": 20,
    "total_present": 18,
    "total_absent": 1,
    "total_leave_days": 1,
    "total_regular_minutes": 9510,
    "total_overtime_minutes": 360,
    "total_regular_hours": 158.5,
    "total_overtime_hours": 6.0,
    "degraded": false
}))]
pub struct PayrollSummary {
    pub employee_id: u64,
    pub period: PayrollPeriod,
    pub total_working_days: u32,
    pub total_present: u32,
    pub total_absent: u32,
    pub total_leave_days: u32,
    pub total_regular_minutes: i64,
    pub total_overtime_minutes: i64,
    pub total_regular_hours: f64,
    pub total_overtime_hours: f64,
    /// Leave or holiday data fell back to defaults; recompute once collaborators recover.
    pub degraded: bool,
}
