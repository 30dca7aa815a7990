use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::model::leave_request::LeaveKind;
use crate::model::payroll::{PayrollPeriod, PayrollSummary};
use crate::model::processed::{DayStatus, ProcessedAttendance, quarter_hours};

/// Rolls processed days and approved leave into payroll period totals.
#[derive(Debug, Clone, Default)]
pub struct PayrollPeriodSummarizer;

impl PayrollPeriodSummarizer {
    pub fn new() -> Self {
        Self
    }

    /// `days` must come from the aggregator for exactly this period. Approved
    /// leave removes a working day from absence whether or not any attendance
    /// was recorded for it.
    pub fn summarize(
        &self,
        employee_id: u64,
        period: PayrollPeriod,
        days: &[ProcessedAttendance],
        approved_leave: &BTreeMap<NaiveDate, LeaveKind>,
    ) -> PayrollSummary {
        let mut working = 0u32;
        let mut present = 0u32;
        let mut on_leave = 0u32;
        let mut regular_minutes = 0i64;
        let mut overtime_minutes = 0i64;
        // hours are the sum of each day's reported hours, never re-rounded
        let mut regular_quarters = 0i64;
        let mut overtime_quarters = 0i64;

        for day in days.iter().filter(|d| d.date >= period.start && d.date <= period.end) {
            regular_minutes += day.regular_minutes;
            overtime_minutes += day.overtime_minutes;
            regular_quarters += quarter_hours(day.regular_minutes);
            overtime_quarters += quarter_hours(day.overtime_minutes);

            let is_working_day = matches!(
                day.status,
                DayStatus::Present | DayStatus::Absent | DayStatus::Incomplete
            );
            if !is_working_day {
                continue;
            }
            working += 1;
            if day.is_present() {
                present += 1;
            } else if approved_leave.contains_key(&day.date) {
                on_leave += 1;
            }
        }

        PayrollSummary {
            employee_id,
            period,
            total_working_days: working,
            total_present: present,
            total_absent: working - present - on_leave,
            total_leave_days: on_leave,
            total_regular_minutes: regular_minutes,
            total_overtime_minutes: overtime_minutes,
            total_regular_hours: regular_quarters as f64 / 4.0,
            total_overtime_hours: overtime_quarters as f64 / 4.0,
            degraded: false,
        }
    }
}
