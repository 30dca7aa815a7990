use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Shift codes in this group observe public holidays one day early.
const HOLIDAY_EVE_SHIFT_CODE: &str = "104";

/// Days of the week a shift is worked on, stored as a bitmask (bit 0 = Sunday).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct WorkDays(u8);

impl WorkDays {
    pub const MONDAY_TO_FRIDAY: WorkDays = WorkDays(0b0011_1110);
    pub const EVERY_DAY: WorkDays = WorkDays(0b0111_1111);

    /// Builds the set from day numbers 0-6 (0 = Sunday). Out-of-range days are rejected.
    pub fn from_days(days: &[u8]) -> Option<Self> {
        let mut mask = 0u8;
        for &day in days {
            if day > 6 {
                return None;
            }
            mask |= 1 << day;
        }
        Some(WorkDays(mask))
    }

    /// Parses the comma separated form kept in the `shifts.work_days` column, e.g. `"1,2,3,4,5"`.
    pub fn parse(raw: &str) -> Option<Self> {
        let days = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<u8>().ok())
            .collect::<Option<Vec<_>>>()?;
        Self::from_days(&days)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        let day = date.weekday().num_days_from_sunday();
        self.0 & (1 << day) != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "code": "A1",
    "name": "Day shift",
    "start_time": "08:00:00",
    "end_time": "17:00:00",
    "work_days": 62
}))]
pub struct ShiftDefinition {
    pub code: String,
    pub name: String,
    #[schema(value_type = String, format = "time")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, format = "time")]
    pub end_time: NaiveTime,
    pub work_days: WorkDays,
}

impl ShiftDefinition {
    pub fn is_overnight(&self) -> bool {
        self.end_time < self.start_time
    }

    /// Whether this shift group observes public holidays on the day before.
    pub fn observes_holiday_eve(&self) -> bool {
        self.code == HOLIDAY_EVE_SHIFT_CODE
    }

    pub fn is_work_day(&self, date: NaiveDate) -> bool {
        self.work_days.contains(date)
    }

    /// Absolute start/end for the shift beginning on `date`.
    pub fn window_on(&self, date: NaiveDate) -> TimeWindow {
        let start = date.and_time(self.start_time);
        let mut end = date.and_time(self.end_time);
        if self.is_overnight() {
            end += Duration::days(1);
        }
        TimeWindow { start, end }
    }
}

/// Half-open interval `[start, end)` between two absolute instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TimeWindow {
    #[schema(value_type = String, format = "date-time")]
    pub start: NaiveDateTime,
    #[schema(value_type = String, format = "date-time")]
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Same window widened by the given tolerances on each side.
    pub fn widened(&self, before: Duration, after: Duration) -> TimeWindow {
        TimeWindow {
            start: self.start - before,
            end: self.end + after,
        }
    }

    /// Inclusive containment, matching how check-in tolerances are quoted to employees.
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        at >= self.start && at <= self.end
    }

    pub fn overlap_minutes(&self, from: NaiveDateTime, to: NaiveDateTime) -> i64 {
        let start = from.max(self.start);
        let end = to.min(self.end);
        if end > start {
            (end - start).num_minutes()
        } else {
            0
        }
    }
}

/// A one-day shift override for an employee. Only approved ones affect resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ShiftAdjustment {
    pub id: u64,
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub shift: ShiftDefinition,
    pub status: ApprovalStatus,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema,
    strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shift(start: (u32, u32), end: (u32, u32)) -> ShiftDefinition {
        ShiftDefinition {
            code: "T".into(),
            name: "Test".into(),
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            work_days: WorkDays::MONDAY_TO_FRIDAY,
        }
    }

    #[test]
    fn overnight_end_lands_on_next_day() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        for (start, end) in [((22, 0), (6, 0)), ((23, 30), (0, 15)), ((14, 0), (13, 59))] {
            let window = shift(start, end).window_on(date);
            assert_eq!(window.start.date(), date);
            assert_eq!(window.end.date(), date.succ_opt().unwrap());
            assert!(window.duration() > Duration::zero());
        }
    }

    #[test]
    fn day_shift_stays_on_same_date() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let window = shift((8, 0), (17, 0)).window_on(date);
        assert_eq!(window.end.date(), date);
        assert_eq!(window.duration(), Duration::hours(9));
    }

    #[test]
    fn work_days_parse_and_contains() {
        let days = WorkDays::parse("1, 2,3,4,5").unwrap();
        assert_eq!(days, WorkDays::MONDAY_TO_FRIDAY);
        // 2026-03-14 is a Saturday
        assert!(!days.contains(NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()));
        assert!(days.contains(NaiveDate::from_ymd_opt(2026, 3, 13).unwrap()));
        assert!(WorkDays::parse("1,9").is_none());
        assert!(WorkDays::parse("x").is_none());
    }

    #[test]
    fn overlap_is_clamped_to_window() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let window = shift((8, 0), (17, 0)).window_on(date);
        let at = |h, m| date.and_hms_opt(h, m, 0).unwrap();
        assert_eq!(window.overlap_minutes(at(7, 0), at(18, 0)), 9 * 60);
        assert_eq!(window.overlap_minutes(at(9, 0), at(10, 30)), 90);
        assert_eq!(window.overlap_minutes(at(18, 0), at(19, 0)), 0);
    }
}
