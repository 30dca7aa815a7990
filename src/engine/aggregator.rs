use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{NaiveDate, NaiveDateTime};

use crate::config::EngineSettings;
use crate::model::attendance::AttendanceRecord;
use crate::model::processed::{DayStatus, ProcessedAttendance};
use crate::model::shift::{ShiftDefinition, TimeWindow};
use crate::provider::is_observed_holiday;

/// An employee's shifts over a range: the assignment plus per-date approved adjustments.
#[derive(Debug, Clone)]
pub struct ShiftSchedule {
    pub assigned: ShiftDefinition,
    pub adjustments: BTreeMap<NaiveDate, ShiftDefinition>,
}

impl ShiftSchedule {
    pub fn uniform(assigned: ShiftDefinition) -> Self {
        Self {
            assigned,
            adjustments: BTreeMap::new(),
        }
    }

    pub fn for_date(&self, date: NaiveDate) -> &ShiftDefinition {
        self.adjustments.get(&date).unwrap_or(&self.assigned)
    }
}

/// Rounds to the nearest multiple of `granularity`, halves rounding up.
pub fn round_half_up(minutes: i64, granularity: i64) -> i64 {
    if minutes <= 0 || granularity <= 1 {
        return minutes.max(0);
    }
    (minutes + granularity / 2) / granularity * granularity
}

/// Regular/overtime minutes credited for one complete check-in/out pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditedTime {
    pub regular_minutes: i64,
    pub overtime_minutes: i64,
}

/// Turns raw daily records into one processed entry per calendar day.
#[derive(Debug, Clone)]
pub struct AttendanceAggregator {
    settings: EngineSettings,
}

impl AttendanceAggregator {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    /// Credited time for a pair against its shift window; extra closed overtime
    /// intervals are added without counting time already inside the pair.
    pub fn credit(
        &self,
        check_in: NaiveDateTime,
        check_out: NaiveDateTime,
        window: TimeWindow,
        overtime_intervals: &[(NaiveDateTime, NaiveDateTime)],
    ) -> CreditedTime {
        if check_out <= check_in {
            return CreditedTime {
                regular_minutes: 0,
                overtime_minutes: 0,
            };
        }

        let regular_minutes = window.overlap_minutes(check_in, check_out);
        let early = if check_in < window.start {
            (window.start.min(check_out) - check_in).num_minutes()
        } else {
            0
        };
        let late = if check_out > window.end {
            (check_out - window.end.max(check_in)).num_minutes()
        } else {
            0
        };
        let pair = TimeWindow {
            start: check_in,
            end: check_out,
        };
        let separate: i64 = overtime_intervals
            .iter()
            .map(|&(start, end)| (end - start).num_minutes() - pair.overlap_minutes(start, end))
            .sum();

        CreditedTime {
            regular_minutes,
            overtime_minutes: round_half_up(early + late + separate, self.settings.overtime_rounding_minutes),
        }
    }

    pub fn process(
        &self,
        records: &[AttendanceRecord],
        shifts: &ShiftSchedule,
        period_start: NaiveDate,
        period_end: NaiveDate,
        holidays: &BTreeSet<NaiveDate>,
    ) -> Vec<ProcessedAttendance> {
        let by_date: HashMap<NaiveDate, &AttendanceRecord> = records.iter().map(|r| (r.date, r)).collect();

        period_start
            .iter_days()
            .take_while(|d| *d <= period_end)
            .map(|date| {
                let shift = shifts.for_date(date);
                self.process_day(date, shift, by_date.get(&date).copied(), holidays)
            })
            .collect()
    }

    fn process_day(
        &self,
        date: NaiveDate,
        shift: &ShiftDefinition,
        record: Option<&AttendanceRecord>,
        holidays: &BTreeSet<NaiveDate>,
    ) -> ProcessedAttendance {
        let is_holiday = is_observed_holiday(holidays, date, shift);
        let is_work_day = shift.is_work_day(date) && !is_holiday;
        let off_status = if is_holiday { DayStatus::Holiday } else { DayStatus::Off };

        let Some(record) = record else {
            let status = if is_work_day { DayStatus::Absent } else { off_status };
            return ProcessedAttendance::new(date, status);
        };

        let window = record.shift_window().unwrap_or_else(|| shift.window_on(date));
        let overtime_intervals: Vec<_> = record
            .overtime_entries
            .iter()
            .filter_map(|e| e.closed_interval())
            .collect();

        let mut tokens: Vec<&str> = Vec::new();
        let (status, regular, overtime) = if !is_work_day {
            // any work on a day off is overtime
            let mut minutes: i64 = overtime_intervals.iter().map(|(s, e)| (*e - *s).num_minutes()).sum();
            if let (Some(check_in), Some(check_out)) = (record.regular_check_in, record.regular_check_out) {
                let pair = TimeWindow { start: check_in, end: check_out };
                minutes += pair.duration().num_minutes().max(0);
                minutes -= overtime_intervals
                    .iter()
                    .map(|&(s, e)| pair.overlap_minutes(s, e))
                    .sum::<i64>();
            }
            let minutes = round_half_up(minutes, self.settings.overtime_rounding_minutes);
            if minutes > 0 {
                tokens.push(if is_holiday { "holiday" } else { "day_off" });
                (DayStatus::Overtime, 0, minutes)
            } else {
                (off_status, 0, 0)
            }
        } else {
            match (record.regular_check_in, record.regular_check_out) {
                (Some(check_in), Some(check_out)) => {
                    let credited = self.credit(check_in, check_out, window, &overtime_intervals);
                    if record.flags.is_late_check_in || check_in > window.start + self.settings.late_grace {
                        tokens.push("late");
                    }
                    if record.flags.is_early_check_out || check_out < window.end {
                        tokens.push("early_checkout");
                    }
                    (DayStatus::Present, credited.regular_minutes, credited.overtime_minutes)
                }
                (None, None) => {
                    let minutes: i64 = overtime_intervals.iter().map(|(s, e)| (*e - *s).num_minutes()).sum();
                    (DayStatus::Absent, 0, round_half_up(minutes, self.settings.overtime_rounding_minutes))
                }
                _ => (DayStatus::Incomplete, 0, 0),
            }
        };

        if overtime > 0 && status != DayStatus::Overtime {
            tokens.push("overtime");
        }
        if record.flags.is_manual_entry {
            tokens.push("manual");
        }
        if record.flags.is_degraded {
            tokens.push("unverified");
        }

        let mut processed = ProcessedAttendance::new(date, status).with_minutes(regular, overtime);
        processed.check_in = record.regular_check_in.map(display_time);
        processed.check_out = record.regular_check_out.map(display_time);
        if !tokens.is_empty() {
            processed.detailed_status = format!("{},{}", status, tokens.join(","));
        }
        processed
    }
}

fn display_time(at: NaiveDateTime) -> String {
    at.format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::{CheckAction, PeriodType};
    use crate::model::shift::WorkDays;
    use crate::testing::{at, date, shift};

    fn aggregator() -> AttendanceAggregator {
        AttendanceAggregator::new(EngineSettings::default())
    }

    fn record(d: NaiveDate, check_in: Option<NaiveDateTime>, check_out: Option<NaiveDateTime>) -> AttendanceRecord {
        let mut r = AttendanceRecord::new(1, d, None);
        if let Some(t) = check_in {
            r.apply(CheckAction::CheckIn, PeriodType::Regular, None, t).unwrap();
        }
        if let Some(t) = check_out {
            r.apply(CheckAction::CheckOut, PeriodType::Regular, None, t).unwrap();
        }
        r
    }

    #[test]
    fn rounding_is_half_up_to_half_hours() {
        assert_eq!(round_half_up(0, 30), 0);
        assert_eq!(round_half_up(14, 30), 0);
        assert_eq!(round_half_up(15, 30), 30);
        assert_eq!(round_half_up(44, 30), 30);
        assert_eq!(round_half_up(45, 30), 60);
        assert_eq!(round_half_up(-5, 30), 0);
    }

    #[test]
    fn credit_splits_regular_and_overtime() {
        let d = date(2026, 3, 10);
        let window = shift("A1", (8, 0), (17, 0)).window_on(d);
        let credited = aggregator().credit(at(2026, 3, 10, 7, 40), at(2026, 3, 10, 18, 10), window, &[]);
        assert_eq!(credited.regular_minutes, 9 * 60);
        // 20 early + 70 late = 90
        assert_eq!(credited.overtime_minutes, 90);

        let again = aggregator().credit(at(2026, 3, 10, 7, 40), at(2026, 3, 10, 18, 10), window, &[]);
        assert_eq!(credited, again);
    }

    #[test]
    fn overnight_pair_uses_absolute_timestamps() {
        let d = date(2026, 3, 10);
        let window = shift("N1", (22, 0), (6, 0)).window_on(d);
        let credited = aggregator().credit(at(2026, 3, 10, 21, 50), at(2026, 3, 11, 6, 40), window, &[]);
        assert_eq!(credited.regular_minutes, 8 * 60);
        assert_eq!(credited.overtime_minutes, 60);
    }

    #[test]
    fn one_entry_per_day_with_statuses() {
        // Mon 2026-03-09 .. Sun 2026-03-15, holiday on Wednesday
        let holidays = BTreeSet::from([date(2026, 3, 11)]);
        let shifts = ShiftSchedule::uniform(shift("A1", (8, 0), (17, 0)));
        let records = vec![
            record(date(2026, 3, 9), Some(at(2026, 3, 9, 8, 20)), Some(at(2026, 3, 9, 17, 0))),
            record(date(2026, 3, 10), Some(at(2026, 3, 10, 8, 0)), None),
        ];

        let days = aggregator().process(&records, &shifts, date(2026, 3, 9), date(2026, 3, 15), &holidays);
        let statuses: Vec<_> = days.iter().map(|d| d.status).collect();
        assert_eq!(
            statuses,
            vec![
                DayStatus::Present,
                DayStatus::Incomplete,
                DayStatus::Holiday,
                DayStatus::Absent,
                DayStatus::Absent,
                DayStatus::Off,
                DayStatus::Off,
            ]
        );
        assert_eq!(days[0].detailed_status, "present,late");
        assert_eq!(days[0].check_in.as_deref(), Some("08:20"));
        assert_eq!(days[0].regular_minutes, 8 * 60 + 40);
        assert_eq!(days[1].regular_minutes, 0);
        assert_eq!(days[1].overtime_minutes, 0);
    }

    #[test]
    fn day_off_work_is_overtime() {
        let mut r = AttendanceRecord::new(1, date(2026, 3, 14), None);
        r.apply(CheckAction::CheckIn, PeriodType::Overtime, Some(4), at(2026, 3, 14, 9, 0)).unwrap();
        r.apply(CheckAction::CheckOut, PeriodType::Overtime, Some(4), at(2026, 3, 14, 12, 20)).unwrap();

        let shifts = ShiftSchedule::uniform(shift("A1", (8, 0), (17, 0)));
        let days = aggregator().process(&[r], &shifts, date(2026, 3, 14), date(2026, 3, 14), &BTreeSet::new());
        assert_eq!(days[0].status, DayStatus::Overtime);
        assert_eq!(days[0].overtime_minutes, 210);
        assert_eq!(days[0].overtime_hours, 3.5);
        assert_eq!(days[0].detailed_status, "overtime,day_off");
    }

    #[test]
    fn holiday_eve_shift_is_off_the_day_before() {
        let holidays = BTreeSet::from([date(2026, 3, 11)]);
        let mut eve = shift("104", (14, 0), (23, 0));
        eve.work_days = WorkDays::EVERY_DAY;
        let shifts = ShiftSchedule::uniform(eve);
        let days = aggregator().process(&[], &shifts, date(2026, 3, 10), date(2026, 3, 11), &holidays);
        assert_eq!(days[0].status, DayStatus::Holiday);
        assert_eq!(days[1].status, DayStatus::Absent);
    }

    #[test]
    fn adjustment_changes_the_window_for_one_date() {
        let mut shifts = ShiftSchedule::uniform(shift("A1", (8, 0), (17, 0)));
        shifts.adjustments.insert(date(2026, 3, 10), shift("B1", (12, 0), (21, 0)));
        let records = vec![record(date(2026, 3, 10), Some(at(2026, 3, 10, 12, 0)), Some(at(2026, 3, 10, 21, 0)))];
        let days = aggregator().process(&records, &shifts, date(2026, 3, 10), date(2026, 3, 10), &BTreeSet::new());
        assert_eq!(days[0].regular_minutes, 9 * 60);
        assert_eq!(days[0].overtime_minutes, 0);
        assert_eq!(days[0].detailed_status, "present");
    }
}
