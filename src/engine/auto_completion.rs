use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use rust_i18n::t;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::engine::shift_window::DaySchedule;
use crate::error::{EngineError, EngineResult};
use crate::model::attendance::{AttendanceRecord, CheckAction, PeriodType};
use crate::model::shift::TimeWindow;

/// The attempted action that exposed a gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Regular check-out with nothing checked in.
    RegularCheckOut,
    /// Overtime check-in while the regular period is still open.
    OvertimeCheckIn,
    /// First check-in of a new day while the previous day is still open.
    NextDayCheckIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RuleKey {
    missing_check_in: bool,
    missing_check_out: bool,
    has_overtime_window: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fill {
    RegularCheckIn,
    RegularCheckOut,
}

/// Which entries to propose for each combination of gaps. Kept as data so the
/// rule set can be read in one place.
static RULES: Lazy<HashMap<RuleKey, &'static [Fill]>> = Lazy::new(|| {
    use Fill::*;
    let rows: [((bool, bool, bool), &'static [Fill]); 8] = [
        ((false, false, false), &[]),
        ((false, false, true), &[]),
        ((true, false, false), &[RegularCheckIn]),
        ((true, false, true), &[RegularCheckIn]),
        ((false, true, false), &[RegularCheckOut]),
        ((false, true, true), &[RegularCheckOut]),
        ((true, true, false), &[RegularCheckIn, RegularCheckOut]),
        ((true, true, true), &[RegularCheckIn, RegularCheckOut]),
    ];
    rows.into_iter()
        .map(|((missing_check_in, missing_check_out, has_overtime_window), fills)| {
            (
                RuleKey {
                    missing_check_in,
                    missing_check_out,
                    has_overtime_window,
                },
                fills,
            )
        })
        .collect()
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CompletionEntry {
    #[serde(rename = "type")]
    pub entry_type: CheckAction,
    #[schema(value_type = String, format = "date-time")]
    pub suggested_time: NaiveDateTime,
    pub period_type: PeriodType,
    pub overtime_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CompletionProposal {
    pub requires_confirmation: bool,
    pub message: String,
    /// Attendance date the entries belong to.
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub entries: Vec<CompletionEntry>,
}

/// Proposes back-dated entries for periods an employee forgot to open or close.
#[derive(Debug, Clone, Default)]
pub struct AutoCompletionEngine;

impl AutoCompletionEngine {
    pub fn new() -> Self {
        Self
    }

    /// `Ok(None)` when nothing is missing. `Err(Validation)` when entries are
    /// missing but no safe proposal exists; the caller must route to manual
    /// correction.
    pub fn handle_missing_entries(
        &self,
        current: Option<&AttendanceRecord>,
        trigger: Trigger,
        now: NaiveDateTime,
        schedule: &DaySchedule,
        locale: &str,
    ) -> EngineResult<Option<CompletionProposal>> {
        let checked_in = current.is_some_and(|r| r.regular_check_in.is_some());
        let checked_out = current.is_some_and(|r| r.regular_check_out.is_some());

        let key = RuleKey {
            missing_check_in: trigger == Trigger::RegularCheckOut && !checked_in,
            missing_check_out: matches!(trigger, Trigger::OvertimeCheckIn | Trigger::NextDayCheckIn)
                && checked_in
                && !checked_out,
            has_overtime_window: schedule.overtime_window.is_some_and(|ot| ot.has_begun(now)),
        };
        let fills = RULES.get(&key).copied().unwrap_or_default();
        if fills.is_empty() {
            return Ok(None);
        }

        let window = schedule.regular_window;
        let entries: Vec<CompletionEntry> = fills
            .iter()
            .map(|fill| match fill {
                Fill::RegularCheckIn => CompletionEntry {
                    entry_type: CheckAction::CheckIn,
                    suggested_time: window.start,
                    period_type: PeriodType::Regular,
                    overtime_id: None,
                },
                Fill::RegularCheckOut => CompletionEntry {
                    entry_type: CheckAction::CheckOut,
                    suggested_time: regular_close_time(window, schedule.overtime_window.map(|ot| ot.window), now),
                    period_type: PeriodType::Regular,
                    overtime_id: None,
                },
            })
            .collect();

        let recorded_check_in = current.and_then(|r| r.regular_check_in);
        if let Err(reason) = validate(&entries, recorded_check_in, now, schedule) {
            warn!(
                employee_id = schedule.employee_id,
                date = %schedule.date,
                ?trigger,
                %reason,
                "Discarding auto-completion batch"
            );
            return Err(EngineError::Validation(reason));
        }

        info!(
            employee_id = schedule.employee_id,
            date = %schedule.date,
            entries = entries.len(),
            "Proposing auto-completion"
        );
        Ok(Some(CompletionProposal {
            requires_confirmation: true,
            message: compose_message(&entries, locale),
            date: schedule.date,
            entries,
        }))
    }
}

/// Where a proposed regular check-out lands: the shift end, or earlier when an
/// overtime window that has already begun starts inside the shift.
pub fn regular_close_time(regular: TimeWindow, overtime: Option<TimeWindow>, now: NaiveDateTime) -> NaiveDateTime {
    match overtime {
        Some(ot) if now >= ot.start && ot.start > regular.start => regular.end.min(ot.start),
        _ => regular.end,
    }
}

/// All-or-nothing gate applied to a proposed batch.
fn validate(
    entries: &[CompletionEntry],
    recorded_check_in: Option<NaiveDateTime>,
    now: NaiveDateTime,
    schedule: &DaySchedule,
) -> Result<(), String> {
    let mut previous = recorded_check_in;
    for entry in entries {
        if previous.is_some_and(|p| entry.suggested_time <= p) {
            return Err(format!("{} at {} is not after the preceding entry", entry.entry_type, entry.suggested_time));
        }
        if entry.suggested_time > now {
            return Err(format!("{} at {} is in the future", entry.entry_type, entry.suggested_time));
        }
        if !same_day_allowance(entry.suggested_time.date(), now, schedule) {
            return Err(format!("{} at {} crosses into another day", entry.entry_type, entry.suggested_time));
        }
        previous = Some(entry.suggested_time);
    }
    Ok(())
}

/// Entries must fall on `now`'s calendar day, except that an overnight shift
/// may still be completed on its start date the morning after.
fn same_day_allowance(entry_date: NaiveDate, now: NaiveDateTime, schedule: &DaySchedule) -> bool {
    let today = now.date();
    entry_date == today
        || (schedule.shift.is_overnight()
            && entry_date == schedule.date
            && schedule.date.succ_opt() == Some(today))
}

fn compose_message(entries: &[CompletionEntry], locale: &str) -> String {
    let mut lines = vec![t!("completion.header", locale = locale).to_string()];
    for period in [PeriodType::Regular, PeriodType::Overtime] {
        let group: Vec<_> = entries.iter().filter(|e| e.period_type == period).collect();
        if group.is_empty() {
            continue;
        }
        let title = match period {
            PeriodType::Regular => t!("completion.regular_period", locale = locale),
            PeriodType::Overtime => t!("completion.overtime_period", locale = locale),
        };
        lines.push(title.to_string());
        for entry in group {
            let action = match entry.entry_type {
                CheckAction::CheckIn => t!("completion.check_in", locale = locale),
                CheckAction::CheckOut => t!("completion.check_out", locale = locale),
            };
            let time = entry.suggested_time.format("%Y-%m-%d %H:%M").to_string();
            lines.push(t!("completion.entry", locale = locale, action = action, time = time).to_string());
        }
    }
    lines.push(t!("completion.confirm", locale = locale).to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::shift_window::ShiftSource;
    use crate::model::overtime::OvertimeWindow;
    use crate::testing::{at, date, shift};

    fn schedule(d: NaiveDate, start: (u32, u32), end: (u32, u32)) -> DaySchedule {
        let s = shift("A1", start, end);
        DaySchedule {
            employee_id: 3,
            date: d,
            regular_window: s.window_on(d),
            shift: s,
            source: ShiftSource::Assigned,
            overtime_window: None,
            is_work_day: true,
            is_holiday: false,
            is_day_off: false,
            degraded: false,
        }
    }

    fn checked_in(d: NaiveDate, when: NaiveDateTime) -> AttendanceRecord {
        let mut r = AttendanceRecord::new(3, d, None);
        r.apply(CheckAction::CheckIn, PeriodType::Regular, None, when).unwrap();
        r
    }

    fn assert_ordered_and_past(proposal: &CompletionProposal, now: NaiveDateTime) {
        assert!(proposal.entries.windows(2).all(|w| w[0].suggested_time < w[1].suggested_time));
        assert!(proposal.entries.iter().all(|e| e.suggested_time <= now));
    }

    #[test]
    fn checkout_without_checkin_proposes_shift_start() {
        let d = date(2026, 3, 10);
        let s = schedule(d, (8, 0), (17, 0));
        let now = at(2026, 3, 10, 17, 5);

        let proposal = AutoCompletionEngine::new()
            .handle_missing_entries(None, Trigger::RegularCheckOut, now, &s, "en")
            .unwrap()
            .unwrap();
        assert!(proposal.requires_confirmation);
        assert_eq!(proposal.entries.len(), 1);
        assert_eq!(proposal.entries[0].entry_type, CheckAction::CheckIn);
        assert_eq!(proposal.entries[0].suggested_time, at(2026, 3, 10, 8, 0));
        assert!(proposal.message.contains("08:00"));
        assert_ordered_and_past(&proposal, now);
    }

    #[test]
    fn overtime_start_proposes_regular_checkout() {
        let d = date(2026, 3, 10);
        let mut s = schedule(d, (8, 0), (17, 0));
        s.overtime_window = Some(OvertimeWindow {
            request_id: 5,
            window: TimeWindow {
                start: at(2026, 3, 10, 17, 30),
                end: at(2026, 3, 10, 20, 0),
            },
        });
        let record = checked_in(d, at(2026, 3, 10, 7, 55));
        let now = at(2026, 3, 10, 17, 40);

        let proposal = AutoCompletionEngine::new()
            .handle_missing_entries(Some(&record), Trigger::OvertimeCheckIn, now, &s, "en")
            .unwrap()
            .unwrap();
        assert_eq!(proposal.entries.len(), 1);
        assert_eq!(proposal.entries[0].entry_type, CheckAction::CheckOut);
        assert_eq!(proposal.entries[0].suggested_time, at(2026, 3, 10, 17, 0));
        assert_ordered_and_past(&proposal, now);
    }

    #[test]
    fn nothing_missing_yields_no_proposal() {
        let d = date(2026, 3, 10);
        let s = schedule(d, (8, 0), (17, 0));
        let record = checked_in(d, at(2026, 3, 10, 8, 0));
        let result = AutoCompletionEngine::new()
            .handle_missing_entries(Some(&record), Trigger::RegularCheckOut, at(2026, 3, 10, 17, 0), &s, "en")
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn future_suggestion_discards_batch() {
        let d = date(2026, 3, 10);
        let s = schedule(d, (8, 0), (17, 0));
        let record = checked_in(d, at(2026, 3, 10, 8, 0));
        // shift end is still ahead of now
        let err = AutoCompletionEngine::new()
            .handle_missing_entries(Some(&record), Trigger::OvertimeCheckIn, at(2026, 3, 10, 16, 0), &s, "en")
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn forgotten_evening_checkout_is_not_backfilled_next_day() {
        let d = date(2026, 3, 10);
        let s = schedule(d, (14, 0), (23, 0));
        let record = checked_in(d, at(2026, 3, 10, 14, 0));

        let err = AutoCompletionEngine::new()
            .handle_missing_entries(Some(&record), Trigger::NextDayCheckIn, at(2026, 3, 11, 13, 55), &s, "en")
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        // same evening it is still acceptable
        let proposal = AutoCompletionEngine::new()
            .handle_missing_entries(Some(&record), Trigger::NextDayCheckIn, at(2026, 3, 10, 23, 30), &s, "en")
            .unwrap()
            .unwrap();
        assert_eq!(proposal.entries[0].suggested_time, at(2026, 3, 10, 23, 0));
    }

    #[test]
    fn overnight_shift_may_be_completed_next_morning() {
        let d = date(2026, 3, 10);
        let s = schedule(d, (22, 0), (6, 0));
        let now = at(2026, 3, 11, 7, 0);

        let proposal = AutoCompletionEngine::new()
            .handle_missing_entries(None, Trigger::RegularCheckOut, now, &s, "en")
            .unwrap()
            .unwrap();
        assert_eq!(proposal.entries[0].suggested_time, at(2026, 3, 10, 22, 0));
        assert_ordered_and_past(&proposal, now);
    }

    #[test]
    fn suggestion_before_recorded_checkin_is_rejected() {
        let d = date(2026, 3, 10);
        let s = schedule(d, (8, 0), (17, 0));
        let entries = [CompletionEntry {
            entry_type: CheckAction::CheckOut,
            suggested_time: at(2026, 3, 10, 17, 0),
            period_type: PeriodType::Regular,
            overtime_id: None,
        }];
        assert!(validate(&entries, Some(at(2026, 3, 10, 17, 10)), at(2026, 3, 10, 18, 0), &s).is_err());
        assert!(validate(&entries, Some(at(2026, 3, 10, 8, 0)), at(2026, 3, 10, 18, 0), &s).is_ok());
    }

    #[test]
    fn message_is_localized_and_grouped() {
        let d = date(2026, 3, 10);
        let s = schedule(d, (8, 0), (17, 0));
        let proposal = AutoCompletionEngine::new()
            .handle_missing_entries(None, Trigger::RegularCheckOut, at(2026, 3, 10, 17, 5), &s, "zh-CN")
            .unwrap()
            .unwrap();
        assert!(proposal.message.contains("正常班次"));
        assert!(!proposal.message.contains("Overtime"));
    }
}
