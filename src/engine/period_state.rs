use chrono::NaiveDateTime;
use serde::Serialize;
use utoipa::ToSchema;

use crate::config::EngineSettings;
use crate::engine::auto_completion;
use crate::engine::shift_window::DaySchedule;
use crate::model::attendance::{AttendanceRecord, CheckAction, PeriodState, PeriodType};
use crate::model::leave_request::LeaveKind;
use crate::model::shift::TimeWindow;

pub const NO_ACTIVE_WINDOW: &str = "No active window found";
pub const PRESENCE_REQUIRED: &str = "Not in premises: a reason is required";
pub const OUTSIDE_WINDOW: &str = "Outside the allowed window";
pub const ALREADY_COMPLETED: &str = "Attendance already completed for this period";
pub const ON_LEAVE: &str = "Employee is on approved leave";
pub const REGULAR_STILL_OPEN: &str = "Check out of the regular period first";

/// Everything about the attempt besides the schedule and the stored record.
#[derive(Debug, Clone, Default)]
pub struct CheckContext {
    pub in_premises: bool,
    /// Address or free-text reason supplied when checking from outside the premises.
    pub manual_reason: Option<String>,
    pub leave: Option<LeaveKind>,
    pub leave_degraded: bool,
    /// `None` asks which action comes next.
    pub requested: Option<CheckAction>,
}

impl CheckContext {
    fn has_manual_reason(&self) -> bool {
        self.manual_reason.as_deref().is_some_and(|r| !r.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct DecisionFlags {
    pub is_late_check_in: bool,
    pub is_early_check_out: bool,
    pub is_overtime: bool,
    pub is_day_off_overtime: bool,
    pub is_planned_half_day_leave: bool,
    pub is_emergency_leave: bool,
    pub is_manual_entry: bool,
    pub is_degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CheckDecision {
    pub allowed: bool,
    pub reason: String,
    pub action: Option<CheckAction>,
    pub period_type: Option<PeriodType>,
    pub overtime_id: Option<u64>,
    /// The action implies a missing earlier entry; hand over to auto-completion.
    pub requires_completion: bool,
    pub flags: DecisionFlags,
}

impl CheckDecision {
    fn denied(reason: &str) -> Self {
        Self {
            allowed: false,
            reason: reason.to_string(),
            action: None,
            period_type: None,
            overtime_id: None,
            requires_completion: false,
            flags: DecisionFlags::default(),
        }
    }
}

/// A period that could take an action right now.
struct Candidate {
    period: PeriodType,
    overtime_id: Option<u64>,
    state: PeriodState,
    window: TimeWindow,
    in_range: bool,
}

impl Candidate {
    fn expected(&self) -> Option<CheckAction> {
        match self.state {
            PeriodState::Absent => Some(CheckAction::CheckIn),
            PeriodState::CheckedIn => Some(CheckAction::CheckOut),
            PeriodState::CheckedOut => None,
        }
    }

    fn open(&self) -> bool {
        self.in_range && self.state != PeriodState::CheckedOut
    }
}

/// Decides whether a check-in/out is permitted now, and for which period.
///
/// Regular: ABSENT → CHECKED_IN → CHECKED_OUT. Each approved overtime request
/// runs the same sub-machine independently, before, after or instead of the
/// regular one.
#[derive(Debug, Clone)]
pub struct PeriodStateMachine {
    settings: EngineSettings,
}

impl PeriodStateMachine {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    pub fn decide(
        &self,
        schedule: Option<&DaySchedule>,
        record: Option<&AttendanceRecord>,
        ctx: &CheckContext,
        now: NaiveDateTime,
    ) -> CheckDecision {
        let Some(schedule) = schedule else {
            return CheckDecision::denied(NO_ACTIVE_WINDOW);
        };

        let full_day_leave = ctx.leave.is_some_and(|k| k.is_full_day());
        let regular = schedule
            .working_window()
            .filter(|_| !full_day_leave)
            .map(|window| Candidate {
                period: PeriodType::Regular,
                overtime_id: None,
                state: record.map(AttendanceRecord::regular_state).unwrap_or(PeriodState::Absent),
                window,
                in_range: self.allowed_range(window).contains(now),
            });
        let overtime = schedule.overtime_window.map(|ot| Candidate {
            period: PeriodType::Overtime,
            overtime_id: Some(ot.request_id),
            state: record
                .map(|r| r.overtime_state(ot.request_id))
                .unwrap_or(PeriodState::Absent),
            window: ot.window,
            in_range: self.allowed_range(ot.window).contains(now),
        });

        if regular.is_none() && overtime.is_none() {
            return CheckDecision::denied(if full_day_leave { ON_LEAVE } else { NO_ACTIVE_WINDOW });
        }

        let (target, requires_completion) = match self.pick(regular.as_ref(), overtime.as_ref(), ctx.requested, now) {
            Ok(picked) => picked,
            Err(Some(reason)) => return CheckDecision::denied(reason),
            Err(None) => {
                let all_closed = regular.iter().chain(overtime.iter()).all(|c| c.state == PeriodState::CheckedOut);
                return CheckDecision::denied(if all_closed { ALREADY_COMPLETED } else { OUTSIDE_WINDOW });
            }
        };

        if !ctx.in_premises && !ctx.has_manual_reason() {
            return CheckDecision::denied(PRESENCE_REQUIRED);
        }

        let action = ctx.requested.or(target.expected()).unwrap_or(CheckAction::CheckIn);
        let flags = self.flags(schedule, &target, action, ctx, now);

        CheckDecision {
            allowed: true,
            reason: format!("{} {} allowed", target.period, action),
            action: Some(action),
            period_type: Some(target.period),
            overtime_id: target.overtime_id,
            requires_completion,
            flags,
        }
    }

    fn allowed_range(&self, window: TimeWindow) -> TimeWindow {
        window.widened(self.settings.early_grace, self.settings.checkout_grace)
    }

    /// Chooses the period the action targets, and whether earlier entries are
    /// missing. Completion is only requested when every entry it would propose
    /// already lies in the past. `Err(None)` means nothing matched.
    fn pick<'c>(
        &self,
        regular: Option<&'c Candidate>,
        overtime: Option<&'c Candidate>,
        requested: Option<CheckAction>,
        now: NaiveDateTime,
    ) -> Result<(&'c Candidate, bool), Option<&'static str>> {
        let regular_open = regular.filter(|c| c.open());
        let overtime_open = overtime.filter(|c| c.open());
        // regular period checked in but not out
        let regular_unclosed = regular.is_some_and(|c| c.state == PeriodState::CheckedIn);
        let regular_closable = regular.is_some_and(|c| {
            auto_completion::regular_close_time(c.window, overtime.map(|o| o.window), now) <= now
        });
        let overtime_started = overtime.is_some_and(|c| now >= c.window.start);

        // overtime check-in that first has to close the regular period
        let overtime_after_regular = |o: &'c Candidate| {
            if !regular_unclosed {
                Ok((o, false))
            } else if regular_closable {
                Ok((o, true))
            } else {
                Err(Some(REGULAR_STILL_OPEN))
            }
        };

        let Some(action) = requested else {
            // prefer the regular period unless overtime has started and regular never did
            return match (regular_open, overtime_open) {
                (Some(r), Some(o)) if overtime_started && r.state == PeriodState::Absent => Ok((o, false)),
                (Some(r), _) => Ok((r, false)),
                (None, Some(o)) if o.state == PeriodState::Absent => overtime_after_regular(o),
                (None, Some(o)) => Ok((o, false)),
                (None, None) => Err(None),
            };
        };

        let regular_match = regular_open.filter(|c| c.expected() == Some(action));
        let overtime_match = overtime_open.filter(|c| c.expected() == Some(action));
        match (regular_match, overtime_match) {
            (Some(_), Some(o)) if overtime_started => return Ok((o, false)),
            (Some(r), _) => return Ok((r, false)),
            (None, Some(o)) if action == CheckAction::CheckIn => return overtime_after_regular(o),
            (None, Some(o)) => return Ok((o, false)),
            (None, None) => {}
        }

        // check-out with nothing checked in: the proposed check-in is the shift start
        if action == CheckAction::CheckOut {
            if let Some(r) = regular_open.filter(|c| c.state == PeriodState::Absent && now >= c.window.start) {
                return Ok((r, true));
            }
        }
        Err(None)
    }

    fn flags(
        &self,
        schedule: &DaySchedule,
        target: &Candidate,
        action: CheckAction,
        ctx: &CheckContext,
        now: NaiveDateTime,
    ) -> DecisionFlags {
        let half_day = ctx.leave == Some(LeaveKind::PlannedHalfDay);
        let emergency = ctx.leave == Some(LeaveKind::Emergency);
        let mut flags = DecisionFlags {
            is_planned_half_day_leave: half_day,
            is_emergency_leave: emergency,
            is_manual_entry: !ctx.in_premises,
            is_degraded: schedule.degraded || ctx.leave_degraded,
            ..DecisionFlags::default()
        };

        match (target.period, action) {
            (PeriodType::Regular, CheckAction::CheckIn) => {
                flags.is_late_check_in = now > target.window.start + self.settings.late_grace;
            }
            (PeriodType::Regular, CheckAction::CheckOut) => {
                let required_end = if half_day {
                    target.window.start + target.window.duration() / 2
                } else {
                    target.window.end
                };
                flags.is_early_check_out = !emergency && now < required_end;
            }
            (PeriodType::Overtime, _) => {
                flags.is_overtime = true;
                flags.is_day_off_overtime = schedule.is_day_off;
            }
        }
        flags
    }
}
