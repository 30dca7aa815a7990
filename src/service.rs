use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use rust_i18n::t;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::config::EngineSettings;
use crate::engine::aggregator::AttendanceAggregator;
use crate::engine::auto_completion::{AutoCompletionEngine, CompletionEntry, CompletionProposal, Trigger};
use crate::engine::payroll_summary::PayrollPeriodSummarizer;
use crate::engine::period_state::{CheckContext, CheckDecision, NO_ACTIVE_WINDOW, PeriodStateMachine};
use crate::engine::shift_window::{DaySchedule, ShiftWindowResolver};
use crate::error::{EngineError, EngineResult};
use crate::model::attendance::{AttendanceRecord, CheckAction, PeriodState, PeriodType};
use crate::model::payroll::{PayrollPeriod, PayrollSummary};
use crate::model::processed::ProcessedAttendance;
use crate::model::shift::ShiftAdjustment;
use crate::provider::{HolidayProvider, LeaveProvider, OvertimeProvider, ShiftCatalog};
use crate::repository::attendance::AttendanceStore;
use crate::utils::locks::EmployeeDayLocks;
use crate::utils::retry::{Resilient, RetryPolicy};

/// External systems the service reads from.
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn ShiftCatalog>,
    pub holidays: Arc<dyn HolidayProvider>,
    pub leave: Arc<dyn LeaveProvider>,
    pub overtime: Arc<dyn OvertimeProvider>,
}

/// A check-in/out attempt as received from a client.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CheckInput {
    /// Omit to perform whichever action comes next.
    pub action: Option<CheckAction>,
    #[serde(default)]
    pub in_premises: bool,
    /// Address or reason; required when not in premises.
    pub address: Option<String>,
    pub locale: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckOutcome {
    Recorded {
        decision: CheckDecision,
        record: AttendanceRecord,
        /// Set when an earlier day was left open and could not be completed automatically.
        warning: Option<String>,
    },
    ConfirmationRequired {
        decision: CheckDecision,
        proposal: CompletionProposal,
    },
    Denied {
        reason: String,
    },
    /// Entries are missing but cannot be filled in automatically.
    CorrectionRequired {
        decision: CheckDecision,
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WindowStatus {
    pub employee_id: u64,
    pub schedule: Option<DaySchedule>,
    pub record: Option<AttendanceRecord>,
    /// What a check without an explicit action would do right now.
    pub next: CheckDecision,
    pub permitted_actions: Vec<CheckAction>,
}

/// Confirmed auto-completion entries plus the action that triggered them.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ConfirmInput {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub entries: Vec<CompletionEntry>,
    pub check: CheckInput,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConfirmOutcome {
    pub completed: AttendanceRecord,
    pub outcome: CheckOutcome,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CorrectionInput {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_in: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_out: Option<NaiveDateTime>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProcessedRange {
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub start: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end: NaiveDate,
    pub days: Vec<ProcessedAttendance>,
    /// Holiday data fell back to "working day" for this computation.
    pub degraded: bool,
}

/// Owns the long-lived engine parts. Build once at startup and share behind an `Arc`.
pub struct AttendanceService {
    resolver: ShiftWindowResolver,
    catalog: Arc<dyn ShiftCatalog>,
    holidays: Arc<dyn HolidayProvider>,
    leave: Arc<dyn LeaveProvider>,
    store: Arc<dyn AttendanceStore>,
    locks: EmployeeDayLocks,
    machine: PeriodStateMachine,
    completion: AutoCompletionEngine,
    aggregator: AttendanceAggregator,
    summarizer: PayrollPeriodSummarizer,
    retry: RetryPolicy,
    settings: EngineSettings,
}

impl AttendanceService {
    pub fn new(
        collaborators: Collaborators,
        store: Arc<dyn AttendanceStore>,
        retry: RetryPolicy,
        settings: EngineSettings,
        default_shift_code: Option<String>,
    ) -> Self {
        let resolver = ShiftWindowResolver::new(
            collaborators.catalog.clone(),
            collaborators.holidays.clone(),
            collaborators.overtime,
            retry.clone(),
            settings.clone(),
            default_shift_code,
        );
        Self {
            resolver,
            catalog: collaborators.catalog,
            holidays: collaborators.holidays,
            leave: collaborators.leave,
            store,
            locks: EmployeeDayLocks::new(),
            machine: PeriodStateMachine::new(settings.clone()),
            completion: AutoCompletionEngine::new(),
            aggregator: AttendanceAggregator::new(settings.clone()),
            summarizer: PayrollPeriodSummarizer::new(),
            retry,
            settings,
        }
    }

    /// A missing shift is a denial for check purposes, not a request failure.
    async fn schedule_at(&self, employee_id: u64, now: NaiveDateTime) -> EngineResult<Option<DaySchedule>> {
        match self.resolver.resolve(employee_id, now).await {
            Ok(schedule) => Ok(Some(schedule)),
            Err(EngineError::Configuration(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn check_context(
        &self,
        employee_id: u64,
        date: NaiveDate,
        input: &CheckInput,
    ) -> CheckContext {
        let leave = &self.leave;
        let found = self
            .retry
            .call_with_fallback("leave lookup", None, move || leave.approved_leave_covering(employee_id, date))
            .await;
        CheckContext {
            in_premises: input.in_premises,
            manual_reason: input.address.clone(),
            leave: found.value,
            leave_degraded: found.degraded,
            requested: input.action,
        }
    }

    fn locale<'a>(&'a self, input: &'a CheckInput) -> &'a str {
        input.locale.as_deref().unwrap_or(&self.settings.default_locale)
    }

    #[instrument(skip(self))]
    pub async fn window_status(&self, employee_id: u64, now: NaiveDateTime) -> EngineResult<WindowStatus> {
        let Some(schedule) = self.schedule_at(employee_id, now).await? else {
            let next = self.machine.decide(None, None, &CheckContext::default(), now);
            return Ok(WindowStatus {
                employee_id,
                schedule: None,
                record: None,
                next,
                permitted_actions: Vec::new(),
            });
        };

        let record = self.store.find(employee_id, schedule.date).await?;
        let input = CheckInput {
            in_premises: true,
            ..CheckInput::default()
        };
        let mut ctx = self.check_context(employee_id, schedule.date, &input).await;
        let next = self.machine.decide(Some(&schedule), record.as_ref(), &ctx, now);

        let mut permitted_actions = Vec::new();
        for action in [CheckAction::CheckIn, CheckAction::CheckOut] {
            ctx.requested = Some(action);
            if self.machine.decide(Some(&schedule), record.as_ref(), &ctx, now).allowed {
                permitted_actions.push(action);
            }
        }

        Ok(WindowStatus {
            employee_id,
            schedule: Some(schedule),
            record,
            next,
            permitted_actions,
        })
    }

    /// Decides and, when allowed, records a check. Gaps in earlier entries
    /// produce a proposal instead of a write.
    #[instrument(skip(self, input), fields(action = ?input.action))]
    pub async fn submit_check(&self, employee_id: u64, input: &CheckInput, now: NaiveDateTime) -> EngineResult<CheckOutcome> {
        let Some(schedule) = self.schedule_at(employee_id, now).await? else {
            return Ok(CheckOutcome::Denied {
                reason: NO_ACTIVE_WINDOW.to_string(),
            });
        };
        let _guard = self.locks.try_acquire(employee_id, schedule.date)?;
        let plan = self.plan(employee_id, &schedule, input, now).await?;
        self.execute(employee_id, &schedule, plan, now).await
    }

    /// Works out what a check would do against the stored record. Callers hold
    /// the employee-day lock for `schedule.date`.
    async fn plan(&self, employee_id: u64, schedule: &DaySchedule, input: &CheckInput, now: NaiveDateTime) -> EngineResult<Plan> {
        let date = schedule.date;
        let current = self.store.find(employee_id, date).await?;
        let ctx = self.check_context(employee_id, date, input).await;
        let decision = self.machine.decide(Some(schedule), current.as_ref(), &ctx, now);
        let (true, Some(action), Some(period)) = (decision.allowed, decision.action, decision.period_type) else {
            info!(employee_id, %date, reason = %decision.reason, "Check denied");
            return Ok(Plan::Deny(decision.reason));
        };

        let locale = self.locale(input);
        if decision.requires_completion {
            let trigger = match (period, action) {
                (PeriodType::Regular, CheckAction::CheckOut) => Trigger::RegularCheckOut,
                _ => Trigger::OvertimeCheckIn,
            };
            match self
                .completion
                .handle_missing_entries(current.as_ref(), trigger, now, schedule, locale)
            {
                Ok(Some(proposal)) => return Ok(Plan::Complete { decision, proposal }),
                Ok(None) => {}
                Err(EngineError::Validation(reason)) => return Ok(Plan::Correct { decision, reason }),
                Err(e) => return Err(e),
            }
        }

        let mut warning = None;
        if current.is_none() && action == CheckAction::CheckIn {
            match self.previous_day_gap(employee_id, date, now, locale).await? {
                PreviousDay::Closed => {}
                PreviousDay::Proposal(proposal) => return Ok(Plan::Complete { decision, proposal }),
                PreviousDay::NeedsCorrection(open) => {
                    warning = Some(t!("warning.previous_day_open", locale = locale, date = open.to_string()).to_string());
                }
            }
        }

        Ok(Plan::Record {
            decision,
            action,
            period,
            current,
            warning,
        })
    }

    async fn execute(&self, employee_id: u64, schedule: &DaySchedule, plan: Plan, now: NaiveDateTime) -> EngineResult<CheckOutcome> {
        let date = schedule.date;
        let (decision, action, period, current, warning) = match plan {
            Plan::Deny(reason) => return Ok(CheckOutcome::Denied { reason }),
            Plan::Complete { decision, proposal } => {
                return Ok(CheckOutcome::ConfirmationRequired { decision, proposal });
            }
            Plan::Correct { decision, reason } => {
                warn!(employee_id, %date, %reason, "Missing entries need a manual correction");
                return Ok(CheckOutcome::CorrectionRequired { decision, reason });
            }
            Plan::Record {
                decision,
                action,
                period,
                current,
                warning,
            } => (decision, action, period, current, warning),
        };

        let mut record = current.unwrap_or_else(|| AttendanceRecord::new(employee_id, date, Some(schedule.regular_window)));
        record
            .apply(action, period, decision.overtime_id, now)
            .map_err(EngineError::Validation)?;
        record.flags.is_late_check_in |= decision.flags.is_late_check_in;
        record.flags.is_early_check_out |= decision.flags.is_early_check_out;
        record.flags.is_manual_entry |= decision.flags.is_manual_entry;
        record.flags.is_day_off |= schedule.is_day_off;
        record.flags.is_degraded |= decision.flags.is_degraded;
        if decision.flags.is_degraded {
            warn!(employee_id, %date, "Recording attendance with unverified collaborator data");
        }

        let record = self.store.save(&record).await?;
        info!(employee_id, %date, %action, %period, "Attendance recorded");
        Ok(CheckOutcome::Recorded {
            decision,
            record,
            warning,
        })
    }

    /// Looks for a regular period left open on the day before `date`.
    async fn previous_day_gap(
        &self,
        employee_id: u64,
        date: NaiveDate,
        now: NaiveDateTime,
        locale: &str,
    ) -> EngineResult<PreviousDay> {
        let Some(yesterday) = date.pred_opt() else {
            return Ok(PreviousDay::Closed);
        };
        let Some(open) = self
            .store
            .find(employee_id, yesterday)
            .await?
            .filter(|r| r.regular_state() == PeriodState::CheckedIn)
        else {
            return Ok(PreviousDay::Closed);
        };

        let schedule = self.resolver.resolve_day(employee_id, yesterday).await?;
        match self
            .completion
            .handle_missing_entries(Some(&open), Trigger::NextDayCheckIn, now, &schedule, locale)
        {
            Ok(Some(proposal)) => Ok(PreviousDay::Proposal(proposal)),
            Ok(None) => Ok(PreviousDay::Closed),
            Err(EngineError::Validation(reason)) => {
                warn!(employee_id, date = %yesterday, %reason, "Previous day left open, manual correction required");
                Ok(PreviousDay::NeedsCorrection(yesterday))
            }
            Err(e) => Err(e),
        }
    }

    /// Writes confirmed auto-completion entries, then replays the original check.
    ///
    /// The proposal is rebuilt from the stored record and the current schedule;
    /// the submitted entries must match it exactly and only the rebuilt entries
    /// are written. Both steps run under the same employee-day lock.
    #[instrument(skip(self, input), fields(date = %input.date))]
    pub async fn confirm_entries(&self, employee_id: u64, input: &ConfirmInput, now: NaiveDateTime) -> EngineResult<ConfirmOutcome> {
        if input.entries.is_empty() {
            return Err(EngineError::BadRequest("no entries to confirm".to_string()));
        }

        let Some(schedule) = self.schedule_at(employee_id, now).await? else {
            return Err(EngineError::Validation(NO_ACTIVE_WINDOW.to_string()));
        };
        let _guard = self.locks.try_acquire(employee_id, schedule.date)?;
        // a previous-day completion touches a second employee-day
        let _completion_guard = if input.date != schedule.date {
            Some(self.locks.try_acquire(employee_id, input.date)?)
        } else {
            None
        };

        let Plan::Complete { proposal, .. } = self.plan(employee_id, &schedule, &input.check, now).await? else {
            warn!(employee_id, date = %input.date, "Confirmation without a pending auto-completion");
            return Err(EngineError::Validation("no auto-completion is pending for this check".to_string()));
        };
        let mut submitted = input.entries.clone();
        submitted.sort_by_key(|e| e.suggested_time);
        if proposal.date != input.date || submitted != proposal.entries {
            warn!(employee_id, date = %input.date, "Rejecting confirmed entries that differ from the proposal");
            return Err(EngineError::Validation(
                "confirmed entries do not match the current proposal".to_string(),
            ));
        }

        let mut record = match self.store.find(employee_id, proposal.date).await? {
            Some(record) => record,
            None => {
                let window = if proposal.date == schedule.date {
                    schedule.regular_window
                } else {
                    self.resolver.resolve_day(employee_id, proposal.date).await?.regular_window
                };
                AttendanceRecord::new(employee_id, proposal.date, Some(window))
            }
        };
        for entry in &proposal.entries {
            record
                .apply(entry.entry_type, entry.period_type, entry.overtime_id, entry.suggested_time)
                .map_err(EngineError::Validation)?;
        }
        record.flags.is_manual_entry = true;
        let completed = self.store.save(&record).await?;
        info!(employee_id, date = %proposal.date, entries = proposal.entries.len(), "Auto-completion confirmed");

        let plan = self.plan(employee_id, &schedule, &input.check, now).await?;
        let outcome = self.execute(employee_id, &schedule, plan, now).await?;
        Ok(ConfirmOutcome { completed, outcome })
    }

    /// Overwrites the regular stamps of a day. The only operation that can move
    /// a record backwards.
    #[instrument(skip(self, input), fields(date = %input.date))]
    pub async fn manual_correction(&self, employee_id: u64, input: &CorrectionInput, now: NaiveDateTime) -> EngineResult<AttendanceRecord> {
        if input.reason.trim().is_empty() {
            return Err(EngineError::BadRequest("a correction reason is required".to_string()));
        }
        if let (Some(check_in), Some(check_out)) = (input.check_in, input.check_out) {
            if check_out <= check_in {
                return Err(EngineError::Validation("check-out must be after check-in".to_string()));
            }
        }
        if input.check_in.into_iter().chain(input.check_out).any(|t| t > now) {
            return Err(EngineError::Validation("corrections cannot be in the future".to_string()));
        }

        let _guard = self.locks.try_acquire(employee_id, input.date)?;
        let mut record = match self.store.find(employee_id, input.date).await? {
            Some(record) => record,
            None => {
                let schedule = self.resolver.resolve_day(employee_id, input.date).await?;
                AttendanceRecord::new(employee_id, input.date, Some(schedule.regular_window))
            }
        };
        record.correct(input.check_in, input.check_out);
        let record = self.store.save(&record).await?;
        info!(employee_id, date = %input.date, reason = %input.reason, "Attendance corrected manually");
        Ok(record)
    }

    /// One processed entry per day in `[start, end]`, never past `now`'s date.
    #[instrument(skip(self))]
    pub async fn processed_attendance(
        &self,
        employee_id: u64,
        start: NaiveDate,
        end: NaiveDate,
        now: NaiveDateTime,
    ) -> EngineResult<ProcessedRange> {
        if end < start {
            return Err(EngineError::BadRequest(format!("range end {end} is before start {start}")));
        }
        let end = end.min(now.date());
        if end < start {
            return Ok(ProcessedRange {
                employee_id,
                start,
                end,
                days: Vec::new(),
                degraded: false,
            });
        }

        let shifts = self.resolver.shift_schedule(employee_id, start, end).await?;
        let records = self.store.list_range(employee_id, start, end).await?;
        // the day after `end` decides whether `end` is a holiday eve
        let holidays = &self.holidays;
        let lookahead = end.succ_opt().unwrap_or(end);
        let holiday_set = self
            .retry
            .call_with_fallback("holiday range lookup", Default::default(), move || {
                holidays.holidays_between(start, lookahead)
            })
            .await;

        let days = self
            .aggregator
            .process(&records, &shifts, start, end, &holiday_set.value);
        Ok(ProcessedRange {
            employee_id,
            start,
            end,
            days,
            degraded: holiday_set.degraded,
        })
    }

    #[instrument(skip(self))]
    pub async fn payroll_summary(&self, employee_id: u64, period: PayrollPeriod, now: NaiveDateTime) -> EngineResult<PayrollSummary> {
        let processed = self
            .processed_attendance(employee_id, period.start, period.end, now)
            .await?;

        let leave = &self.leave;
        let (start, end) = (processed.start, processed.end);
        let approved = if end < start {
            Resilient::fresh(BTreeMap::new())
        } else {
            self.retry
                .call_with_fallback("leave range lookup", BTreeMap::new(), move || {
                    leave.approved_leave_between(employee_id, start, end)
                })
                .await
        };

        let mut summary = self
            .summarizer
            .summarize(employee_id, period, &processed.days, &approved.value);
        summary.degraded = processed.degraded || approved.degraded;
        if summary.degraded {
            warn!(employee_id, start = %period.start, end = %period.end, "Payroll summary computed from fallback data");
        }
        Ok(summary)
    }

    /// Loads the schedule for `date` into the resolver cache.
    pub async fn prime_schedule(&self, employee_id: u64, date: NaiveDate) -> EngineResult<()> {
        self.resolver.resolve_day(employee_id, date).await.map(|_| ())
    }

    /// Approves a pending shift adjustment and drops the schedules it changes.
    pub async fn approve_adjustment(&self, adjustment_id: u64) -> EngineResult<ShiftAdjustment> {
        let adjustment = self
            .catalog
            .approve_adjustment(adjustment_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("pending shift adjustment {adjustment_id}")))?;
        self.resolver.invalidate(adjustment.employee_id, adjustment.date).await;
        info!(
            adjustment_id,
            employee_id = adjustment.employee_id,
            date = %adjustment.date,
            shift = %adjustment.shift.code,
            "Shift adjustment approved"
        );
        Ok(adjustment)
    }
}

enum Plan {
    Deny(String),
    Complete {
        decision: CheckDecision,
        proposal: CompletionProposal,
    },
    Correct {
        decision: CheckDecision,
        reason: String,
    },
    Record {
        decision: CheckDecision,
        action: CheckAction,
        period: PeriodType,
        current: Option<AttendanceRecord>,
        warning: Option<String>,
    },
}

enum PreviousDay {
    Closed,
    Proposal(CompletionProposal),
    NeedsCorrection(NaiveDate),
}
