use crate::engine::auto_completion::{CompletionEntry, CompletionProposal};
use crate::engine::period_state::{CheckDecision, DecisionFlags};
use crate::engine::shift_window::{DaySchedule, ShiftSource};
use crate::jobs::{AggregationJob, JobStatus};
use crate::model::attendance::{
    AttendanceFlags, AttendanceRecord, CheckAction, OvertimeEntry, PeriodState, PeriodType,
};
use crate::model::leave_request::LeaveKind;
use crate::model::overtime::OvertimeWindow;
use crate::model::payroll::{PayrollPeriod, PayrollSummary};
use crate::model::processed::{DayStatus, ProcessedAttendance};
use crate::model::shift::{ApprovalStatus, ShiftAdjustment, ShiftDefinition, TimeWindow, WorkDays};
use crate::service::{
    CheckInput, CheckOutcome, ConfirmInput, ConfirmOutcome, CorrectionInput, ProcessedRange,
    WindowStatus,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attendance Engine API",
        version = "1.0.0",
        description = r#"
## Attendance & Shift-Window Engine

Decides whether an employee may check in or out right now, records the stamps,
proposes back-dated entries for forgotten ones, and turns raw daily records into
processed attendance and payroll period totals.

### 🔹 Key Features
- **Shift windows**
  - Assigned shifts, approved adjustments, overnight shifts, holiday eves
- **Check-in / check-out**
  - Grace periods, lateness and early departure flags, overtime periods
- **Auto-completion**
  - Localized proposals for missing entries, confirmed by the employee
- **Payroll**
  - Daily hours with half-up overtime rounding, 26th-to-25th period totals

### 📦 Response Format
- JSON-based RESTful responses
- Errors carry `message` and `retryable`

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::window_status,
        crate::api::attendance::submit_check,
        crate::api::attendance::confirm_entries,
        crate::api::attendance::manual_correction,
        crate::api::attendance::processed_attendance,

        crate::api::payroll::payroll_summary,

        crate::api::jobs::enqueue_aggregation,
        crate::api::jobs::job_status,

        crate::api::shift_adjustment::approve_adjustment
    ),
    components(
        schemas(
            WindowStatus,
            CheckInput,
            CheckOutcome,
            CheckDecision,
            DecisionFlags,
            ConfirmInput,
            ConfirmOutcome,
            CorrectionInput,
            CompletionEntry,
            CompletionProposal,
            ProcessedRange,
            ProcessedAttendance,
            DayStatus,
            AttendanceRecord,
            AttendanceFlags,
            OvertimeEntry,
            PeriodState,
            PeriodType,
            CheckAction,
            DaySchedule,
            ShiftSource,
            ShiftDefinition,
            ShiftAdjustment,
            ApprovalStatus,
            WorkDays,
            TimeWindow,
            OvertimeWindow,
            LeaveKind,
            PayrollPeriod,
            PayrollSummary,
            AggregationJob,
            JobStatus
        )
    ),
    tags(
        (name = "Attendance", description = "Check-in/out, corrections and processed attendance"),
        (name = "Payroll", description = "Payroll period summaries"),
        (name = "Jobs", description = "Background aggregation jobs"),
        (name = "Shift", description = "Shift adjustment approval"),
    )
)]
pub struct ApiDoc;
