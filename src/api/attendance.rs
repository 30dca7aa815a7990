use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::api::now;
use crate::model::attendance::AttendanceRecord;
use crate::service::{
    AttendanceService, CheckInput, CheckOutcome, ConfirmInput, ConfirmOutcome, CorrectionInput,
    ProcessedRange, WindowStatus,
};

#[derive(Deserialize, IntoParams)]
pub struct ProcessedQuery {
    #[param(example = "2026-02-26")]
    pub start: NaiveDate,
    #[param(example = "2026-03-25")]
    pub end: NaiveDate,
}

/// Current window and permitted actions
#[utoipa::path(
    get,
    path = "/api/attendance/{employee_id}/status",
    params(
        ("employee_id", description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Window status", body = WindowStatus),
        (status = 409, description = "Concurrent update, retry"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn window_status(
    service: web::Data<AttendanceService>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    let status = service.window_status(employee_id, now()).await?;
    Ok(HttpResponse::Ok().json(status))
}

/// Check in or out
///
/// A denied attempt is a normal response with `outcome = "denied"`. Missing
/// earlier entries come back as `outcome = "confirmation_required"` with a proposal,
/// or as `outcome = "correction_required"` when no safe proposal exists.
#[utoipa::path(
    post,
    path = "/api/attendance/{employee_id}/check",
    params(
        ("employee_id", description = "Employee ID")
    ),
    request_body = CheckInput,
    responses(
        (status = 200, description = "Recorded, denied, confirmation or correction required", body = CheckOutcome),
        (status = 409, description = "Another check for this employee-day is in progress", body = Object, example = json!({
            "message": "concurrent update for employee 42 on 2026-03-10",
            "retryable": true
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn submit_check(
    service: web::Data<AttendanceService>,
    path: web::Path<u64>,
    body: web::Json<CheckInput>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    let outcome = service.submit_check(employee_id, &body, now()).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// Confirm proposed entries
#[utoipa::path(
    post,
    path = "/api/attendance/{employee_id}/confirm",
    params(
        ("employee_id", description = "Employee ID")
    ),
    request_body = ConfirmInput,
    responses(
        (status = 200, description = "Entries stored and original check replayed", body = ConfirmOutcome),
        (status = 400, description = "No entries supplied"),
        (status = 409, description = "Concurrent update, retry"),
        (status = 422, description = "Entries differ from the current proposal; nothing was stored"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn confirm_entries(
    service: web::Data<AttendanceService>,
    path: web::Path<u64>,
    body: web::Json<ConfirmInput>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    let outcome = service.confirm_entries(employee_id, &body, now()).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// Manually correct a day
#[utoipa::path(
    put,
    path = "/api/attendance/{employee_id}/correction",
    params(
        ("employee_id", description = "Employee ID")
    ),
    request_body = CorrectionInput,
    responses(
        (status = 200, description = "Record corrected", body = AttendanceRecord),
        (status = 400, description = "Missing reason"),
        (status = 422, description = "Inconsistent or future stamps"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn manual_correction(
    service: web::Data<AttendanceService>,
    path: web::Path<u64>,
    body: web::Json<CorrectionInput>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    let record = service.manual_correction(employee_id, &body, now()).await?;
    Ok(HttpResponse::Ok().json(record))
}

/// Processed attendance for a date range
///
/// Days after today are never reported.
#[utoipa::path(
    get,
    path = "/api/attendance/{employee_id}/processed",
    params(
        ("employee_id", description = "Employee ID"),
        ProcessedQuery
    ),
    responses(
        (status = 200, description = "One entry per day", body = ProcessedRange),
        (status = 400, description = "Range end before start"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn processed_attendance(
    service: web::Data<AttendanceService>,
    path: web::Path<u64>,
    query: web::Query<ProcessedQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    let range = service
        .processed_attendance(employee_id, query.start, query.end, now())
        .await?;
    Ok(HttpResponse::Ok().json(range))
}
