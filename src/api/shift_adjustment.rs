use actix_web::{HttpResponse, Responder, web};

use crate::service::AttendanceService;

/// Approve a shift adjustment
#[utoipa::path(
    put,
    path = "/api/shift-adjustments/{adjustment_id}/approve",
    params(
        ("adjustment_id", description = "Shift adjustment ID")
    ),
    responses(
        (status = 200, description = "Approved", body = Object, example = json!({
            "message": "Shift adjustment approved",
            "employee_id": 42,
            "date": "2026-03-10",
            "shift_code": "B2"
        })),
        (status = 404, description = "No pending adjustment with this id"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Shift"
)]
pub async fn approve_adjustment(
    service: web::Data<AttendanceService>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let adjustment_id = path.into_inner();
    let adjustment = service.approve_adjustment(adjustment_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Shift adjustment approved",
        "employee_id": adjustment.employee_id,
        "date": adjustment.date,
        "shift_code": adjustment.shift.code
    })))
}
