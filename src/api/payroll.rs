use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::api::now;
use crate::error::EngineError;
use crate::model::payroll::{PayrollPeriod, PayrollSummary};
use crate::service::AttendanceService;

/// Either `period=YYYY-MM` (the cycle closing on the 25th of that month) or an
/// explicit `start`/`end`. Neither means the cycle containing today.
#[derive(Deserialize, IntoParams)]
pub struct PayrollQuery {
    #[param(example = "2026-03")]
    pub period: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl PayrollQuery {
    fn resolve(&self, today: NaiveDate) -> Result<PayrollPeriod, EngineError> {
        if let Some(raw) = self.period.as_deref() {
            let invalid = || EngineError::BadRequest(format!("period must look like YYYY-MM, got '{raw}'"));
            let (year, month) = raw.split_once('-').ok_or_else(invalid)?;
            let year: i32 = year.parse().map_err(|_| invalid())?;
            let month: u32 = month.parse().map_err(|_| invalid())?;
            return PayrollPeriod::ending_in(year, month).ok_or_else(invalid);
        }

        match (self.start, self.end) {
            (Some(start), Some(end)) if start <= end => Ok(PayrollPeriod { start, end }),
            (Some(_), Some(_)) => Err(EngineError::BadRequest("period end is before start".to_string())),
            (None, None) => PayrollPeriod::containing(today)
                .ok_or_else(|| EngineError::BadRequest(format!("no payroll period contains {today}"))),
            _ => Err(EngineError::BadRequest("start and end must be given together".to_string())),
        }
    }
}

/// Payroll period summary
#[utoipa::path(
    get,
    path = "/api/payroll/{employee_id}/summary",
    params(
        ("employee_id", description = "Employee ID"),
        PayrollQuery
    ),
    responses(
        (status = 200, description = "Period totals", body = PayrollSummary),
        (status = 400, description = "Malformed period", body = Object, example = json!({
            "message": "bad request: period must look like YYYY-MM, got '2026/03'",
            "retryable": false
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Payroll"
)]
pub async fn payroll_summary(
    service: web::Data<AttendanceService>,
    path: web::Path<u64>,
    query: web::Query<PayrollQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    let now = now();
    let period = query.resolve(now.date())?;
    let summary = service.payroll_summary(employee_id, period, now).await?;
    Ok(HttpResponse::Ok().json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::date;

    fn query(period: Option<&str>, start: Option<NaiveDate>, end: Option<NaiveDate>) -> PayrollQuery {
        PayrollQuery {
            period: period.map(str::to_string),
            start,
            end,
        }
    }

    #[test]
    fn month_selects_cycle_closing_that_month() {
        let p = query(Some("2026-03"), None, None).resolve(date(2026, 6, 1)).unwrap();
        assert_eq!((p.start, p.end), (date(2026, 2, 26), date(2026, 3, 25)));
    }

    #[test]
    fn defaults_to_cycle_containing_today() {
        let p = query(None, None, None).resolve(date(2026, 3, 27)).unwrap();
        assert_eq!(p.end, date(2026, 4, 25));
    }

    #[test]
    fn malformed_queries_are_bad_requests() {
        let today = date(2026, 3, 1);
        assert!(query(Some("2026/03"), None, None).resolve(today).is_err());
        assert!(query(Some("2026-13"), None, None).resolve(today).is_err());
        assert!(query(None, Some(today), None).resolve(today).is_err());
        assert!(query(None, Some(date(2026, 3, 5)), Some(today)).resolve(today).is_err());
    }
}
