use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use sqlx::{FromRow, MySqlPool};

use super::{HolidayProvider, LeaveProvider, OvertimeProvider, ShiftCatalog};
use crate::error::{EngineError, EngineResult};
use crate::model::leave_request::{LeaveKind, LeaveRequest};
use crate::model::overtime::{OvertimeRequest, OvertimeWindow};
use crate::model::shift::{ApprovalStatus, ShiftAdjustment, ShiftDefinition, WorkDays};

#[derive(FromRow)]
struct ShiftRow {
    code: String,
    name: String,
    start_time: NaiveTime,
    end_time: NaiveTime,
    work_days: String,
}

impl TryFrom<ShiftRow> for ShiftDefinition {
    type Error = EngineError;

    fn try_from(row: ShiftRow) -> Result<Self, Self::Error> {
        let work_days = WorkDays::parse(&row.work_days).ok_or_else(|| {
            EngineError::Configuration(format!(
                "shift {} has invalid work_days '{}'",
                row.code, row.work_days
            ))
        })?;
        Ok(ShiftDefinition {
            code: row.code,
            name: row.name,
            start_time: row.start_time,
            end_time: row.end_time,
            work_days,
        })
    }
}

#[derive(FromRow)]
struct AdjustmentRow {
    date: NaiveDate,
    #[sqlx(flatten)]
    shift: ShiftRow,
}

#[derive(FromRow)]
struct ShiftAdjustmentRow {
    id: u64,
    employee_id: u64,
    date: NaiveDate,
    status: String,
    #[sqlx(flatten)]
    shift: ShiftRow,
}

impl TryFrom<ShiftAdjustmentRow> for ShiftAdjustment {
    type Error = EngineError;

    fn try_from(row: ShiftAdjustmentRow) -> Result<Self, Self::Error> {
        let status: ApprovalStatus = row.status.parse().map_err(|_| {
            EngineError::Validation(format!("shift adjustment {} has unknown status '{}'", row.id, row.status))
        })?;
        Ok(ShiftAdjustment {
            id: row.id,
            employee_id: row.employee_id,
            date: row.date,
            shift: ShiftDefinition::try_from(row.shift)?,
            status,
        })
    }
}

#[derive(FromRow)]
struct OvertimeRow {
    id: u64,
    employee_id: u64,
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    status: String,
}

impl TryFrom<OvertimeRow> for OvertimeRequest {
    type Error = EngineError;

    fn try_from(row: OvertimeRow) -> Result<Self, Self::Error> {
        let status: ApprovalStatus = row.status.parse().map_err(|_| {
            EngineError::Validation(format!("overtime request {} has unknown status '{}'", row.id, row.status))
        })?;
        Ok(OvertimeRequest {
            id: row.id,
            employee_id: row.employee_id,
            date: row.date,
            start_time: row.start_time,
            end_time: row.end_time,
            status,
        })
    }
}

const SHIFT_COLUMNS: &str = "s.code, s.name, s.start_time, s.end_time, s.work_days";

#[derive(Clone)]
pub struct MySqlShiftCatalog {
    pool: MySqlPool,
}

impl MySqlShiftCatalog {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShiftCatalog for MySqlShiftCatalog {
    async fn assigned_shift(&self, employee_id: u64) -> EngineResult<Option<ShiftDefinition>> {
        let sql = format!(
            "SELECT {SHIFT_COLUMNS} FROM employee_shifts es \
             JOIN shifts s ON s.code = es.shift_code \
             WHERE es.employee_id = ?"
        );
        let row = sqlx::query_as::<_, ShiftRow>(&sql)
            .bind(employee_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(ShiftDefinition::try_from).transpose()
    }

    async fn approved_adjustment(&self, employee_id: u64, date: NaiveDate) -> EngineResult<Option<ShiftDefinition>> {
        let sql = format!(
            "SELECT {SHIFT_COLUMNS} FROM shift_adjustments a \
             JOIN shifts s ON s.code = a.shift_code \
             WHERE a.employee_id = ? AND a.date = ? AND a.status = 'approved' \
             ORDER BY a.id DESC LIMIT 1"
        );
        let row = sqlx::query_as::<_, ShiftRow>(&sql)
            .bind(employee_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;
        row.map(ShiftDefinition::try_from).transpose()
    }

    async fn shift_by_code(&self, code: &str) -> EngineResult<Option<ShiftDefinition>> {
        let sql = format!("SELECT {SHIFT_COLUMNS} FROM shifts s WHERE s.code = ?");
        let row = sqlx::query_as::<_, ShiftRow>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        row.map(ShiftDefinition::try_from).transpose()
    }

    async fn approved_adjustments_between(
        &self,
        employee_id: u64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<BTreeMap<NaiveDate, ShiftDefinition>> {
        // later approvals win for the same date
        let sql = format!(
            "SELECT a.date, {SHIFT_COLUMNS} FROM shift_adjustments a \
             JOIN shifts s ON s.code = a.shift_code \
             WHERE a.employee_id = ? AND a.date BETWEEN ? AND ? AND a.status = 'approved' \
             ORDER BY a.date, a.id"
        );
        let rows = sqlx::query_as::<_, AdjustmentRow>(&sql)
            .bind(employee_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;

        let mut days = BTreeMap::new();
        for row in rows {
            days.insert(row.date, ShiftDefinition::try_from(row.shift)?);
        }
        Ok(days)
    }

    async fn approve_adjustment(&self, adjustment_id: u64) -> EngineResult<Option<ShiftAdjustment>> {
        let result = sqlx::query(
            r#"
            UPDATE shift_adjustments
            SET status = 'approved'
            WHERE id = ?
            AND status = 'pending'
            "#,
        )
        .bind(adjustment_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let sql = format!(
            "SELECT a.id, a.employee_id, a.date, a.status, {SHIFT_COLUMNS} FROM shift_adjustments a \
             JOIN shifts s ON s.code = a.shift_code \
             WHERE a.id = ?"
        );
        let row = sqlx::query_as::<_, ShiftAdjustmentRow>(&sql)
            .bind(adjustment_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(ShiftAdjustment::try_from).transpose()
    }
}

#[derive(Clone)]
pub struct MySqlHolidayProvider {
    pool: MySqlPool,
}

impl MySqlHolidayProvider {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HolidayProvider for MySqlHolidayProvider {
    async fn holidays_between(&self, start: NaiveDate, end: NaiveDate) -> EngineResult<BTreeSet<NaiveDate>> {
        let dates = sqlx::query_scalar::<_, NaiveDate>(
            "SELECT date FROM holidays WHERE date BETWEEN ? AND ?",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(dates.into_iter().collect())
    }
}

#[derive(Clone)]
pub struct MySqlLeaveProvider {
    pool: MySqlPool,
}

impl MySqlLeaveProvider {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn approved_overlapping(
        &self,
        employee_id: u64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<Vec<LeaveRequest>> {
        let rows = sqlx::query_as::<_, LeaveRequest>(
            r#"
            SELECT id, employee_id, start_date, end_date, leave_type, status
            FROM leave_requests
            WHERE employee_id = ?
            AND status = 'approved'
            AND start_date <= ?
            AND end_date >= ?
            ORDER BY id
            "#,
        )
        .bind(employee_id)
        .bind(end)
        .bind(start)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl LeaveProvider for MySqlLeaveProvider {
    async fn approved_leave_covering(&self, employee_id: u64, date: NaiveDate) -> EngineResult<Option<LeaveKind>> {
        let rows = self.approved_overlapping(employee_id, date, date).await?;
        Ok(rows.iter().find(|l| l.covers(date)).map(LeaveRequest::kind))
    }

    async fn approved_leave_between(
        &self,
        employee_id: u64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<BTreeMap<NaiveDate, LeaveKind>> {
        let rows = self.approved_overlapping(employee_id, start, end).await?;
        let mut days = BTreeMap::new();
        for leave in &rows {
            let from = leave.start_date.max(start);
            let to = leave.end_date.min(end);
            for date in from.iter_days().take_while(|d| *d <= to) {
                days.entry(date).or_insert_with(|| leave.kind());
            }
        }
        Ok(days)
    }
}

#[derive(Clone)]
pub struct MySqlOvertimeProvider {
    pool: MySqlPool,
}

impl MySqlOvertimeProvider {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OvertimeProvider for MySqlOvertimeProvider {
    async fn approved_overtime(&self, employee_id: u64, date: NaiveDate) -> EngineResult<Option<OvertimeWindow>> {
        let row = sqlx::query_as::<_, OvertimeRow>(
            r#"
            SELECT id, employee_id, date, start_time, end_time, status
            FROM overtime_requests
            WHERE employee_id = ?
            AND date = ?
            AND status = 'approved'
            ORDER BY start_time
            LIMIT 1
            "#,
        )
        .bind(employee_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        let request = row.map(OvertimeRequest::try_from).transpose()?;
        Ok(request.map(|r| r.window()))
    }
}
