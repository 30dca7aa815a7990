use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{FromRow, MySqlPool};

use crate::error::{EngineError, EngineResult};
use crate::model::attendance::{AttendanceFlags, AttendanceRecord, OvertimeEntry, PeriodState};

/// Persistence for daily attendance. Writes are guarded by `UNIQUE(employee_id, date)`
/// on insert and by the `version` column on update; both surface as
/// [`EngineError::ConcurrencyConflict`].
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn find(&self, employee_id: u64, date: NaiveDate) -> EngineResult<Option<AttendanceRecord>>;

    async fn list_range(&self, employee_id: u64, start: NaiveDate, end: NaiveDate) -> EngineResult<Vec<AttendanceRecord>>;

    /// Stores a new record and returns it with its first version.
    async fn insert(&self, record: &AttendanceRecord) -> EngineResult<AttendanceRecord>;

    /// Replaces a record if nobody else wrote it since it was read.
    async fn update(&self, record: &AttendanceRecord) -> EngineResult<AttendanceRecord>;

    async fn save(&self, record: &AttendanceRecord) -> EngineResult<AttendanceRecord> {
        if record.version == 0 {
            self.insert(record).await
        } else {
            self.update(record).await
        }
    }
}

#[derive(FromRow)]
struct AttendanceRow {
    employee_id: u64,
    date: NaiveDate,
    regular_check_in: Option<NaiveDateTime>,
    regular_check_out: Option<NaiveDateTime>,
    overtime_entries: Option<String>,
    state: String,
    is_late_check_in: bool,
    is_early_check_out: bool,
    is_overtime: bool,
    is_manual_entry: bool,
    is_day_off: bool,
    is_degraded: bool,
    shift_start: Option<NaiveDateTime>,
    shift_end: Option<NaiveDateTime>,
    version: u32,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = EngineError;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        let overtime_entries: Vec<OvertimeEntry> = match row.overtime_entries.as_deref() {
            None | Some("") => Vec::new(),
            Some(raw) => serde_json::from_str(raw).map_err(|e| {
                EngineError::Validation(format!(
                    "attendance {}/{} has malformed overtime entries: {e}",
                    row.employee_id, row.date
                ))
            })?,
        };
        let state: PeriodState = row.state.parse().map_err(|_| {
            EngineError::Validation(format!(
                "attendance {}/{} has unknown state '{}'",
                row.employee_id, row.date, row.state
            ))
        })?;

        Ok(AttendanceRecord {
            employee_id: row.employee_id,
            date: row.date,
            regular_check_in: row.regular_check_in,
            regular_check_out: row.regular_check_out,
            overtime_entries,
            state,
            flags: AttendanceFlags {
                is_late_check_in: row.is_late_check_in,
                is_early_check_out: row.is_early_check_out,
                is_overtime: row.is_overtime,
                is_manual_entry: row.is_manual_entry,
                is_day_off: row.is_day_off,
                is_degraded: row.is_degraded,
            },
            shift_start: row.shift_start,
            shift_end: row.shift_end,
            version: row.version,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT employee_id, date, regular_check_in, regular_check_out, overtime_entries, state,
           is_late_check_in, is_early_check_out, is_overtime, is_manual_entry, is_day_off,
           is_degraded, shift_start, shift_end, version
    FROM daily_attendance
"#;

#[derive(Clone)]
pub struct MySqlAttendanceStore {
    pool: MySqlPool,
}

impl MySqlAttendanceStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

fn overtime_json(record: &AttendanceRecord) -> EngineResult<String> {
    serde_json::to_string(&record.overtime_entries)
        .map_err(|e| EngineError::Validation(format!("cannot encode overtime entries: {e}")))
}

#[async_trait]
impl AttendanceStore for MySqlAttendanceStore {
    async fn find(&self, employee_id: u64, date: NaiveDate) -> EngineResult<Option<AttendanceRecord>> {
        let sql = format!("{SELECT_COLUMNS} WHERE employee_id = ? AND date = ?");
        let row = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(employee_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;
        row.map(AttendanceRecord::try_from).transpose()
    }

    async fn list_range(&self, employee_id: u64, start: NaiveDate, end: NaiveDate) -> EngineResult<Vec<AttendanceRecord>> {
        let sql = format!("{SELECT_COLUMNS} WHERE employee_id = ? AND date BETWEEN ? AND ? ORDER BY date");
        let rows = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(employee_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(AttendanceRecord::try_from).collect()
    }

    async fn insert(&self, record: &AttendanceRecord) -> EngineResult<AttendanceRecord> {
        let result = sqlx::query(
            r#"
            INSERT INTO daily_attendance
                (employee_id, date, regular_check_in, regular_check_out, overtime_entries, state,
                 is_late_check_in, is_early_check_out, is_overtime, is_manual_entry, is_day_off,
                 is_degraded, shift_start, shift_end, version)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)
            "#,
        )
        .bind(record.employee_id)
        .bind(record.date)
        .bind(record.regular_check_in)
        .bind(record.regular_check_out)
        .bind(overtime_json(record)?)
        .bind(record.state.as_ref())
        .bind(record.flags.is_late_check_in)
        .bind(record.flags.is_early_check_out)
        .bind(record.flags.is_overtime)
        .bind(record.flags.is_manual_entry)
        .bind(record.flags.is_day_off)
        .bind(record.flags.is_degraded)
        .bind(record.shift_start)
        .bind(record.shift_end)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(AttendanceRecord {
                version: 1,
                ..record.clone()
            }),
            Err(e) => {
                // Duplicate record for the same employee-day
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.code().as_deref() == Some("23000") {
                        return Err(EngineError::ConcurrencyConflict {
                            employee_id: record.employee_id,
                            date: record.date,
                        });
                    }
                }
                tracing::error!(error = %e, employee_id = record.employee_id, date = %record.date, "Attendance insert failed");
                Err(e.into())
            }
        }
    }

    async fn update(&self, record: &AttendanceRecord) -> EngineResult<AttendanceRecord> {
        let result = sqlx::query(
            r#"
            UPDATE daily_attendance
            SET regular_check_in = ?, regular_check_out = ?, overtime_entries = ?, state = ?,
                is_late_check_in = ?, is_early_check_out = ?, is_overtime = ?, is_manual_entry = ?,
                is_day_off = ?, is_degraded = ?, shift_start = ?, shift_end = ?,
                version = version + 1
            WHERE employee_id = ?
            AND date = ?
            AND version = ?
            "#,
        )
        .bind(record.regular_check_in)
        .bind(record.regular_check_out)
        .bind(overtime_json(record)?)
        .bind(record.state.as_ref())
        .bind(record.flags.is_late_check_in)
        .bind(record.flags.is_early_check_out)
        .bind(record.flags.is_overtime)
        .bind(record.flags.is_manual_entry)
        .bind(record.flags.is_day_off)
        .bind(record.flags.is_degraded)
        .bind(record.shift_start)
        .bind(record.shift_end)
        .bind(record.employee_id)
        .bind(record.date)
        .bind(record.version)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, employee_id = record.employee_id, date = %record.date, "Attendance update failed");
            EngineError::from(e)
        })?;

        if result.rows_affected() == 0 {
            return Err(EngineError::ConcurrencyConflict {
                employee_id: record.employee_id,
                date: record.date,
            });
        }

        Ok(AttendanceRecord {
            version: record.version + 1,
            ..record.clone()
        })
    }
}
