//! In-memory collaborators and date helpers for unit tests.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{EngineError, EngineResult};
use crate::model::attendance::AttendanceRecord;
use crate::model::leave_request::LeaveKind;
use crate::model::overtime::OvertimeWindow;
use crate::model::shift::{ApprovalStatus, ShiftAdjustment, ShiftDefinition, WorkDays};
use crate::provider::{HolidayProvider, LeaveProvider, OvertimeProvider, ShiftCatalog};
use crate::repository::attendance::AttendanceStore;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(y: i32, m: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
    date(y, m, d).and_hms_opt(h, mi, 0).unwrap()
}

/// Monday to Friday shift.
pub fn shift(code: &str, start: (u32, u32), end: (u32, u32)) -> ShiftDefinition {
    ShiftDefinition {
        code: code.to_string(),
        name: format!("Shift {code}"),
        start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
        work_days: WorkDays::MONDAY_TO_FRIDAY,
    }
}

fn unavailable(what: &str) -> EngineError {
    EngineError::CollaboratorUnavailable(format!("{what} is down"))
}

#[derive(Default)]
pub struct FakeCatalog {
    assigned: Mutex<HashMap<u64, ShiftDefinition>>,
    adjustments: Mutex<HashMap<(u64, NaiveDate), ShiftDefinition>>,
    pending: Mutex<HashMap<u64, (u64, NaiveDate, ShiftDefinition)>>,
    definitions: Mutex<HashMap<String, ShiftDefinition>>,
}

impl FakeCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn assigned(employee_id: u64, shift: ShiftDefinition) -> Self {
        let catalog = Self::default();
        catalog.add_definition(shift.clone());
        catalog.assigned.lock().unwrap().insert(employee_id, shift);
        catalog
    }

    pub fn add_definition(&self, shift: ShiftDefinition) {
        self.definitions.lock().unwrap().insert(shift.code.clone(), shift);
    }

    pub fn add_adjustment(&self, employee_id: u64, date: NaiveDate, shift: ShiftDefinition) {
        self.adjustments.lock().unwrap().insert((employee_id, date), shift);
    }

    pub fn add_pending(&self, adjustment_id: u64, employee_id: u64, date: NaiveDate, shift: ShiftDefinition) {
        self.pending
            .lock()
            .unwrap()
            .insert(adjustment_id, (employee_id, date, shift));
    }
}

#[async_trait]
impl ShiftCatalog for FakeCatalog {
    async fn assigned_shift(&self, employee_id: u64) -> EngineResult<Option<ShiftDefinition>> {
        Ok(self.assigned.lock().unwrap().get(&employee_id).cloned())
    }

    async fn approved_adjustment(&self, employee_id: u64, date: NaiveDate) -> EngineResult<Option<ShiftDefinition>> {
        Ok(self.adjustments.lock().unwrap().get(&(employee_id, date)).cloned())
    }

    async fn shift_by_code(&self, code: &str) -> EngineResult<Option<ShiftDefinition>> {
        Ok(self.definitions.lock().unwrap().get(code).cloned())
    }

    async fn approve_adjustment(&self, adjustment_id: u64) -> EngineResult<Option<ShiftAdjustment>> {
        let Some((employee_id, date, shift)) = self.pending.lock().unwrap().remove(&adjustment_id) else {
            return Ok(None);
        };
        self.add_adjustment(employee_id, date, shift.clone());
        Ok(Some(ShiftAdjustment {
            id: adjustment_id,
            employee_id,
            date,
            shift,
            status: ApprovalStatus::Approved,
        }))
    }
}

pub struct FakeHolidays {
    days: BTreeSet<NaiveDate>,
    failing: bool,
}

impl FakeHolidays {
    pub fn none() -> Self {
        Self::on(&[])
    }

    pub fn on(days: &[NaiveDate]) -> Self {
        Self {
            days: days.iter().copied().collect(),
            failing: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            days: BTreeSet::new(),
            failing: true,
        }
    }
}

#[async_trait]
impl HolidayProvider for FakeHolidays {
    async fn holidays_between(&self, start: NaiveDate, end: NaiveDate) -> EngineResult<BTreeSet<NaiveDate>> {
        if self.failing {
            return Err(unavailable("holiday calendar"));
        }
        Ok(self.days.range(start..=end).copied().collect())
    }
}

#[derive(Default)]
pub struct FakeOvertime {
    windows: HashMap<(u64, NaiveDate), OvertimeWindow>,
    failing: bool,
}

impl FakeOvertime {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with(employee_id: u64, date: NaiveDate, window: OvertimeWindow) -> Self {
        let mut fake = Self::default();
        fake.windows.insert((employee_id, date), window);
        fake
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl OvertimeProvider for FakeOvertime {
    async fn approved_overtime(&self, employee_id: u64, date: NaiveDate) -> EngineResult<Option<OvertimeWindow>> {
        if self.failing {
            return Err(unavailable("overtime service"));
        }
        Ok(self.windows.get(&(employee_id, date)).copied())
    }
}

#[derive(Default)]
pub struct FakeLeave {
    days: BTreeMap<(u64, NaiveDate), LeaveKind>,
    failing: bool,
}

impl FakeLeave {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn on(employee_id: u64, days: &[(NaiveDate, LeaveKind)]) -> Self {
        let mut fake = Self::default();
        for (date, kind) in days {
            fake.days.insert((employee_id, *date), *kind);
        }
        fake
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl LeaveProvider for FakeLeave {
    async fn approved_leave_covering(&self, employee_id: u64, date: NaiveDate) -> EngineResult<Option<LeaveKind>> {
        if self.failing {
            return Err(unavailable("leave service"));
        }
        Ok(self.days.get(&(employee_id, date)).copied())
    }
}

/// Enforces the same uniqueness and version rules as `daily_attendance`.
#[derive(Default)]
pub struct FakeAttendanceStore {
    records: Mutex<HashMap<(u64, NaiveDate), AttendanceRecord>>,
}

impl FakeAttendanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, employee_id: u64, date: NaiveDate) -> Option<AttendanceRecord> {
        self.records.lock().unwrap().get(&(employee_id, date)).cloned()
    }

    /// Seeds a record as if it had been written earlier.
    pub fn put(&self, mut record: AttendanceRecord) {
        record.version = record.version.max(1);
        self.records
            .lock()
            .unwrap()
            .insert((record.employee_id, record.date), record);
    }
}

#[async_trait]
impl AttendanceStore for FakeAttendanceStore {
    async fn find(&self, employee_id: u64, date: NaiveDate) -> EngineResult<Option<AttendanceRecord>> {
        Ok(self.get(employee_id, date))
    }

    async fn list_range(&self, employee_id: u64, start: NaiveDate, end: NaiveDate) -> EngineResult<Vec<AttendanceRecord>> {
        let mut found: Vec<_> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.employee_id == employee_id && r.date >= start && r.date <= end)
            .cloned()
            .collect();
        found.sort_by_key(|r| r.date);
        Ok(found)
    }

    async fn insert(&self, record: &AttendanceRecord) -> EngineResult<AttendanceRecord> {
        let mut records = self.records.lock().unwrap();
        let key = (record.employee_id, record.date);
        if records.contains_key(&key) {
            return Err(EngineError::ConcurrencyConflict {
                employee_id: record.employee_id,
                date: record.date,
            });
        }
        let stored = AttendanceRecord {
            version: 1,
            ..record.clone()
        };
        records.insert(key, stored.clone());
        Ok(stored)
    }

    async fn update(&self, record: &AttendanceRecord) -> EngineResult<AttendanceRecord> {
        let mut records = self.records.lock().unwrap();
        let key = (record.employee_id, record.date);
        match records.get(&key) {
            Some(current) if current.version == record.version => {
                let stored = AttendanceRecord {
                    version: record.version + 1,
                    ..record.clone()
                };
                records.insert(key, stored.clone());
                Ok(stored)
            }
            _ => Err(EngineError::ConcurrencyConflict {
                employee_id: record.employee_id,
                date: record.date,
            }),
        }
    }
}
