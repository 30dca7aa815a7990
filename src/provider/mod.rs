//! Collaborator interfaces the engine consumes, and their MySQL implementations.
//!
//! Every method returns `EngineResult` so callers can decide between retry,
//! fallback and failing the request.

pub mod mysql;

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::EngineResult;
use crate::model::leave_request::LeaveKind;
use crate::model::overtime::OvertimeWindow;
use crate::model::shift::{ShiftAdjustment, ShiftDefinition};

#[async_trait]
pub trait HolidayProvider: Send + Sync {
    /// Public holidays in `[start, end]`.
    async fn holidays_between(&self, start: NaiveDate, end: NaiveDate) -> EngineResult<BTreeSet<NaiveDate>>;

    /// Whether `date` is observed as a holiday. Shift groups that observe the
    /// eve (`observes_eve`) treat the day before a public holiday as the holiday.
    async fn is_holiday(&self, date: NaiveDate, observes_eve: bool) -> EngineResult<bool> {
        let public = if observes_eve { date.succ_opt() } else { Some(date) };
        match public {
            Some(day) => Ok(self.holidays_between(day, day).await?.contains(&day)),
            None => Ok(false),
        }
    }
}

/// Holiday observance for a shift, given the public holiday set.
pub fn is_observed_holiday(holidays: &BTreeSet<NaiveDate>, date: NaiveDate, shift: &ShiftDefinition) -> bool {
    if shift.observes_holiday_eve() {
        date.succ_opt().is_some_and(|next| holidays.contains(&next))
    } else {
        holidays.contains(&date)
    }
}

#[async_trait]
pub trait LeaveProvider: Send + Sync {
    async fn approved_leave_covering(&self, employee_id: u64, date: NaiveDate) -> EngineResult<Option<LeaveKind>>;

    async fn approved_leave_between(
        &self,
        employee_id: u64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<BTreeMap<NaiveDate, LeaveKind>> {
        let mut days = BTreeMap::new();
        for date in start.iter_days().take_while(|d| *d <= end) {
            if let Some(kind) = self.approved_leave_covering(employee_id, date).await? {
                days.insert(date, kind);
            }
        }
        Ok(days)
    }
}

#[async_trait]
pub trait ShiftCatalog: Send + Sync {
    async fn assigned_shift(&self, employee_id: u64) -> EngineResult<Option<ShiftDefinition>>;

    async fn approved_adjustment(&self, employee_id: u64, date: NaiveDate) -> EngineResult<Option<ShiftDefinition>>;

    async fn shift_by_code(&self, code: &str) -> EngineResult<Option<ShiftDefinition>>;

    async fn approved_adjustments_between(
        &self,
        employee_id: u64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<BTreeMap<NaiveDate, ShiftDefinition>> {
        let mut days = BTreeMap::new();
        for date in start.iter_days().take_while(|d| *d <= end) {
            if let Some(shift) = self.approved_adjustment(employee_id, date).await? {
                days.insert(date, shift);
            }
        }
        Ok(days)
    }

    /// Marks a pending adjustment approved. `None` when no pending adjustment has this id.
    async fn approve_adjustment(&self, adjustment_id: u64) -> EngineResult<Option<ShiftAdjustment>>;
}

#[async_trait]
pub trait OvertimeProvider: Send + Sync {
    async fn approved_overtime(&self, employee_id: u64, date: NaiveDate) -> EngineResult<Option<OvertimeWindow>>;
}
