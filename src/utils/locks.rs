use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::error::{EngineError, EngineResult};

type Key = (u64, NaiveDate);

/// Application-level mutual exclusion per (employee, date).
///
/// Only keys that are currently held are stored, and a key leaves the map
/// when its guard drops, so a live holder is never forgotten. Across
/// processes the database's `UNIQUE(employee_id, date)` and version column
/// still decide.
#[derive(Clone, Default)]
pub struct EmployeeDayLocks {
    held: Arc<DashMap<Key, ()>>,
}

/// Releases its employee-day on drop.
#[must_use]
#[derive(Debug)]
pub struct EmployeeDayGuard {
    held: Arc<DashMap<Key, ()>>,
    key: Key,
}

impl Drop for EmployeeDayGuard {
    fn drop(&mut self) {
        self.held.remove(&self.key);
    }
}

impl EmployeeDayLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails fast with a retryable conflict instead of queueing behind the holder.
    pub fn try_acquire(&self, employee_id: u64, date: NaiveDate) -> EngineResult<EmployeeDayGuard> {
        let key = (employee_id, date);
        match self.held.entry(key) {
            Entry::Occupied(_) => {
                tracing::info!(employee_id, %date, "Employee-day is locked by another request");
                Err(EngineError::ConcurrencyConflict { employee_id, date })
            }
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(EmployeeDayGuard {
                    held: self.held.clone(),
                    key,
                })
            }
        }
    }

    #[cfg(test)]
    fn held_count(&self) -> usize {
        self.held.len()
    }
}
