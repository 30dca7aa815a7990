use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::shift::TimeWindow;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
    strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PeriodType {
    Regular,
    Overtime,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
    strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CheckAction {
    CheckIn,
    CheckOut,
}

/// Progress of one period within a day. Ordered: a period only moves forward.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
    strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PeriodState {
    Absent,
    CheckedIn,
    CheckedOut,
}

impl PeriodState {
    fn from_stamps(check_in: Option<NaiveDateTime>, check_out: Option<NaiveDateTime>) -> Self {
        match (check_in, check_out) {
            (_, Some(_)) => PeriodState::CheckedOut,
            (Some(_), None) => PeriodState::CheckedIn,
            (None, None) => PeriodState::Absent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OvertimeEntry {
    pub request_id: u64,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub actual_start: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub actual_end: Option<NaiveDateTime>,
}

impl OvertimeEntry {
    pub fn state(&self) -> PeriodState {
        PeriodState::from_stamps(self.actual_start, self.actual_end)
    }

    pub fn closed_interval(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        match (self.actual_start, self.actual_end) {
            (Some(start), Some(end)) if end > start => Some((start, end)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AttendanceFlags {
    pub is_late_check_in: bool,
    pub is_early_check_out: bool,
    pub is_overtime: bool,
    pub is_manual_entry: bool,
    pub is_day_off: bool,
    /// A collaborator lookup fell back to its default while this record was written.
    pub is_degraded: bool,
}

/// One employee-day as persisted in `daily_attendance`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AttendanceRecord {
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub regular_check_in: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub regular_check_out: Option<NaiveDateTime>,
    pub overtime_entries: Vec<OvertimeEntry>,
    pub state: PeriodState,
    pub flags: AttendanceFlags,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub shift_start: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub shift_end: Option<NaiveDateTime>,
    /// Optimistic concurrency token, bumped on every write.
    #[serde(default)]
    pub version: u32,
}

impl AttendanceRecord {
    pub fn new(employee_id: u64, date: NaiveDate, shift: Option<TimeWindow>) -> Self {
        Self {
            employee_id,
            date,
            regular_check_in: None,
            regular_check_out: None,
            overtime_entries: Vec::new(),
            state: PeriodState::Absent,
            flags: AttendanceFlags::default(),
            shift_start: shift.map(|w| w.start),
            shift_end: shift.map(|w| w.end),
            version: 0,
        }
    }

    pub fn regular_state(&self) -> PeriodState {
        PeriodState::from_stamps(self.regular_check_in, self.regular_check_out)
    }

    pub fn overtime_entry(&self, request_id: u64) -> Option<&OvertimeEntry> {
        self.overtime_entries.iter().find(|e| e.request_id == request_id)
    }

    pub fn overtime_state(&self, request_id: u64) -> PeriodState {
        self.overtime_entry(request_id)
            .map(OvertimeEntry::state)
            .unwrap_or(PeriodState::Absent)
    }

    pub fn shift_window(&self) -> Option<TimeWindow> {
        match (self.shift_start, self.shift_end) {
            (Some(start), Some(end)) => Some(TimeWindow { start, end }),
            _ => None,
        }
    }

    /// Applies a stamp, refusing anything that would move a period backwards or
    /// overwrite an existing stamp. Manual corrections go through [`Self::correct`].
    pub fn apply(
        &mut self,
        action: CheckAction,
        period: PeriodType,
        overtime_id: Option<u64>,
        at: NaiveDateTime,
    ) -> Result<(), String> {
        match period {
            PeriodType::Regular => {
                let slot = match action {
                    CheckAction::CheckIn => &mut self.regular_check_in,
                    CheckAction::CheckOut => &mut self.regular_check_out,
                };
                if slot.is_some() {
                    return Err(format!("regular {action} already recorded"));
                }
                *slot = Some(at);
            }
            PeriodType::Overtime => {
                let request_id =
                    overtime_id.ok_or_else(|| "overtime stamp without a request id".to_string())?;
                let idx = match self.overtime_entries.iter().position(|e| e.request_id == request_id) {
                    Some(idx) => idx,
                    None => {
                        self.overtime_entries.push(OvertimeEntry {
                            request_id,
                            actual_start: None,
                            actual_end: None,
                        });
                        self.overtime_entries.len() - 1
                    }
                };
                let entry = &mut self.overtime_entries[idx];
                let slot = match action {
                    CheckAction::CheckIn => &mut entry.actual_start,
                    CheckAction::CheckOut => &mut entry.actual_end,
                };
                if slot.is_some() {
                    return Err(format!("overtime {action} already recorded"));
                }
                *slot = Some(at);
                self.flags.is_overtime = true;
            }
        }
        self.state = self.regular_state();
        Ok(())
    }

    /// Overwrites the regular stamps. The only path allowed to move state backwards.
    pub fn correct(&mut self, check_in: Option<NaiveDateTime>, check_out: Option<NaiveDateTime>) {
        self.regular_check_in = check_in;
        self.regular_check_out = check_out;
        self.flags.is_manual_entry = true;
        self.state = self.regular_state();
    }
}
