use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::shift::{ApprovalStatus, TimeWindow};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OvertimeRequest {
    pub id: u64,
    pub employee_id: u64,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: ApprovalStatus,
}

impl OvertimeRequest {
    /// Absolute window of the request; an end before the start runs past midnight.
    pub fn window(&self) -> OvertimeWindow {
        let start = self.date.and_time(self.start_time);
        let mut end = self.date.and_time(self.end_time);
        if end <= start {
            end += Duration::days(1);
        }
        OvertimeWindow {
            request_id: self.id,
            window: TimeWindow { start, end },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OvertimeWindow {
    pub request_id: u64,
    pub window: TimeWindow,
}

impl OvertimeWindow {
    pub fn start(&self) -> NaiveDateTime {
        self.window.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.window.end
    }

    pub fn has_begun(&self, now: NaiveDateTime) -> bool {
        now >= self.window.start
    }
}
