pub mod attendance;
pub mod jobs;
pub mod payroll;
pub mod shift_adjustment;

use chrono::NaiveDateTime;

/// Wall-clock time in the server's local zone; attendance rules are local-time rules.
pub(crate) fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}
