//! The attendance engine proper. Components here are pure or depend only on
//! the collaborator traits in [`crate::provider`]; I/O and locking live in
//! [`crate::service`].

pub mod aggregator;
pub mod auto_completion;
pub mod payroll_summary;
pub mod period_state;
pub mod shift_window;
