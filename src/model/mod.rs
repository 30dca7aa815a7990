pub mod attendance;
pub mod leave_request;
pub mod overtime;
pub mod payroll;
pub mod processed;
pub mod shift;
