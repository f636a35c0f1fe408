pub mod audit_log;
pub mod opportunity;
pub mod program;
pub mod proposal;
pub mod request;
pub mod user;
pub mod vendor;
