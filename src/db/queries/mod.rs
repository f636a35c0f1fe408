pub mod audit_log;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod importer;
pub mod opportunity;
pub mod program;
pub mod proposal;
pub mod requests;
pub mod user;
pub mod vendor;
