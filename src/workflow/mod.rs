//! Business rules that run without a database connection.

pub mod creation;
pub mod import;
pub mod negotiation;
pub mod pricing;
pub mod stage;
