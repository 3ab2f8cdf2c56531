//! Supporting services for the auth server

pub mod audit;

pub use audit::{AuditLog, AuditOutcome, AuditRecord};
