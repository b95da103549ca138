//! Student admissions: applicant records and preference-based seat allotment.

pub mod allotment;
pub mod config;
pub mod error;
pub mod roster;
pub mod students;
pub mod telemetry;
