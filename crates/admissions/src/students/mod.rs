//! Applicant records: registration, marks verification, seat responses and the store seam
//! the seat allotment run reads from.

pub mod domain;
pub mod lease;
pub mod repository;
pub mod router;
pub mod service;
pub mod sqlite;

#[cfg(test)]
pub(crate) mod tests;

pub use domain::{
    Branch, MarksStatus, ReceiptStatus, RegistrationSubmission, SeatAssignment, SeatStatus,
    SecondaryMarks, SeniorSecondaryMarks, StudentFilter, StudentId, StudentRecord,
    StudentStatusView, SubmittedMarks, SubmittedSecondaryMarks, UnknownBranch,
};
pub use lease::RunLease;
pub use repository::{CandidateStore, StoreError};
pub use router::student_router;
pub use service::{StudentService, StudentServiceError};
pub use sqlite::SqliteCandidateStore;
