use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::domain::{
    out_of_range_subjects, Branch, MarksStatus, ReceiptStatus, RegistrationSubmission,
    SeatStatus, StudentFilter, StudentId, StudentRecord, SubmittedMarks,
};
use super::repository::{CandidateStore, StoreError};

pub const MARKS_MISMATCH_NOTICE: &str =
    "Your submitted marks do not match official records. Please check.";
pub const MARKSHEET_REJECTED_NOTICE: &str =
    "Your 12th marksheet has been rejected. Please re-upload or contact faculty.";

/// Service covering the applicant lifecycle up to (and after) seat allotment.
pub struct StudentService<S> {
    store: Arc<S>,
}

impl<S> StudentService<S>
where
    S: CandidateStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Create a student or refresh the existing record registered under the same e-mail.
    pub fn register(
        &self,
        submission: RegistrationSubmission,
    ) -> Result<StudentRecord, StudentServiceError> {
        let mut missing = Vec::new();
        if submission.name.trim().is_empty() {
            missing.push("name");
        }
        if submission.email.trim().is_empty() {
            missing.push("email");
        }
        if submission.phone.trim().is_empty() {
            missing.push("phone");
        }
        if blank(&submission.branch1) {
            missing.push("branch1");
        }
        if !missing.is_empty() {
            return Err(StudentServiceError::MissingFields(missing));
        }

        let out_of_range = out_of_range_subjects(&submission.class10, &submission.class12);
        if !out_of_range.is_empty() {
            return Err(StudentServiceError::MarksOutOfRange(out_of_range));
        }

        let branch1 = canonical_branch(submission.branch1.as_deref())?;
        let branch2 = canonical_branch(submission.branch2.as_deref())?;
        let marksheet_ref = submission.marksheet_ref.filter(|r| !r.trim().is_empty());
        let email = submission.email.trim().to_string();
        let now = Utc::now();

        if let Some(mut existing) = self.store.find_by_email(&email)? {
            existing.name = submission.name;
            existing.phone = submission.phone;
            existing.branch_choice_1 = branch1;
            existing.branch_choice_2 = branch2;
            existing.class10 = Some(submission.class10);
            existing.class12 = Some(submission.class12);
            if marksheet_ref.is_some() {
                existing.marks_status = MarksStatus::Pending;
                existing.marksheet_ref = marksheet_ref;
            }
            existing.updated_at = now;

            self.store.update(&existing)?;
            info!(student_id = %existing.id, "student registration updated");
            return Ok(existing);
        }

        let record = StudentRecord {
            id: StudentId::generate(),
            name: submission.name,
            email,
            phone: submission.phone,
            branch_choice_1: branch1,
            branch_choice_2: branch2,
            marksheet_ref,
            class10: Some(submission.class10),
            class12: Some(submission.class12),
            marks_status: MarksStatus::Pending,
            seat_allotted: None,
            seat_status: None,
            seat_accepted: None,
            notification: None,
            receipt_ref: None,
            receipt_status: None,
            created_at: now,
            updated_at: now,
        };

        let stored = self.store.insert(record)?;
        info!(student_id = %stored.id, "student registered");
        Ok(stored)
    }

    pub fn get(&self, id: &StudentId) -> Result<StudentRecord, StudentServiceError> {
        let record = self.store.fetch(id)?.ok_or(StoreError::NotFound)?;
        Ok(record)
    }

    pub fn list_students(
        &self,
        filter: StudentFilter,
    ) -> Result<Vec<StudentRecord>, StudentServiceError> {
        Ok(self.store.list_students(filter)?)
    }

    /// Roster of students currently holding a seat in `branch`.
    pub fn list_by_branch(
        &self,
        branch: Branch,
    ) -> Result<Vec<StudentRecord>, StudentServiceError> {
        Ok(self.store.list_by_branch(branch)?)
    }

    /// Attach a fee receipt reference; it waits for review as `PENDING`.
    pub fn submit_receipt(
        &self,
        id: &StudentId,
        receipt_ref: &str,
    ) -> Result<StudentRecord, StudentServiceError> {
        let receipt_ref = receipt_ref.trim();
        if receipt_ref.is_empty() {
            return Err(StudentServiceError::MissingFields(vec!["receiptRef"]));
        }

        let mut record = self.get(id)?;
        record.receipt_ref = Some(receipt_ref.to_string());
        record.receipt_status = Some(ReceiptStatus::Pending);
        record.updated_at = Utc::now();

        self.store.update(&record)?;
        info!(student_id = %record.id, "fee receipt submitted");
        Ok(record)
    }

    /// Review outcome for the fee receipt. The notification is replaced, or cleared when
    /// none is given; the seat is left as it is.
    pub fn set_receipt_status(
        &self,
        id: &StudentId,
        status: ReceiptStatus,
        notification: Option<String>,
    ) -> Result<StudentRecord, StudentServiceError> {
        let mut record = self.get(id)?;
        record.receipt_status = Some(status);
        record.notification = notification.filter(|n| !n.trim().is_empty());
        record.updated_at = Utc::now();

        self.store.update(&record)?;
        info!(student_id = %record.id, status = status.as_str(), "receipt status updated");
        Ok(record)
    }

    /// Compare claimed marks with the stored official record; any difference rejects.
    pub fn verify_marks(
        &self,
        id: &StudentId,
        submitted: SubmittedMarks,
    ) -> Result<StudentRecord, StudentServiceError> {
        let mut record = self.get(id)?;
        let (Some(class10), Some(class12)) = (record.class10, record.class12) else {
            return Err(StudentServiceError::OfficialMarksMissing);
        };

        if submitted.matches(&class10, &class12) {
            record.marks_status = MarksStatus::Verified;
            record.notification = None;
        } else {
            record.marks_status = MarksStatus::Rejected;
            record.notification = Some(MARKS_MISMATCH_NOTICE.to_string());
        }
        record.updated_at = Utc::now();

        self.store.update(&record)?;
        info!(student_id = %record.id, status = record.marks_status.as_str(), "marks verified");
        Ok(record)
    }

    /// Administrative override of the marksheet verification state.
    pub fn set_marks_status(
        &self,
        id: &StudentId,
        status: MarksStatus,
    ) -> Result<StudentRecord, StudentServiceError> {
        let mut record = self.get(id)?;
        record.marks_status = status;
        if status == MarksStatus::Rejected {
            record.notification = Some(MARKSHEET_REJECTED_NOTICE.to_string());
        }
        record.updated_at = Utc::now();

        self.store.update(&record)?;
        Ok(record)
    }

    /// Record the student's answer to an allotted seat. `None` resets the answer.
    pub fn respond_to_seat(
        &self,
        id: &StudentId,
        accepted: Option<bool>,
    ) -> Result<StudentRecord, StudentServiceError> {
        let mut record = self.get(id)?;
        if !record.has_seat() {
            return Err(StudentServiceError::NoSeatAllotted);
        }

        record.seat_accepted = accepted;
        record.seat_status = Some(SeatStatus::from_acceptance(accepted));
        record.updated_at = Utc::now();

        self.store.update(&record)?;
        info!(
            student_id = %record.id,
            status = SeatStatus::from_acceptance(accepted).as_str(),
            "seat response recorded"
        );
        Ok(record)
    }

    /// Remove an application entirely.
    pub fn withdraw(&self, id: &StudentId) -> Result<(), StudentServiceError> {
        self.store.remove(id)?;
        info!(student_id = %id, "application withdrawn");
        Ok(())
    }
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

fn canonical_branch(raw: Option<&str>) -> Result<Option<String>, StudentServiceError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => Branch::parse(value)
            .map(|branch| Some(branch.as_str().to_string()))
            .ok_or_else(|| StudentServiceError::UnknownBranch(value.to_string())),
        None => Ok(None),
    }
}

/// Error raised by the student service.
#[derive(Debug, thiserror::Error)]
pub enum StudentServiceError {
    #[error("missing fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("marks must be between 0 and 100: {}", .0.join(", "))]
    MarksOutOfRange(Vec<&'static str>),
    #[error("unknown branch '{0}'")]
    UnknownBranch(String),
    #[error("official marks not found")]
    OfficialMarksMissing,
    #[error("no seat has been allotted")]
    NoSeatAllotted,
    #[error(transparent)]
    Store(#[from] StoreError),
}
