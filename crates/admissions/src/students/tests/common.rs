use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{TimeZone, Utc};
use serde_json::Value;

use crate::students::domain::{
    Branch, MarksStatus, ReceiptStatus, RegistrationSubmission, SeatAssignment, SecondaryMarks,
    SeniorSecondaryMarks, StudentFilter, StudentId, StudentRecord,
};
use crate::students::repository::{CandidateStore, StoreError};
use crate::students::{student_router, StudentService};

pub(crate) fn marks10(each: u32) -> SecondaryMarks {
    SecondaryMarks {
        english: each,
        math: each,
        science: each,
        hindi: each,
        social: each,
    }
}

pub(crate) fn marks12(physics: u32, chemistry: u32, math: u32) -> SeniorSecondaryMarks {
    SeniorSecondaryMarks {
        physics,
        chemistry,
        math,
    }
}

pub(crate) struct CandidateBuilder {
    record: StudentRecord,
}

/// Verified, unassigned candidate with middling marks.
pub(crate) fn candidate(id: &str, first: &str, second: Option<&str>) -> CandidateBuilder {
    let timestamp = Utc
        .with_ymd_and_hms(2025, 6, 1, 9, 0, 0)
        .single()
        .expect("valid timestamp");

    CandidateBuilder {
        record: StudentRecord {
            id: StudentId(id.to_string()),
            name: format!("Candidate {id}"),
            email: format!("{id}@example.edu"),
            phone: "9800000000".to_string(),
            branch_choice_1: Some(first.to_string()),
            branch_choice_2: second.map(str::to_string),
            marksheet_ref: None,
            class10: Some(marks10(70)),
            class12: Some(marks12(70, 70, 70)),
            marks_status: MarksStatus::Verified,
            seat_allotted: None,
            seat_status: None,
            seat_accepted: None,
            notification: None,
            receipt_ref: None,
            receipt_status: None,
            created_at: timestamp,
            updated_at: timestamp,
        },
    }
}

impl CandidateBuilder {
    pub(crate) fn with_class10(mut self, marks: SecondaryMarks) -> Self {
        self.record.class10 = Some(marks);
        self
    }

    pub(crate) fn with_class12(mut self, marks: SeniorSecondaryMarks) -> Self {
        self.record.class12 = Some(marks);
        self
    }

    pub(crate) fn with_status(mut self, status: MarksStatus) -> Self {
        self.record.marks_status = status;
        self
    }

    pub(crate) fn with_seat(mut self, seat: &str) -> Self {
        self.record.seat_allotted = Some(seat.to_string());
        self
    }

    pub(crate) fn with_receipt(mut self, reference: &str, status: Option<ReceiptStatus>) -> Self {
        self.record.receipt_ref = Some(reference.to_string());
        self.record.receipt_status = status;
        self
    }

    pub(crate) fn with_notification(mut self, notification: &str) -> Self {
        self.record.notification = Some(notification.to_string());
        self
    }

    pub(crate) fn build(self) -> StudentRecord {
        self.record
    }
}

pub(crate) fn registration() -> RegistrationSubmission {
    RegistrationSubmission {
        name: "Asha Verma".to_string(),
        email: "asha@example.edu".to_string(),
        phone: "9811111111".to_string(),
        branch1: Some("cse".to_string()),
        branch2: Some("Ece".to_string()),
        marksheet_ref: None,
        class10: SecondaryMarks {
            english: 88,
            math: 95,
            science: 91,
            hindi: 84,
            social: 79,
        },
        class12: marks12(90, 85, 97),
    }
}

/// Vec-backed store preserving insertion order.
#[derive(Default, Clone)]
pub(crate) struct MemoryStore {
    pub(crate) records: Arc<Mutex<Vec<StudentRecord>>>,
    failing_assignment: Option<StudentId>,
}

impl MemoryStore {
    pub(crate) fn with_records(records: Vec<StudentRecord>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
            failing_assignment: None,
        }
    }

    pub(crate) fn failing_assignment_for(mut self, id: &str) -> Self {
        self.failing_assignment = Some(StudentId(id.to_string()));
        self
    }

    pub(crate) fn snapshot(&self) -> Vec<StudentRecord> {
        self.records.lock().expect("store mutex poisoned").clone()
    }

    pub(crate) fn seat_of(&self, id: &str) -> Option<String> {
        self.snapshot()
            .into_iter()
            .find(|record| record.id.0 == id)
            .and_then(|record| record.seat_allotted)
    }
}

impl CandidateStore for MemoryStore {
    fn insert(&self, record: StudentRecord) -> Result<StudentRecord, StoreError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        if guard.iter().any(|existing| existing.id == record.id) {
            return Err(StoreError::Conflict);
        }
        guard.push(record.clone());
        Ok(record)
    }

    fn update(&self, record: &StudentRecord) -> Result<(), StoreError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        let slot = guard
            .iter_mut()
            .find(|existing| existing.id == record.id)
            .ok_or(StoreError::NotFound)?;
        *slot = record.clone();
        Ok(())
    }

    fn fetch(&self, id: &StudentId) -> Result<Option<StudentRecord>, StoreError> {
        let guard = self.records.lock().expect("store mutex poisoned");
        Ok(guard.iter().find(|record| &record.id == id).cloned())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<StudentRecord>, StoreError> {
        let guard = self.records.lock().expect("store mutex poisoned");
        Ok(guard.iter().find(|record| record.email == email).cloned())
    }

    fn remove(&self, id: &StudentId) -> Result<(), StoreError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        let before = guard.len();
        guard.retain(|record| &record.id != id);
        if guard.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn list_students(&self, filter: StudentFilter) -> Result<Vec<StudentRecord>, StoreError> {
        let guard = self.records.lock().expect("store mutex poisoned");
        Ok(guard
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }

    fn list_by_branch(&self, branch: Branch) -> Result<Vec<StudentRecord>, StoreError> {
        let guard = self.records.lock().expect("store mutex poisoned");
        Ok(guard
            .iter()
            .filter(|record| record.holds_seat_in(branch))
            .cloned()
            .collect())
    }

    fn count_assigned(&self, branch: Branch) -> Result<usize, StoreError> {
        let guard = self.records.lock().expect("store mutex poisoned");
        Ok(guard
            .iter()
            .filter(|record| record.holds_seat_in(branch))
            .count())
    }

    fn eligible_candidates(&self) -> Result<Vec<StudentRecord>, StoreError> {
        let guard = self.records.lock().expect("store mutex poisoned");
        Ok(guard
            .iter()
            .filter(|record| record.marks_status == MarksStatus::Verified && !record.has_seat())
            .cloned()
            .collect())
    }

    fn record_assignment(
        &self,
        id: &StudentId,
        assignment: &SeatAssignment,
    ) -> Result<(), StoreError> {
        if self.failing_assignment.as_ref() == Some(id) {
            return Err(StoreError::Unavailable("write timed out".to_string()));
        }

        let mut guard = self.records.lock().expect("store mutex poisoned");
        let record = guard
            .iter_mut()
            .find(|record| &record.id == id)
            .ok_or(StoreError::NotFound)?;
        record.seat_allotted = Some(assignment.branch.as_str().to_string());
        record.seat_status = Some(assignment.status);
        record.seat_accepted = None;
        record.notification = Some(assignment.notification.clone());
        record.updated_at = assignment.assigned_at;
        Ok(())
    }
}

/// Every call fails as if the database were offline.
pub(crate) struct UnavailableStore;

impl CandidateStore for UnavailableStore {
    fn insert(&self, _record: StudentRecord) -> Result<StudentRecord, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _record: &StudentRecord) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &StudentId) -> Result<Option<StudentRecord>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn find_by_email(&self, _email: &str) -> Result<Option<StudentRecord>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn remove(&self, _id: &StudentId) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn list_students(&self, _filter: StudentFilter) -> Result<Vec<StudentRecord>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn list_by_branch(&self, _branch: Branch) -> Result<Vec<StudentRecord>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn count_assigned(&self, _branch: Branch) -> Result<usize, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn eligible_candidates(&self) -> Result<Vec<StudentRecord>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn record_assignment(
        &self,
        _id: &StudentId,
        _assignment: &SeatAssignment,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

pub(crate) fn build_service() -> (StudentService<MemoryStore>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::default());
    let service = StudentService::new(store.clone());
    (service, store)
}

pub(crate) fn student_router_with_service(service: StudentService<MemoryStore>) -> axum::Router {
    student_router(Arc::new(service))
}

pub(crate) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 16 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
