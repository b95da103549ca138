use super::domain::{Branch, SeatAssignment, StudentFilter, StudentId, StudentRecord};
use super::lease::RunLease;

/// Storage abstraction shared by the student lifecycle service and the seat allotment run.
pub trait CandidateStore: Send + Sync {
    fn insert(&self, record: StudentRecord) -> Result<StudentRecord, StoreError>;

    /// Insert a batch in order, returning how many were stored.
    ///
    /// The default inserts one record at a time and keeps whatever was stored before a
    /// failure; durable stores override it to apply the batch all or nothing.
    fn insert_all(&self, records: Vec<StudentRecord>) -> Result<usize, StoreError> {
        let mut inserted = 0;
        for record in records {
            self.insert(record)?;
            inserted += 1;
        }
        Ok(inserted)
    }

    fn update(&self, record: &StudentRecord) -> Result<(), StoreError>;
    fn fetch(&self, id: &StudentId) -> Result<Option<StudentRecord>, StoreError>;
    fn find_by_email(&self, email: &str) -> Result<Option<StudentRecord>, StoreError>;
    fn remove(&self, id: &StudentId) -> Result<(), StoreError>;

    /// Every student matching `filter`, in insertion order.
    fn list_students(&self, filter: StudentFilter) -> Result<Vec<StudentRecord>, StoreError>;

    /// Students holding a seat in `branch`, in insertion order.
    fn list_by_branch(&self, branch: Branch) -> Result<Vec<StudentRecord>, StoreError>;

    /// Number of students currently holding a seat in `branch`, whatever its acceptance state.
    fn count_assigned(&self, branch: Branch) -> Result<usize, StoreError>;

    /// Students with verified marks and no seat, in insertion order.
    fn eligible_candidates(&self) -> Result<Vec<StudentRecord>, StoreError>;

    fn record_assignment(
        &self,
        id: &StudentId,
        assignment: &SeatAssignment,
    ) -> Result<(), StoreError>;

    /// Claim the allotment run for the data behind this store. `Ok(None)` means another
    /// run, possibly in another process, holds it.
    ///
    /// Stores whose data no other process can reach only need the in-process guard, which
    /// is what the default returns.
    fn try_acquire_run_lease(&self) -> Result<Option<RunLease>, StoreError> {
        Ok(Some(RunLease::process_local()))
    }
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("run lock error: {0}")]
    Lock(#[from] std::io::Error),
}
