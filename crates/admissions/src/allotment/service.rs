use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, TryLockError};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info};

use super::capacity::{resolve_capacities, CapacityOverrides, CapacitySource};
use super::engine::{plan_allotment, PlannedSeat};
use super::ledger::{AllotmentDetails, SeatLedger};
use super::ranking::{rank_candidates, score_candidates};
use crate::students::{Branch, CandidateStore, SeatAssignment, StoreError, StudentId};

/// Runs the ranked seat allotment against a [`CandidateStore`].
///
/// At most one run executes at a time against the same data; a concurrent call fails fast
/// with [`AllotmentError::AlreadyRunning`] instead of reading a stale capacity snapshot. The
/// in-process guard answers callers sharing this service, the store's run lease answers
/// other services and processes opened on the same database.
pub struct SeatAllotmentService<S> {
    store: Arc<S>,
    capacities: Arc<dyn CapacitySource>,
    run_guard: Mutex<()>,
}

impl<S> SeatAllotmentService<S>
where
    S: CandidateStore + 'static,
{
    pub fn new(store: Arc<S>, capacities: Arc<dyn CapacitySource>) -> Self {
        Self {
            store,
            capacities,
            run_guard: Mutex::new(()),
        }
    }

    pub fn auto_allot(
        &self,
        overrides: &CapacityOverrides,
    ) -> Result<AllotmentSummary, AllotmentError> {
        let _run = match self.run_guard.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(AllotmentError::AlreadyRunning),
            // A panicked run leaves nothing behind that the next run re-uses.
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };
        let _lease = match self.store.try_acquire_run_lease() {
            Ok(Some(lease)) => lease,
            Ok(None) => {
                info!("seat allotment run refused; another run holds the lease");
                return Err(AllotmentError::AlreadyRunning);
            }
            Err(source) => {
                error!(error = %source, "failed to claim the seat allotment run");
                return Err(AllotmentError::Lease(source));
            }
        };

        let capacities = resolve_capacities(&self.capacities.defaults(), overrides);

        let mut allocated_counts = BTreeMap::new();
        for branch in Branch::ALL {
            let count = self.store.count_assigned(branch).map_err(|source| {
                error!(%branch, error = %source, "failed to count assigned seats");
                AllotmentError::Snapshot(source)
            })?;
            allocated_counts.insert(branch, count);
        }
        let mut ledger = SeatLedger::open(capacities, allocated_counts);

        let candidates = self.store.eligible_candidates().map_err(|source| {
            error!(error = %source, "failed to load eligible candidates");
            AllotmentError::Snapshot(source)
        })?;
        info!(candidates = candidates.len(), "seat allotment run started");

        let ranked = rank_candidates(score_candidates(candidates));
        let planned = plan_allotment(&ranked, &mut ledger);

        let assigned_at = Utc::now();
        let mut assignments = Vec::with_capacity(planned.len());
        for seat in planned {
            let assignment = SeatAssignment::pending(seat.branch, assigned_at);
            if let Err(source) = self.store.record_assignment(&seat.student_id, &assignment) {
                error!(
                    student_id = %seat.student_id,
                    branch = %seat.branch,
                    committed = assignments.len(),
                    error = %source,
                    "seat allotment aborted while persisting assignment"
                );
                return Err(AllotmentError::Persist {
                    student_id: seat.student_id,
                    committed: assignments.len(),
                    source,
                });
            }

            debug!(
                student_id = %seat.student_id,
                branch = %seat.branch,
                preference = seat.preference,
                score = seat.score,
                "seat allotted"
            );
            assignments.push(AllottedSeat::from(seat));
        }

        let summary = AllotmentSummary {
            allocated: assignments.len(),
            assignments,
            details: ledger.details(),
        };
        info!(allocated = summary.allocated, "seat allotment run finished");
        Ok(summary)
    }
}

/// Assignment made by a run, in allotment order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllottedSeat {
    pub student_id: StudentId,
    pub branch: Branch,
    pub preference: usize,
}

impl From<PlannedSeat> for AllottedSeat {
    fn from(seat: PlannedSeat) -> Self {
        Self {
            student_id: seat.student_id,
            branch: seat.branch,
            preference: seat.preference,
        }
    }
}

/// Outcome of a completed run. Zero allocations is still a success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllotmentSummary {
    pub allocated: usize,
    pub assignments: Vec<AllottedSeat>,
    pub details: AllotmentDetails,
}

/// Error raised by an allotment run. Any variant means the run was aborted.
#[derive(Debug, thiserror::Error)]
pub enum AllotmentError {
    #[error("a seat allotment run is already in progress")]
    AlreadyRunning,
    #[error("failed to claim the seat allotment run: {0}")]
    Lease(#[source] StoreError),
    #[error("failed to read allotment snapshot: {0}")]
    Snapshot(#[source] StoreError),
    #[error("failed to persist seat for {student_id} after {committed} assignments: {source}")]
    Persist {
        student_id: StudentId,
        committed: usize,
        #[source]
        source: StoreError,
    },
}
