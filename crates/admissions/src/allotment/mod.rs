//! Preference-based seat allotment.
//!
//! A run resolves per-branch capacity, subtracts seats already held, ranks verified
//! unassigned candidates by marks and walks them once in rank order, giving each the first
//! declared preference that still has room.

pub mod capacity;
pub mod engine;
pub mod ledger;
pub mod ranking;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use capacity::{
    resolve_capacities, CapacityDefaults, CapacityOverrides, CapacitySource, CapacityTable,
    EnvCapacitySource,
};
pub use engine::{plan_allotment, PlannedSeat};
pub use ledger::{AllotmentDetails, SeatLedger};
pub use ranking::{rank_candidates, score_candidates, CandidateScore, RankedCandidate};
pub use router::allotment_router;
pub use service::{AllotmentError, AllotmentSummary, AllottedSeat, SeatAllotmentService};
