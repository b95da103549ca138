use serde::Serialize;

use super::ledger::SeatLedger;
use super::ranking::RankedCandidate;
use crate::students::{Branch, StudentId, StudentRecord};

/// Seat chosen for a candidate during planning, before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedSeat {
    pub student_id: StudentId,
    pub branch: Branch,
    /// 1 for the first preference, 2 for the second.
    pub preference: usize,
    pub score: u64,
}

/// First declared preference that still has a seat in the ledger. Claims it.
///
/// Unknown branch names never match. Later preferences are only tried when every earlier
/// one is full.
pub fn choose_branch(record: &StudentRecord, ledger: &mut SeatLedger) -> Option<(Branch, usize)> {
    record
        .preferences()
        .enumerate()
        .filter_map(|(index, choice)| Branch::parse(choice).map(|branch| (branch, index + 1)))
        .find(|(branch, _)| ledger.claim(*branch))
}

/// Single greedy pass in rank order. Returns one entry per successful assignment, in the
/// order they were made; candidates with no open preference are simply skipped.
pub fn plan_allotment(ranked: &[RankedCandidate], ledger: &mut SeatLedger) -> Vec<PlannedSeat> {
    let mut planned = Vec::new();

    for candidate in ranked {
        if !ledger.has_vacancies() {
            break;
        }

        if let Some((branch, preference)) = choose_branch(&candidate.record, ledger) {
            planned.push(PlannedSeat {
                student_id: candidate.record.id.clone(),
                branch,
                preference,
                score: candidate.score.score,
            });
        }
    }

    planned
}
