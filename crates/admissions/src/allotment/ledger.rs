use std::collections::BTreeMap;

use serde::Serialize;

use super::capacity::CapacityTable;
use crate::students::Branch;

/// Seat bookkeeping for one run.
///
/// Built once from a storage snapshot; `remaining` only ever decreases afterwards and is
/// never re-read from storage mid-run.
#[derive(Debug, Clone)]
pub struct SeatLedger {
    capacities: CapacityTable,
    allocated_counts: BTreeMap<Branch, usize>,
    remaining: BTreeMap<Branch, u32>,
}

impl SeatLedger {
    pub fn open(capacities: CapacityTable, allocated_counts: BTreeMap<Branch, usize>) -> Self {
        let remaining = capacities
            .iter()
            .map(|(branch, seats)| {
                let taken = allocated_counts.get(&branch).copied().unwrap_or(0);
                let taken = u32::try_from(taken).unwrap_or(u32::MAX);
                (branch, seats.saturating_sub(taken))
            })
            .collect();

        Self {
            capacities,
            allocated_counts,
            remaining,
        }
    }

    pub fn remaining(&self, branch: Branch) -> u32 {
        self.remaining.get(&branch).copied().unwrap_or(0)
    }

    /// Take one seat in `branch` if any is left.
    pub fn claim(&mut self, branch: Branch) -> bool {
        match self.remaining.get_mut(&branch) {
            Some(seats) if *seats > 0 => {
                *seats -= 1;
                true
            }
            _ => false,
        }
    }

    pub fn has_vacancies(&self) -> bool {
        self.remaining.values().any(|seats| *seats > 0)
    }

    pub fn details(&self) -> AllotmentDetails {
        AllotmentDetails {
            capacities: self.capacities.clone(),
            allocated_counts: self.allocated_counts.clone(),
            remaining: self.remaining.clone(),
        }
    }
}

/// Capacity report returned with every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllotmentDetails {
    pub capacities: CapacityTable,
    /// Seats already held before the run started.
    pub allocated_counts: BTreeMap<Branch, usize>,
    pub remaining: BTreeMap<Branch, u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allotment::capacity::{resolve_capacities, CapacityDefaults, CapacityOverrides};

    fn table(cse: u32) -> CapacityTable {
        resolve_capacities(
            &CapacityDefaults::default(),
            &CapacityOverrides::new().with(Branch::Cse, cse),
        )
    }

    #[test]
    fn remaining_subtracts_prior_assignments_without_going_negative() {
        let mut counts = BTreeMap::new();
        counts.insert(Branch::Cse, 5);
        counts.insert(Branch::Ece, 2);

        let ledger = SeatLedger::open(table(3), counts);

        assert_eq!(ledger.remaining(Branch::Cse), 0);
        assert_eq!(ledger.remaining(Branch::Ece), 58);
        assert_eq!(ledger.remaining(Branch::Civil), 40);
    }

    #[test]
    fn claim_decrements_until_exhausted() {
        let mut ledger = SeatLedger::open(table(2), BTreeMap::new());

        assert!(ledger.claim(Branch::Cse));
        assert!(ledger.claim(Branch::Cse));
        assert!(!ledger.claim(Branch::Cse));
        assert_eq!(ledger.remaining(Branch::Cse), 0);
        assert!(ledger.has_vacancies());
    }

    #[test]
    fn details_report_prior_counts_and_remaining() {
        let mut counts = BTreeMap::new();
        counts.insert(Branch::Cse, 1);
        let mut ledger = SeatLedger::open(table(3), counts);
        ledger.claim(Branch::Cse);

        let details = ledger.details();
        assert_eq!(details.capacities.get(Branch::Cse), 3);
        assert_eq!(details.allocated_counts.get(&Branch::Cse), Some(&1));
        assert_eq!(details.remaining.get(&Branch::Cse), Some(&1));
    }
}
