use std::collections::BTreeMap;

use crate::allotment::capacity::{resolve_capacities, CapacityDefaults, CapacityOverrides};
use crate::allotment::engine::{choose_branch, plan_allotment};
use crate::allotment::ledger::SeatLedger;
use crate::allotment::ranking::{rank_candidates, score_candidates};
use crate::students::tests::common::{candidate, marks12};
use crate::students::{Branch, StudentRecord};

fn ledger(overrides: CapacityOverrides) -> SeatLedger {
    let empty = CapacityDefaults::default()
        .with(Branch::Cse, 0)
        .with(Branch::Ece, 0)
        .with(Branch::Civil, 0)
        .with(Branch::Mechanical, 0);
    SeatLedger::open(resolve_capacities(&empty, &overrides), BTreeMap::new())
}

fn plan(records: Vec<StudentRecord>, ledger: &mut SeatLedger) -> Vec<(String, Branch)> {
    let ranked = rank_candidates(score_candidates(records));
    plan_allotment(&ranked, ledger)
        .into_iter()
        .map(|seat| (seat.student_id.0, seat.branch))
        .collect()
}

#[test]
fn higher_score_claims_last_seat() {
    let mut seats = ledger(CapacityOverrides::new().with(Branch::Cse, 1));
    let records = vec![
        candidate("b", "CSE", None)
            .with_class12(marks12(60, 60, 60))
            .build(),
        candidate("a", "CSE", None)
            .with_class12(marks12(95, 95, 95))
            .build(),
    ];

    let planned = plan(records, &mut seats);

    assert_eq!(planned, vec![("a".to_string(), Branch::Cse)]);
    assert_eq!(seats.remaining(Branch::Cse), 0);
}

#[test]
fn second_preference_used_only_when_first_is_full() {
    let mut seats = ledger(
        CapacityOverrides::new()
            .with(Branch::Cse, 1)
            .with(Branch::Ece, 5),
    );
    let records = vec![
        candidate("top", "CSE", Some("ECE"))
            .with_class12(marks12(99, 99, 99))
            .build(),
        candidate("next", "CSE", Some("ECE"))
            .with_class12(marks12(90, 90, 90))
            .build(),
    ];

    let planned = plan(records, &mut seats);

    assert_eq!(
        planned,
        vec![
            ("top".to_string(), Branch::Cse),
            ("next".to_string(), Branch::Ece),
        ]
    );
    assert_eq!(seats.remaining(Branch::Ece), 4);
}

#[test]
fn greedy_pass_does_not_displace_earlier_claims() {
    // "top" takes the only CSE seat even though "runner" has no alternative.
    let mut seats = ledger(
        CapacityOverrides::new()
            .with(Branch::Cse, 1)
            .with(Branch::Civil, 1),
    );
    let records = vec![
        candidate("runner", "CSE", None)
            .with_class12(marks12(80, 80, 80))
            .build(),
        candidate("top", "CSE", Some("CIVIL"))
            .with_class12(marks12(99, 99, 99))
            .build(),
    ];

    let planned = plan(records, &mut seats);

    assert_eq!(planned, vec![("top".to_string(), Branch::Cse)]);
    assert_eq!(seats.remaining(Branch::Civil), 1);
}

#[test]
fn ties_resolve_in_storage_order() {
    let mut seats = ledger(CapacityOverrides::new().with(Branch::Mechanical, 1));
    let records = vec![
        candidate("first", "MECHANICAL", None).build(),
        candidate("second", "MECHANICAL", None).build(),
    ];

    let planned = plan(records.clone(), &mut seats);
    assert_eq!(planned, vec![("first".to_string(), Branch::Mechanical)]);

    let mut rerun = ledger(CapacityOverrides::new().with(Branch::Mechanical, 1));
    assert_eq!(plan(records, &mut rerun), planned);
}

#[test]
fn lowercase_and_unknown_preferences() {
    let mut seats = ledger(CapacityOverrides::new().with(Branch::Ece, 1));
    let mut record = candidate("mixed", "aerospace", Some(" ece ")).build();

    let choice = choose_branch(&record, &mut seats);
    assert_eq!(choice, Some((Branch::Ece, 2)));

    record.branch_choice_1 = None;
    record.branch_choice_2 = Some(String::new());
    assert_eq!(choose_branch(&record, &mut seats), None);
}

#[test]
fn candidates_without_open_preferences_are_skipped() {
    let mut seats = ledger(
        CapacityOverrides::new()
            .with(Branch::Cse, 1)
            .with(Branch::Civil, 1),
    );
    let records = vec![
        candidate("one", "CSE", None)
            .with_class12(marks12(99, 99, 99))
            .build(),
        candidate("two", "CSE", Some("ECE"))
            .with_class12(marks12(90, 90, 90))
            .build(),
        candidate("three", "CIVIL", None)
            .with_class12(marks12(80, 80, 80))
            .build(),
    ];

    let planned = plan(records, &mut seats);

    assert_eq!(
        planned,
        vec![
            ("one".to_string(), Branch::Cse),
            ("three".to_string(), Branch::Civil),
        ]
    );
}
