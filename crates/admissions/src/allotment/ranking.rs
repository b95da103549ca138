use serde::Serialize;

use crate::students::domain::MAX_SUBJECT_MARK;
use crate::students::{MarksStatus, StudentRecord};

/// Multiplier applied to the class 12 total so it always dominates the class 10 total.
pub const SCORE_WEIGHT: u64 = 1000;

const MAX_CLASS10_TOTAL: u64 = 5 * MAX_SUBJECT_MARK as u64;
const _: () = assert!(SCORE_WEIGHT > MAX_CLASS10_TOTAL);

/// Verified marks and no seat yet. A blank seat value counts as no seat.
pub fn is_eligible(record: &StudentRecord) -> bool {
    record.marks_status == MarksStatus::Verified && !record.has_seat()
}

/// Ranking key derived from both marks records; missing records contribute zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CandidateScore {
    pub class12_total: u32,
    pub class10_total: u32,
    pub score: u64,
}

impl CandidateScore {
    pub fn of(record: &StudentRecord) -> Self {
        let class12_total = record.class12.map_or(0, |marks| marks.total());
        let class10_total = record.class10.map_or(0, |marks| marks.total());

        Self {
            class12_total,
            class10_total,
            score: u64::from(class12_total) * SCORE_WEIGHT + u64::from(class10_total),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub record: StudentRecord,
    pub score: CandidateScore,
}

/// Score every eligible record, dropping the rest.
pub fn score_candidates(records: Vec<StudentRecord>) -> Vec<RankedCandidate> {
    records
        .into_iter()
        .filter(is_eligible)
        .map(|record| {
            let score = CandidateScore::of(&record);
            RankedCandidate { record, score }
        })
        .collect()
}

/// Highest score first. The sort is stable, so equal scores keep the storage order.
pub fn rank_candidates(mut candidates: Vec<RankedCandidate>) -> Vec<RankedCandidate> {
    candidates.sort_by(|a, b| b.score.score.cmp(&a.score.score));
    candidates
}
