//! CSV roster import used to seed a store for offline allotment runs.

use std::io::Read;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Deserializer};

use crate::students::domain::out_of_range_subjects;
use crate::students::{
    CandidateStore, MarksStatus, SecondaryMarks, SeniorSecondaryMarks, StoreError, StudentId,
    StudentRecord,
};

#[derive(Debug, thiserror::Error)]
pub enum RosterImportError {
    #[error("failed to read roster: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid roster CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("roster row {row}: {message}")]
    InvalidRow { row: usize, message: String },
    #[error("could not load roster into store: {0}")]
    Store(#[from] StoreError),
}

pub struct RosterImporter;

impl RosterImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<StudentRecord>, RosterImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Rows keep their file order, which becomes the tie-break order of the store.
    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<StudentRecord>, RosterImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let now = Utc::now();
        let mut records = Vec::new();

        for (index, row) in csv_reader.deserialize::<RosterRow>().enumerate() {
            let row = row?;
            records.push(row.into_record(index + 1, now)?);
        }

        Ok(records)
    }

    /// Insert every roster record into `store` as one batch, returning how many were loaded.
    ///
    /// On a durable store a rejected record (a duplicate id, say) leaves none of the roster
    /// behind, so a corrected file can simply be loaded again.
    pub fn load_into<S>(
        store: &S,
        records: Vec<StudentRecord>,
    ) -> Result<usize, RosterImportError>
    where
        S: CandidateStore + ?Sized,
    {
        Ok(store.insert_all(records)?)
    }
}

#[derive(Debug, Deserialize)]
struct RosterRow {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    id: Option<String>,
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    phone: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    branch_choice_1: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    branch_choice_2: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    marks_status: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    seat_allotted: Option<String>,
    english10: Option<u32>,
    math10: Option<u32>,
    science10: Option<u32>,
    hindi10: Option<u32>,
    social10: Option<u32>,
    physics12: Option<u32>,
    chemistry12: Option<u32>,
    math12: Option<u32>,
}

impl RosterRow {
    fn into_record(
        self,
        row: usize,
        now: chrono::DateTime<Utc>,
    ) -> Result<StudentRecord, RosterImportError> {
        let marks_status = match self.marks_status.as_deref() {
            Some(raw) => MarksStatus::parse(raw).ok_or_else(|| RosterImportError::InvalidRow {
                row,
                message: format!("unknown marks_status '{raw}'"),
            })?,
            None => MarksStatus::Pending,
        };

        let class10 = match (
            self.english10,
            self.math10,
            self.science10,
            self.hindi10,
            self.social10,
        ) {
            (Some(english), Some(math), Some(science), Some(hindi), Some(social)) => {
                Some(SecondaryMarks {
                    english,
                    math,
                    science,
                    hindi,
                    social,
                })
            }
            _ => None,
        };

        let class12 = match (self.physics12, self.chemistry12, self.math12) {
            (Some(physics), Some(chemistry), Some(math)) => Some(SeniorSecondaryMarks {
                physics,
                chemistry,
                math,
            }),
            _ => None,
        };

        let out_of_range = out_of_range_subjects(
            &class10.unwrap_or_default(),
            &class12.unwrap_or_default(),
        );
        if !out_of_range.is_empty() {
            return Err(RosterImportError::InvalidRow {
                row,
                message: format!("marks above 100: {}", out_of_range.join(", ")),
            });
        }

        Ok(StudentRecord {
            id: self.id.map(StudentId).unwrap_or_else(StudentId::generate),
            name: self.name,
            email: self.email,
            phone: self.phone,
            branch_choice_1: self.branch_choice_1,
            branch_choice_2: self.branch_choice_2,
            marksheet_ref: None,
            class10,
            class12,
            marks_status,
            seat_allotted: self.seat_allotted,
            seat_status: None,
            seat_accepted: None,
            notification: None,
            receipt_ref: None,
            receipt_status: None,
            created_at: now,
            updated_at: now,
        })
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HEADER: &str = "id,name,email,phone,branch_choice_1,branch_choice_2,marks_status,seat_allotted,english10,math10,science10,hindi10,social10,physics12,chemistry12,math12\n";

    fn parse(rows: &str) -> Result<Vec<StudentRecord>, RosterImportError> {
        RosterImporter::from_reader(Cursor::new(format!("{HEADER}{rows}")))
    }

    #[test]
    fn parses_rows_in_file_order() {
        let records = parse(
            "s1,Asha,asha@example.edu,98,CSE,ECE,VERIFIED,,80,90,85,70,75,88,82,95\n\
             s2,Ravi,ravi@example.edu,97,civil,,pending,,,,,,,,,\n",
        )
        .expect("roster parses");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id.0, "s1");
        assert_eq!(records[0].marks_status, MarksStatus::Verified);
        assert_eq!(records[0].class12.map(|m| m.total()), Some(265));
        assert_eq!(records[1].branch_choice_2, None);
        assert_eq!(records[1].marks_status, MarksStatus::Pending);
        assert!(records[1].class10.is_none());
    }

    #[test]
    fn rejects_unknown_marks_status() {
        match parse("s1,Asha,a@x,1,CSE,,MAYBE,,1,1,1,1,1,1,1,1\n") {
            Err(RosterImportError::InvalidRow { row, message }) => {
                assert_eq!(row, 1);
                assert!(message.contains("MAYBE"));
            }
            other => panic!("expected invalid row, got {other:?}"),
        }
    }

    #[test]
    fn rejects_marks_above_one_hundred() {
        let result = parse("s1,Asha,a@x,1,CSE,,VERIFIED,,1,1,1,1,1,1,1,180\n");
        assert!(matches!(result, Err(RosterImportError::InvalidRow { .. })));
    }

    #[test]
    fn blank_id_generates_one() {
        let records =
            parse(",Asha,a@x,1,CSE,,VERIFIED,,1,1,1,1,1,1,1,1\n").expect("roster parses");
        assert!(records[0].id.0.starts_with("stu-"));
    }
}
