//! SQLite-backed [`CandidateStore`].
//!
//! Only this module issues SQL. Callers go through the trait.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::types::Type;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row, Transaction};

use super::domain::{
    Branch, MarksStatus, ReceiptStatus, SeatAssignment, SeatStatus, SecondaryMarks,
    SeniorSecondaryMarks, StudentFilter, StudentId, StudentRecord,
};
use super::lease::{lock_path_for, RunLease};
use super::repository::{CandidateStore, StoreError};

const SELECT_STUDENT: &str = "SELECT s.id, s.name, s.email, s.phone, s.branch_choice_1,
        s.branch_choice_2, s.marksheet_ref, s.marks_status, s.seat_allotted, s.seat_status,
        s.seat_accepted, s.notification, s.created_at, s.updated_at,
        s.receipt_ref, s.receipt_status,
        c10.english, c10.math, c10.science, c10.hindi, c10.social,
        c12.physics, c12.chemistry, c12.math
     FROM student s
     LEFT JOIN class10_marks c10 ON c10.student_id = s.id
     LEFT JOIN class12_marks c12 ON c12.student_id = s.id";

pub struct SqliteCandidateStore {
    conn: Mutex<Connection>,
    /// Lock file shared by every process opening the same database file.
    run_lock_path: Option<PathBuf>,
}

impl SqliteCandidateStore {
    /// Open (or create) a database file and apply the schema. `:memory:` yields a private
    /// in-memory database.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        if path == ":memory:" {
            return Self::in_memory();
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI,
        )?;
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(Duration::from_secs(5))?;

        let store = Self {
            conn: Mutex::new(conn),
            run_lock_path: Some(lock_path_for(path)),
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let store = Self {
            conn: Mutex::new(conn),
            run_lock_path: None,
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn migrate(&self) -> Result<(), StoreError> {
        self.connection()?
            .execute_batch(include_str!("../../migrations/001_students.sql"))?;
        Ok(())
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection mutex poisoned".to_string()))
    }

    fn query_students(
        conn: &Connection,
        filter: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<StudentRecord>, StoreError> {
        let sql = format!("{SELECT_STUDENT} {filter}");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params, student_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

impl CandidateStore for SqliteCandidateStore {
    fn insert(&self, record: StudentRecord) -> Result<StudentRecord, StoreError> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        insert_student(&tx, &record)?;
        tx.commit()?;
        Ok(record)
    }

    /// One transaction for the whole batch: a failing record leaves nothing behind.
    fn insert_all(&self, records: Vec<StudentRecord>) -> Result<usize, StoreError> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        for record in &records {
            insert_student(&tx, record)?;
        }
        tx.commit()?;
        Ok(records.len())
    }

    fn update(&self, record: &StudentRecord) -> Result<(), StoreError> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;

        let changed = tx.execute(
            "UPDATE student SET
                name = ?1, email = ?2, phone = ?3, branch_choice_1 = ?4, branch_choice_2 = ?5,
                marksheet_ref = ?6, marks_status = ?7, seat_allotted = ?8, seat_status = ?9,
                seat_accepted = ?10, notification = ?11, receipt_ref = ?12,
                receipt_status = ?13, updated_at = ?14
             WHERE id = ?15",
            params![
                &record.name,
                &record.email,
                &record.phone,
                &record.branch_choice_1,
                &record.branch_choice_2,
                &record.marksheet_ref,
                record.marks_status.as_str(),
                &record.seat_allotted,
                record.seat_status.map(SeatStatus::as_str),
                record.seat_accepted,
                &record.notification,
                &record.receipt_ref,
                record.receipt_status.map(ReceiptStatus::as_str),
                record.updated_at,
                &record.id.0,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }

        write_marks(&tx, record)?;
        tx.commit()?;
        Ok(())
    }

    fn fetch(&self, id: &StudentId) -> Result<Option<StudentRecord>, StoreError> {
        let conn = self.connection()?;
        let mut records = Self::query_students(&conn, "WHERE s.id = ?1", params![&id.0])?;
        Ok(records.pop())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<StudentRecord>, StoreError> {
        let conn = self.connection()?;
        let records = Self::query_students(
            &conn,
            "WHERE s.email = ?1 ORDER BY s.seq ASC LIMIT 1",
            params![email],
        )?;
        Ok(records.into_iter().next())
    }

    fn remove(&self, id: &StudentId) -> Result<(), StoreError> {
        let conn = self.connection()?;
        let removed = conn.execute("DELETE FROM student WHERE id = ?1", params![&id.0])?;
        if removed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn list_students(&self, filter: StudentFilter) -> Result<Vec<StudentRecord>, StoreError> {
        let conn = self.connection()?;
        let clause = if filter.receipt_pending_only {
            "WHERE s.receipt_ref IS NOT NULL AND TRIM(s.receipt_ref) != ''
               AND (s.receipt_status IS NULL OR s.receipt_status = 'PENDING')
             ORDER BY s.seq ASC"
        } else {
            "ORDER BY s.seq ASC"
        };
        Self::query_students(&conn, clause, params![])
    }

    fn list_by_branch(&self, branch: Branch) -> Result<Vec<StudentRecord>, StoreError> {
        let conn = self.connection()?;
        Self::query_students(
            &conn,
            "WHERE UPPER(TRIM(s.seat_allotted)) = ?1 ORDER BY s.seq ASC",
            params![branch.as_str()],
        )
    }

    fn count_assigned(&self, branch: Branch) -> Result<usize, StoreError> {
        let conn = self.connection()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM student WHERE UPPER(TRIM(seat_allotted)) = ?1",
            params![branch.as_str()],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as usize)
    }

    fn eligible_candidates(&self) -> Result<Vec<StudentRecord>, StoreError> {
        let conn = self.connection()?;
        Self::query_students(
            &conn,
            "WHERE s.marks_status = 'VERIFIED'
               AND (s.seat_allotted IS NULL OR TRIM(s.seat_allotted) = '')
             ORDER BY s.seq ASC",
            params![],
        )
    }

    fn record_assignment(
        &self,
        id: &StudentId,
        assignment: &SeatAssignment,
    ) -> Result<(), StoreError> {
        let conn = self.connection()?;
        let changed = conn.execute(
            "UPDATE student SET
                seat_allotted = ?1, seat_status = ?2, seat_accepted = NULL,
                notification = ?3, updated_at = ?4
             WHERE id = ?5",
            params![
                assignment.branch.as_str(),
                assignment.status.as_str(),
                &assignment.notification,
                assignment.assigned_at,
                &id.0,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn try_acquire_run_lease(&self) -> Result<Option<RunLease>, StoreError> {
        match &self.run_lock_path {
            Some(path) => Ok(RunLease::try_file(path)?),
            None => Ok(Some(RunLease::process_local())),
        }
    }
}

fn insert_student(tx: &Transaction<'_>, record: &StudentRecord) -> Result<(), StoreError> {
    let exists = tx
        .query_row(
            "SELECT 1 FROM student WHERE id = ?1",
            params![&record.id.0],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if exists {
        return Err(StoreError::Conflict);
    }

    tx.execute(
        "INSERT INTO student (
            id, name, email, phone, branch_choice_1, branch_choice_2, marksheet_ref,
            marks_status, seat_allotted, seat_status, seat_accepted, notification,
            receipt_ref, receipt_status, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            &record.id.0,
            &record.name,
            &record.email,
            &record.phone,
            &record.branch_choice_1,
            &record.branch_choice_2,
            &record.marksheet_ref,
            record.marks_status.as_str(),
            &record.seat_allotted,
            record.seat_status.map(SeatStatus::as_str),
            record.seat_accepted,
            &record.notification,
            &record.receipt_ref,
            record.receipt_status.map(ReceiptStatus::as_str),
            record.created_at,
            record.updated_at,
        ],
    )?;
    write_marks(tx, record)
}

fn write_marks(tx: &Transaction<'_>, record: &StudentRecord) -> Result<(), StoreError> {
    tx.execute(
        "DELETE FROM class10_marks WHERE student_id = ?1",
        params![&record.id.0],
    )?;
    tx.execute(
        "DELETE FROM class12_marks WHERE student_id = ?1",
        params![&record.id.0],
    )?;

    if let Some(marks) = &record.class10 {
        tx.execute(
            "INSERT INTO class10_marks (student_id, english, math, science, hindi, social)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &record.id.0,
                marks.english,
                marks.math,
                marks.science,
                marks.hindi,
                marks.social
            ],
        )?;
    }

    if let Some(marks) = &record.class12 {
        tx.execute(
            "INSERT INTO class12_marks (student_id, physics, chemistry, math)
             VALUES (?1, ?2, ?3, ?4)",
            params![&record.id.0, marks.physics, marks.chemistry, marks.math],
        )?;
    }

    Ok(())
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognised {column} value '{value}'")]
struct InvalidColumn {
    column: &'static str,
    value: String,
}

fn invalid_column(index: usize, column: &'static str, value: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        Type::Text,
        Box::new(InvalidColumn { column, value }),
    )
}

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<StudentRecord> {
    let marks_raw: String = row.get(7)?;
    let marks_status =
        MarksStatus::parse(&marks_raw).ok_or_else(|| invalid_column(7, "marks_status", marks_raw))?;

    let seat_status = match row.get::<_, Option<String>>(9)? {
        Some(raw) => {
            Some(SeatStatus::parse(&raw).ok_or_else(|| invalid_column(9, "seat_status", raw))?)
        }
        None => None,
    };

    let receipt_status = match row.get::<_, Option<String>>(15)? {
        Some(raw) => Some(
            ReceiptStatus::parse(&raw).ok_or_else(|| invalid_column(15, "receipt_status", raw))?,
        ),
        None => None,
    };

    let class10 = match (
        row.get::<_, Option<u32>>(16)?,
        row.get::<_, Option<u32>>(17)?,
        row.get::<_, Option<u32>>(18)?,
        row.get::<_, Option<u32>>(19)?,
        row.get::<_, Option<u32>>(20)?,
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

    let class12 = match (
        row.get::<_, Option<u32>>(21)?,
        row.get::<_, Option<u32>>(22)?,
        row.get::<_, Option<u32>>(23)?,
    ) {
        (Some(physics), Some(chemistry), Some(math)) => Some(SeniorSecondaryMarks {
            physics,
            chemistry,
            math,
        }),
        _ => None,
    };

    Ok(StudentRecord {
        id: StudentId(row.get(0)?),
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        branch_choice_1: row.get(4)?,
        branch_choice_2: row.get(5)?,
        marksheet_ref: row.get(6)?,
        class10,
        class12,
        marks_status,
        seat_allotted: row.get(8)?,
        seat_status,
        seat_accepted: row.get(10)?,
        notification: row.get(11)?,
        receipt_ref: row.get(14)?,
        receipt_status,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}
