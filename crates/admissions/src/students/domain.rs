use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for registered students.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StudentId(pub String);

impl StudentId {
    pub fn generate() -> Self {
        Self(format!("stu-{}", uuid::Uuid::new_v4().simple()))
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Academic branch a seat can be allotted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Branch {
    Cse,
    Ece,
    Civil,
    Mechanical,
}

impl Branch {
    pub const ALL: [Self; 4] = [Self::Cse, Self::Ece, Self::Civil, Self::Mechanical];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cse => "CSE",
            Self::Ece => "ECE",
            Self::Civil => "CIVIL",
            Self::Mechanical => "MECHANICAL",
        }
    }

    /// Case-insensitive lookup; blank or unknown names yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|branch| branch.as_str() == normalized)
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown branch '{0}'")]
pub struct UnknownBranch(pub String);

impl FromStr for Branch {
    type Err = UnknownBranch;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownBranch(s.to_string()))
    }
}

/// Class 10 subject marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SecondaryMarks {
    pub english: u32,
    pub math: u32,
    pub science: u32,
    pub hindi: u32,
    pub social: u32,
}

impl SecondaryMarks {
    pub fn total(&self) -> u32 {
        self.english + self.math + self.science + self.hindi + self.social
    }

    fn subjects(&self) -> [(&'static str, u32); 5] {
        [
            ("english10", self.english),
            ("math10", self.math),
            ("science10", self.science),
            ("hindi10", self.hindi),
            ("social10", self.social),
        ]
    }
}

/// Class 12 subject marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SeniorSecondaryMarks {
    pub physics: u32,
    pub chemistry: u32,
    pub math: u32,
}

impl SeniorSecondaryMarks {
    pub fn total(&self) -> u32 {
        self.physics + self.chemistry + self.math
    }

    fn subjects(&self) -> [(&'static str, u32); 3] {
        [
            ("physics12", self.physics),
            ("chemistry12", self.chemistry),
            ("math12", self.math),
        ]
    }
}

pub const MAX_SUBJECT_MARK: u32 = 100;

/// Subject fields whose value exceeds [`MAX_SUBJECT_MARK`].
pub(crate) fn out_of_range_subjects(
    class10: &SecondaryMarks,
    class12: &SeniorSecondaryMarks,
) -> Vec<&'static str> {
    class10
        .subjects()
        .into_iter()
        .chain(class12.subjects())
        .filter(|(_, mark)| *mark > MAX_SUBJECT_MARK)
        .map(|(field, _)| field)
        .collect()
}

/// Verification state of the submitted class 12 marksheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarksStatus {
    #[default]
    Pending,
    Verified,
    Rejected,
}

impl MarksStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Verified => "VERIFIED",
            Self::Rejected => "REJECTED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "VERIFIED" => Some(Self::Verified),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Acceptance state of an allotted seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SeatStatus {
    Pending,
    Accepted,
    Rejected,
}

impl SeatStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "ACCEPTED" => Some(Self::Accepted),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub const fn from_acceptance(accepted: Option<bool>) -> Self {
        match accepted {
            Some(true) => Self::Accepted,
            Some(false) => Self::Rejected,
            None => Self::Pending,
        }
    }
}

/// Review state of an uploaded fee receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReceiptStatus {
    Pending,
    Verified,
    Rejected,
}

impl ReceiptStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Verified => "VERIFIED",
            Self::Rejected => "REJECTED",
        }
    }

    /// Exact upper-case wire values only.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "PENDING" => Some(Self::Pending),
            "VERIFIED" => Some(Self::Verified),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Persisted applicant record including preferences, marks and seat state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: StudentId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub branch_choice_1: Option<String>,
    pub branch_choice_2: Option<String>,
    pub marksheet_ref: Option<String>,
    pub class10: Option<SecondaryMarks>,
    pub class12: Option<SeniorSecondaryMarks>,
    pub marks_status: MarksStatus,
    pub seat_allotted: Option<String>,
    pub seat_status: Option<SeatStatus>,
    pub seat_accepted: Option<bool>,
    pub notification: Option<String>,
    pub receipt_ref: Option<String>,
    pub receipt_status: Option<ReceiptStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StudentRecord {
    /// Uploaded a receipt that nobody has verified or rejected yet.
    pub fn is_receipt_pending(&self) -> bool {
        let uploaded = self
            .receipt_ref
            .as_deref()
            .is_some_and(|reference| !reference.trim().is_empty());
        uploaded && matches!(self.receipt_status, None | Some(ReceiptStatus::Pending))
    }

    /// Holds a seat in `branch`, comparing case-insensitively.
    pub fn holds_seat_in(&self, branch: Branch) -> bool {
        self.seat_allotted
            .as_deref()
            .is_some_and(|seat| seat.trim().eq_ignore_ascii_case(branch.as_str()))
    }

    /// Blank seat values are treated the same as a missing seat.
    pub fn has_seat(&self) -> bool {
        self.seat_allotted
            .as_deref()
            .is_some_and(|seat| !seat.trim().is_empty())
    }

    /// Declared preferences in order, skipping blanks.
    pub fn preferences(&self) -> impl Iterator<Item = &str> {
        [self.branch_choice_1.as_deref(), self.branch_choice_2.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|choice| !choice.is_empty())
    }

    pub fn status_view(&self) -> StudentStatusView {
        StudentStatusView {
            student_id: self.id.clone(),
            marks_status: self.marks_status.as_str(),
            seat_allotted: self.seat_allotted.clone().filter(|_| self.has_seat()),
            seat_status: self.seat_status.map(SeatStatus::as_str),
            receipt_status: self.receipt_status.map(ReceiptStatus::as_str),
            notification: self.notification.clone(),
        }
    }
}

/// Seat written onto a student by the allotment run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatAssignment {
    pub branch: Branch,
    pub status: SeatStatus,
    pub notification: String,
    pub assigned_at: DateTime<Utc>,
}

impl SeatAssignment {
    pub fn pending(branch: Branch, assigned_at: DateTime<Utc>) -> Self {
        Self {
            branch,
            status: SeatStatus::Pending,
            notification: format!(
                "You have been allotted {branch}. Please accept or reject your seat."
            ),
            assigned_at,
        }
    }
}

/// Registration payload accepted from applicants.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegistrationSubmission {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default, alias = "branchChoice1")]
    pub branch1: Option<String>,
    #[serde(default, alias = "branchChoice2")]
    pub branch2: Option<String>,
    #[serde(default, alias = "marksheetUrl")]
    pub marksheet_ref: Option<String>,
    pub class10: SecondaryMarks,
    pub class12: SeniorSecondaryMarks,
}

/// Class 10 marks compared during verification. Social studies is not checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedSecondaryMarks {
    pub math: u32,
    pub science: u32,
    pub english: u32,
    pub hindi: u32,
}

/// Marks an applicant claims, checked against the stored official record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedMarks {
    pub class10: SubmittedSecondaryMarks,
    pub class12: SeniorSecondaryMarks,
}

impl SubmittedMarks {
    pub fn matches(&self, class10: &SecondaryMarks, class12: &SeniorSecondaryMarks) -> bool {
        let secondary = self.class10.math == class10.math
            && self.class10.science == class10.science
            && self.class10.english == class10.english
            && self.class10.hindi == class10.hindi;

        secondary
            && self.class12.math == class12.math
            && self.class12.physics == class12.physics
            && self.class12.chemistry == class12.chemistry
    }
}

/// Narrowing applied to the administrative student listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StudentFilter {
    pub receipt_pending_only: bool,
}

impl StudentFilter {
    pub fn matches(&self, record: &StudentRecord) -> bool {
        !self.receipt_pending_only || record.is_receipt_pending()
    }
}

/// Public view returned by the student endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct StudentStatusView {
    pub student_id: StudentId,
    pub marks_status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seat_allotted: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seat_status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<String>,
}
