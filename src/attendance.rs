//! Daily attendance board: first marks, justified amendments, and the change log.

use crate::gateway::{Backend, GatewayError};
use crate::model::{AttendanceMark, AttendanceQuery, AttendanceRecord, AttendanceStatus, Student};
use crate::roster::{constraint, contains_ci, unique_sorted};
use crate::session::Identity;
use chrono::{DateTime, Local, NaiveDate, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttendanceError {
    #[error("no attendance loaded; load a date first")]
    NotLoaded,
    #[error("student {0} is not on the roster")]
    UnknownStudent(String),
    #[error("attendance already marked; changing it requires a reason")]
    AlreadyMarked,
    #[error("attendance is not marked yet; mark it first")]
    NotMarked,
    #[error("please select a new status")]
    StatusRequired,
    #[error("unknown attendance status: {0}")]
    InvalidStatus(String),
    #[error("reason is required to change attendance")]
    ReasonRequired,
}

/// Outcome of one per-student lookup in the fan-out.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Marked(AttendanceRecord),
    Unmarked,
    Failed(String),
}

impl Lookup {
    pub fn from_result(result: Result<Vec<AttendanceRecord>, GatewayError>) -> Self {
        match result {
            Ok(records) => match latest_record(records) {
                Some(r) => Self::Marked(r),
                None => Self::Unmarked,
            },
            Err(e) => Self::Failed(e.to_string()),
        }
    }
}

/// The backend keeps every submission; the newest one is the displayed status.
fn latest_record(records: Vec<AttendanceRecord>) -> Option<AttendanceRecord> {
    let mut best: Option<AttendanceRecord> = None;
    for r in records {
        best = match best {
            None => Some(r),
            Some(b) => match (b.created_at, r.created_at) {
                (Some(bt), Some(rt)) if rt > bt => Some(r),
                (None, Some(_)) => Some(r),
                _ => Some(b),
            },
        };
    }
    best
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum AttendanceCell {
    Unmarked,
    Marked {
        status: AttendanceStatus,
        time: String,
    },
    Failed {
        reason: String,
    },
}

impl AttendanceCell {
    fn from_lookup(lookup: Lookup) -> Self {
        match lookup {
            Lookup::Marked(r) => Self::Marked {
                status: r.status,
                time: clock_time(r.created_at),
            },
            Lookup::Unmarked => Self::Unmarked,
            Lookup::Failed(reason) => Self::Failed { reason },
        }
    }

    pub fn is_marked(&self) -> bool {
        matches!(self, Self::Marked { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Unmarked => "unmarked",
            Self::Failed { .. } => "failed",
            Self::Marked { status, .. } => status.as_key(),
        }
    }
}

static UNMARKED: AttendanceCell = AttendanceCell::Unmarked;

fn clock_time(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Only Present shows a check-in time.
pub fn mark_time(status: AttendanceStatus, now: DateTime<Local>) -> String {
    match status {
        AttendanceStatus::Present => now.format("%H:%M").to_string(),
        _ => "-".to_string(),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEntry {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub previous_status: String,
    pub new_status: AttendanceStatus,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceBoard {
    pub date: NaiveDate,
    pub students: Vec<Student>,
    pub cells: HashMap<String, AttendanceCell>,
}

impl AttendanceBoard {
    pub fn new(date: NaiveDate, students: Vec<Student>, lookups: Vec<Lookup>) -> Self {
        let cells = students
            .iter()
            .zip(lookups)
            .map(|(s, l)| (s.id.clone(), AttendanceCell::from_lookup(l)))
            .collect();
        Self {
            date,
            students,
            cells,
        }
    }

    pub fn date_key(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    pub fn cell(&self, student_id: &str) -> &AttendanceCell {
        self.cells.get(student_id).unwrap_or(&UNMARKED)
    }

    pub fn student(&self, student_id: &str) -> Result<&Student, AttendanceError> {
        self.students
            .iter()
            .find(|s| s.id == student_id)
            .ok_or_else(|| AttendanceError::UnknownStudent(student_id.to_string()))
    }

    /// First mark: allowed on unmarked and failed cells, no reason needed.
    pub fn check_first_mark(&self, student_id: &str) -> Result<&Student, AttendanceError> {
        let student = self.student(student_id)?;
        if self.cell(student_id).is_marked() {
            return Err(AttendanceError::AlreadyMarked);
        }
        Ok(student)
    }

    /// Amendment: the cell must be marked, a status chosen and a non-blank reason given.
    pub fn check_amendment(
        &self,
        student_id: &str,
        status: Option<&str>,
        reason: &str,
    ) -> Result<(&Student, AttendanceStatus, String), AttendanceError> {
        let raw = status.map(str::trim).filter(|s| !s.is_empty());
        let Some(raw) = raw else {
            return Err(AttendanceError::StatusRequired);
        };
        let status = AttendanceStatus::parse(raw)
            .ok_or_else(|| AttendanceError::InvalidStatus(raw.to_string()))?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AttendanceError::ReasonRequired);
        }
        let student = self.student(student_id)?;
        if !self.cell(student_id).is_marked() {
            return Err(AttendanceError::NotMarked);
        }
        Ok((student, status, reason.to_string()))
    }

    /// Record a confirmed write; returns the label of the state it replaced.
    pub fn apply(&mut self, student_id: &str, status: AttendanceStatus, time: String) -> String {
        let previous = self.cell(student_id).label().to_string();
        self.cells
            .insert(student_id.to_string(), AttendanceCell::Marked { status, time });
        previous
    }
}

pub fn build_mark(
    student: &Student,
    date: NaiveDate,
    status: AttendanceStatus,
    remarks: &str,
    identity: &Identity,
) -> AttendanceMark {
    AttendanceMark {
        student_id: student.id.clone(),
        class_id: student.effective_class_id().to_string(),
        section_id: student.section_id.clone(),
        date: date.format("%Y-%m-%d").to_string(),
        status,
        remarks: remarks.to_string(),
        marked_by: identity.teacher_id.clone(),
        institution_id: identity.institution_id.clone(),
    }
}

pub fn change_entry(
    student: &Student,
    previous_status: String,
    new_status: AttendanceStatus,
    reason: String,
) -> ChangeEntry {
    ChangeEntry {
        id: Uuid::new_v4().to_string(),
        student_id: student.id.clone(),
        student_name: student.name.clone(),
        previous_status,
        new_status,
        reason,
        timestamp: Utc::now(),
    }
}

/// Fetch the roster, then one lookup per student concurrently.
///
/// A failing lookup becomes a `Failed` cell instead of failing the board.
pub async fn fetch_board(
    backend: &dyn Backend,
    token: &str,
    identity: &Identity,
    date: NaiveDate,
) -> Result<AttendanceBoard, GatewayError> {
    let students = backend.students(token).await?;
    let date_key = date.format("%Y-%m-%d").to_string();
    let lookups = join_all(students.iter().map(|s| {
        let query = AttendanceQuery {
            student_id: s.id.clone(),
            date: date_key.clone(),
            section_id: s.section_id.clone(),
            institution_id: identity.institution_id.clone(),
        };
        async move { Lookup::from_result(backend.attendance(token, &query).await) }
    }))
    .await;
    let failed = lookups
        .iter()
        .filter(|l| matches!(l, Lookup::Failed(_)))
        .count();
    if failed > 0 {
        log::warn!("{failed} of {} attendance lookups failed for {date_key}", students.len());
    }
    Ok(AttendanceBoard::new(date, students, lookups))
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AttendanceFilter {
    pub search: String,
    pub status: Option<String>,
    pub class_name: Option<String>,
}

impl AttendanceFilter {
    fn matches(&self, s: &Student, cell: &AttendanceCell) -> bool {
        let q = self.search.trim().to_lowercase();
        if !q.is_empty() && !(contains_ci(&s.name, &q) || contains_ci(&s.roll_number, &q)) {
            return false;
        }
        if let Some(st) = constraint(&self.status) {
            if !st.eq_ignore_ascii_case(cell.label()) {
                return false;
            }
        }
        if let Some(c) = constraint(&self.class_name) {
            if s.class_name != c {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BoardRow {
    pub student: Student,
    pub cell: AttendanceCell,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStats {
    pub filtered: usize,
    pub marked: usize,
    pub unmarked: usize,
    pub failed: usize,
    pub present: usize,
    pub late: usize,
    pub absent: usize,
    pub marked_pct: u32,
    pub present_pct: u32,
    pub late_pct: u32,
    pub absent_pct: u32,
}

fn pct(n: usize, of: usize) -> u32 {
    if of == 0 {
        return 0;
    }
    ((n as f64 / of as f64) * 100.0).round() as u32
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceView {
    pub date: String,
    pub classes: Vec<String>,
    pub marked: Vec<BoardRow>,
    pub unmarked: Vec<BoardRow>,
    pub failed: Vec<BoardRow>,
    pub stats: AttendanceStats,
}

pub fn build_view(board: &AttendanceBoard, filter: &AttendanceFilter) -> AttendanceView {
    let mut marked = Vec::new();
    let mut unmarked = Vec::new();
    let mut failed = Vec::new();
    let mut stats = AttendanceStats::default();

    for s in &board.students {
        let cell = board.cell(&s.id);
        if !filter.matches(s, cell) {
            continue;
        }
        stats.filtered += 1;
        let row = BoardRow {
            student: s.clone(),
            cell: cell.clone(),
        };
        match cell {
            AttendanceCell::Marked { status, .. } => {
                match status {
                    AttendanceStatus::Present => stats.present += 1,
                    AttendanceStatus::Late => stats.late += 1,
                    AttendanceStatus::Absent => stats.absent += 1,
                }
                marked.push(row);
            }
            AttendanceCell::Unmarked => unmarked.push(row),
            AttendanceCell::Failed { .. } => failed.push(row),
        }
    }
    stats.marked = marked.len();
    stats.unmarked = unmarked.len();
    stats.failed = failed.len();
    stats.marked_pct = pct(stats.marked, stats.filtered);
    stats.present_pct = pct(stats.present, stats.filtered);
    stats.late_pct = pct(stats.late, stats.filtered);
    stats.absent_pct = pct(stats.absent, stats.filtered);

    AttendanceView {
        date: board.date_key(),
        classes: unique_sorted(board.students.iter().map(|s| s.class_name.as_str())),
        marked,
        unmarked,
        failed,
        stats,
    }
}

/// Page-level attendance state. The change log outlives board reloads.
#[derive(Debug, Default)]
pub struct AttendancePage {
    pub board: Option<AttendanceBoard>,
    pub history: Vec<ChangeEntry>,
    /// First marks sent but not yet answered, by date and student.
    in_flight: HashSet<(NaiveDate, String)>,
}

impl AttendancePage {
    pub fn board(&self) -> Result<&AttendanceBoard, AttendanceError> {
        self.board.as_ref().ok_or(AttendanceError::NotLoaded)
    }

    /// Reserve a first mark until its write settles. A second first mark
    /// for the same student and day would be an amendment without a reason.
    pub fn claim_first_mark(
        &mut self,
        date: NaiveDate,
        student_id: &str,
    ) -> Result<(), AttendanceError> {
        if !self.in_flight.insert((date, student_id.to_string())) {
            return Err(AttendanceError::AlreadyMarked);
        }
        Ok(())
    }

    pub fn release_first_mark(&mut self, date: NaiveDate, student_id: &str) {
        self.in_flight.remove(&(date, student_id.to_string()));
    }

    /// Patch the board only if it still shows `date`.
    pub fn apply_confirmed(
        &mut self,
        date: NaiveDate,
        student_id: &str,
        status: AttendanceStatus,
        time: String,
    ) -> Option<String> {
        let board = self.board.as_mut().filter(|b| b.date == date)?;
        Some(board.apply(student_id, status, time))
    }
}
