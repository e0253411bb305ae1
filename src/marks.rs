//! Exam marks entry: subject resolution, paging, clamping and save payloads.

use crate::model::{Exam, ExamMark, ExamMarkEntry, ExamScheduleEntry, Student};
use crate::roster::{contains_ci, unique_sorted, ClassSubject, TeacherAssignments};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub const PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MarksError {
    #[error("no exam selected")]
    NoExamSelected,
    #[error("exam {0} not found")]
    UnknownExam(String),
    #[error("you are not assigned to teach any subject in this exam")]
    NotAssigned,
    #[error("student {0} is not in this exam's class")]
    UnknownStudent(String),
    #[error("nothing to save")]
    NothingToSave,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MarkKey {
    pub exam_id: String,
    pub subject: String,
    pub student_id: String,
}

impl MarkKey {
    pub fn new(exam_id: &str, subject: &str, student_id: &str) -> Self {
        Self {
            exam_id: exam_id.to_string(),
            subject: subject.to_string(),
            student_id: student_id.to_string(),
        }
    }
}

pub fn index_marks(marks: Vec<ExamMark>) -> HashMap<MarkKey, f64> {
    marks
        .into_iter()
        .map(|m| {
            (
                MarkKey::new(&m.exam_id, &m.subject, &m.student_id),
                m.marks_obtained,
            )
        })
        .collect()
}

/// The single subject this teacher may grade in `exam`, if any.
///
/// Candidates are the teacher's allocations for the exam's class whose
/// subject is on the exam's schedule; the first in backend order wins.
pub fn resolve_subject(
    exam: &Exam,
    teacher: &TeacherAssignments,
    schedules: &[ExamScheduleEntry],
) -> Option<String> {
    teacher
        .allocations_for_class(&exam.class_id)
        .map(|a| a.subject_name.as_str())
        .find(|name| {
            !name.is_empty()
                && schedules
                    .iter()
                    .any(|s| s.exam_id == exam.id && s.subject == *name)
        })
        .map(str::to_string)
}

/// Ceiling for `exam`+`subject`: the schedule's cap, else the exam's total.
pub fn max_marks(exam: &Exam, subject: &str, schedules: &[ExamScheduleEntry]) -> f64 {
    schedules
        .iter()
        .find(|s| s.exam_id == exam.id && s.subject == subject)
        .and_then(|s| s.max_marks)
        .filter(|m| *m > 0.0)
        .unwrap_or(exam.total_marks)
}

pub fn clamp_mark(value: f64, max: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    value.max(0.0).min(max.max(0.0))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PendingMark {
    Blank,
    Value(f64),
}

impl PendingMark {
    /// Blank input stays blank; anything else becomes a clamped number, non-numeric text reading as 0.
    pub fn parse(raw: &serde_json::Value, max: f64) -> Self {
        match raw {
            serde_json::Value::Null => Self::Blank,
            serde_json::Value::Number(n) => Self::Value(clamp_mark(n.as_f64().unwrap_or(0.0), max)),
            serde_json::Value::String(s) if s.trim().is_empty() => Self::Blank,
            serde_json::Value::String(s) => {
                Self::Value(clamp_mark(s.trim().parse::<f64>().unwrap_or(0.0), max))
            }
            serde_json::Value::Bool(b) => Self::Value(clamp_mark(if *b { 1.0 } else { 0.0 }, max)),
            _ => Self::Value(0.0),
        }
    }

    fn as_number(self) -> f64 {
        match self {
            Self::Blank => 0.0,
            Self::Value(v) => v,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SaveScope {
    /// Only the students on the visible page, as the portal always did.
    #[default]
    Page,
    /// Every student with a pending edit, whatever page they are on.
    Edited,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GridRow {
    pub student_id: String,
    pub name: String,
    pub email: String,
    pub section_name: String,
    pub saved: Option<f64>,
    pub pending: Option<PendingMark>,
    pub current: Option<f64>,
    pub has_changes: bool,
    pub valid: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GridView {
    pub exam: Exam,
    pub subject: Option<String>,
    pub max_marks: Option<f64>,
    pub search: String,
    pub section: Option<String>,
    pub sections: Vec<String>,
    pub page: usize,
    pub total_pages: usize,
    pub shown: usize,
    pub total: usize,
    pub pending_edits: usize,
    pub rows: Vec<GridRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SavePlan {
    pub entries: Vec<ExamMarkEntry>,
    /// Pending edits left out of this save; they are discarded once it succeeds.
    pub dropped_edits: usize,
    /// Every pending edit this save consumes, as it was when planned.
    settled: Vec<(MarkKey, PendingMark)>,
}

/// Marks-entry grid for one exam. `subject` is `None` when the teacher has
/// nothing to grade in it; the grid still lists students but accepts no edits.
#[derive(Debug, Clone, PartialEq)]
pub struct MarksGrid {
    pub exam: Exam,
    pub subject: Option<String>,
    pub max_marks: f64,
    students: Vec<Student>,
    search: String,
    section: Option<String>,
    page: usize,
    pending: HashMap<MarkKey, PendingMark>,
}

impl MarksGrid {
    pub fn open(
        exam: Exam,
        teacher: &TeacherAssignments,
        schedules: &[ExamScheduleEntry],
        roster: &[Student],
    ) -> Self {
        let subject = resolve_subject(&exam, teacher, schedules);
        let max_marks = subject
            .as_deref()
            .map(|s| max_marks(&exam, s, schedules))
            .unwrap_or(exam.total_marks);
        let students = roster
            .iter()
            .filter(|s| s.class_id == exam.class_id)
            .cloned()
            .collect();
        Self {
            exam,
            subject,
            max_marks,
            students,
            search: String::new(),
            section: None,
            page: 1,
            pending: HashMap::new(),
        }
    }

    fn subject(&self) -> Result<&str, MarksError> {
        self.subject.as_deref().ok_or(MarksError::NotAssigned)
    }

    fn key(&self, subject: &str, student_id: &str) -> MarkKey {
        MarkKey::new(&self.exam.id, subject, student_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn filtered(&self) -> Vec<&Student> {
        let q = self.search.trim().to_lowercase();
        self.students
            .iter()
            .filter(|s| q.is_empty() || contains_ci(&s.name, &q) || contains_ci(&s.email, &q))
            .filter(|s| {
                self.section
                    .as_deref()
                    .map_or(true, |sec| s.section_name == sec)
            })
            .collect()
    }

    pub fn total_pages(&self) -> usize {
        self.filtered().len().div_ceil(PAGE_SIZE)
    }

    pub fn visible(&self) -> Vec<&Student> {
        let start = (self.page - 1) * PAGE_SIZE;
        self.filtered()
            .into_iter()
            .skip(start)
            .take(PAGE_SIZE)
            .collect()
    }

    /// Any filter change sends the grid back to page 1.
    pub fn set_filter(&mut self, search: Option<String>, section: Option<Option<String>>) {
        if let Some(q) = search {
            self.search = q;
        }
        if let Some(sec) = section {
            self.section = sec.filter(|s| !s.is_empty() && s != "all");
        }
        self.page = 1;
    }

    pub fn clear_filters(&mut self) {
        self.search.clear();
        self.section = None;
        self.page = 1;
    }

    pub fn set_page(&mut self, page: usize) -> usize {
        self.page = page.clamp(1, self.total_pages().max(1));
        self.page
    }

    pub fn enter(&mut self, student_id: &str, raw: &serde_json::Value) -> Result<PendingMark, MarksError> {
        let subject = self.subject()?.to_string();
        if !self.students.iter().any(|s| s.id == student_id) {
            return Err(MarksError::UnknownStudent(student_id.to_string()));
        }
        let mark = PendingMark::parse(raw, self.max_marks);
        let key = self.key(&subject, student_id);
        self.pending.insert(key, mark);
        Ok(mark)
    }

    fn row(&self, s: &Student, existing: &HashMap<MarkKey, f64>) -> GridRow {
        let (saved, pending) = match self.subject.as_deref() {
            Some(subject) => {
                let key = self.key(subject, &s.id);
                (existing.get(&key).copied(), self.pending.get(&key).copied())
            }
            None => (None, None),
        };
        let current = match pending {
            Some(PendingMark::Blank) => None,
            Some(PendingMark::Value(v)) => Some(v),
            None => saved,
        };
        let valid = current.map_or(true, |v| v >= 0.0 && v <= self.max_marks);
        GridRow {
            student_id: s.id.clone(),
            name: s.name.clone(),
            email: s.email.clone(),
            section_name: s.section_name.clone(),
            saved,
            pending,
            current,
            has_changes: pending.is_some(),
            valid,
        }
    }

    pub fn view(&self, existing: &HashMap<MarkKey, f64>) -> GridView {
        let filtered = self.filtered();
        let visible = self.visible();
        GridView {
            exam: self.exam.clone(),
            subject: self.subject.clone(),
            max_marks: self.subject.as_ref().map(|_| self.max_marks),
            search: self.search.clone(),
            section: self.section.clone(),
            sections: unique_sorted(self.students.iter().map(|s| s.section_name.as_str())),
            page: self.page,
            total_pages: self.total_pages(),
            shown: visible.len(),
            total: filtered.len(),
            pending_edits: self.pending.len(),
            rows: visible.iter().map(|s| self.row(s, existing)).collect(),
        }
    }

    pub fn plan_save(
        &self,
        scope: SaveScope,
        existing: &HashMap<MarkKey, f64>,
    ) -> Result<SavePlan, MarksError> {
        let subject = self.subject()?;
        let targets: Vec<&Student> = match scope {
            SaveScope::Page => self.visible(),
            SaveScope::Edited => self
                .students
                .iter()
                .filter(|s| self.pending.contains_key(&self.key(subject, &s.id)))
                .collect(),
        };
        if targets.is_empty() {
            return Err(MarksError::NothingToSave);
        }
        let entries: Vec<ExamMarkEntry> = targets
            .iter()
            .map(|s| {
                let key = self.key(subject, &s.id);
                let marks_obtained = match self.pending.get(&key) {
                    Some(p) => p.as_number(),
                    None => existing.get(&key).copied().unwrap_or(0.0),
                };
                ExamMarkEntry {
                    exam_id: self.exam.id.clone(),
                    subject: subject.to_string(),
                    student_id: s.id.clone(),
                    student_name: s.name.clone(),
                    marks_obtained,
                    max_marks: self.max_marks,
                }
            })
            .collect();
        let dropped_edits = self
            .pending
            .keys()
            .filter(|k| !entries.iter().any(|e| e.student_id == k.student_id))
            .count();
        let settled = self
            .pending
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        Ok(SavePlan {
            entries,
            dropped_edits,
            settled,
        })
    }

    /// Apply a confirmed save: persisted marks absorb the payload and the
    /// edits the plan consumed are cleared. Edits made while the save was
    /// in flight stay pending.
    pub fn commit_save(&mut self, plan: &SavePlan, existing: &mut HashMap<MarkKey, f64>) {
        for e in &plan.entries {
            existing.insert(MarkKey::new(&e.exam_id, &e.subject, &e.student_id), e.marks_obtained);
        }
        for (key, planned) in &plan.settled {
            if self.pending.get(key) == Some(planned) {
                self.pending.remove(key);
            }
        }
        self.page = 1;
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExamCard {
    #[serde(flatten)]
    pub exam: Exam,
    pub can_enter: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExamsOverview {
    /// "Your Teaching Assignments"; empty for a teacher without allocations.
    pub teaching: Vec<ClassSubject>,
    pub exams: Vec<ExamCard>,
    pub selected_exam_id: Option<String>,
    pub warnings: Vec<String>,
}

/// Everything the exams page fetched, plus the open grid if any.
#[derive(Debug, Default)]
pub struct ExamsPage {
    pub teacher: TeacherAssignments,
    pub exams: Vec<Exam>,
    pub schedules: Vec<ExamScheduleEntry>,
    pub roster: Vec<Student>,
    pub existing: HashMap<MarkKey, f64>,
    pub warnings: Vec<String>,
    pub grid: Option<MarksGrid>,
}

impl ExamsPage {
    pub fn overview(&self) -> ExamsOverview {
        ExamsOverview {
            teaching: self.teacher.class_subjects.clone(),
            exams: self
                .exams
                .iter()
                .map(|e| ExamCard {
                    exam: e.clone(),
                    can_enter: self.teacher.teaches_class(&e.class_id),
                })
                .collect(),
            selected_exam_id: self.grid.as_ref().map(|g| g.exam.id.clone()),
            warnings: self.warnings.clone(),
        }
    }

    pub fn open(&mut self, exam_id: &str) -> Result<&MarksGrid, MarksError> {
        let exam = self
            .exams
            .iter()
            .find(|e| e.id == exam_id)
            .cloned()
            .ok_or_else(|| MarksError::UnknownExam(exam_id.to_string()))?;
        let grid = MarksGrid::open(exam, &self.teacher, &self.schedules, &self.roster);
        Ok(self.grid.insert(grid))
    }

    pub fn grid(&self) -> Result<&MarksGrid, MarksError> {
        self.grid.as_ref().ok_or(MarksError::NoExamSelected)
    }

    /// The open grid, provided the teacher can grade it.
    pub fn editable_grid(&mut self) -> Result<&mut MarksGrid, MarksError> {
        let grid = self.grid.as_mut().ok_or(MarksError::NoExamSelected)?;
        if grid.subject.is_none() {
            return Err(MarksError::NotAssigned);
        }
        Ok(grid)
    }
}
