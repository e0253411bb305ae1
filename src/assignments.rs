//! Assignment list filtering and the creation form.

use crate::model::{Assignment, NewAssignment, ASSIGNMENT_INITIAL_STATUS};
use crate::roster::{ClassRef, SectionRef, TeacherAssignments};
use crate::session::Identity;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssignmentError {
    #[error("please fill in all required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("class {0} is not allocated to you")]
    UnknownClass(String),
    #[error("section {section} is not allocated to you in {class}")]
    UnknownSection { class: String, section: String },
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentFilter {
    pub class_name: Option<String>,
    pub section_name: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl AssignmentFilter {
    /// Choosing a class always clears the section; sections belong to a class.
    pub fn set_class(&mut self, class_name: Option<String>) {
        self.class_name = class_name.filter(|c| !c.is_empty());
        self.section_name = None;
    }

    pub fn set_section(&mut self, section_name: Option<String>) {
        self.section_name = section_name.filter(|s| !s.is_empty());
    }

    pub fn set_dates(&mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) {
        self.date_from = from;
        self.date_to = to;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_active(&self) -> bool {
        self.class_name.is_some()
            || self.section_name.is_some()
            || self.date_from.is_some()
            || self.date_to.is_some()
    }

    pub fn matches(&self, a: &Assignment) -> bool {
        if let Some(c) = &self.class_name {
            if &a.class_name != c {
                return false;
            }
        }
        if let Some(s) = &self.section_name {
            if &a.section_name != s {
                return false;
            }
        }
        if self.date_from.is_none() && self.date_to.is_none() {
            return true;
        }
        let Some(created) = a.created_at else {
            return false;
        };
        let (from, to) = created_bounds(self.date_from, self.date_to);
        from.map_or(true, |f| created >= f) && to.map_or(true, |t| created <= t)
    }
}

/// Inclusive UTC bounds: `from` at the start of its day, `to` at 23:59:59.999.
pub fn created_bounds(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    let start = from.and_then(|d| d.and_hms_opt(0, 0, 0)).map(|t| t.and_utc());
    let end = to
        .and_then(|d| d.and_hms_milli_opt(23, 59, 59, 999))
        .map(|t| t.and_utc());
    (start, end)
}

pub fn filter_assignments<'a>(list: &'a [Assignment], filter: &AssignmentFilter) -> Vec<&'a Assignment> {
    list.iter().filter(|a| filter.matches(a)).collect()
}

/// Section dropdown options: none until a class is picked, then that class's sections.
pub fn section_options<'a>(
    teacher: &'a TeacherAssignments,
    filter: &AssignmentFilter,
) -> Vec<&'a SectionRef> {
    let Some(class) = filter
        .class_name
        .as_deref()
        .and_then(|name| teacher.class_by_name(name))
    else {
        return Vec::new();
    };
    teacher
        .sections
        .iter()
        .filter(|s| s.class_id == class.id)
        .collect()
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AssignmentForm {
    pub title: String,
    pub class_name: String,
    pub section_name: String,
    pub due_date: String,
    pub description: String,
}

pub fn build_new_assignment(
    form: &AssignmentForm,
    teacher: &TeacherAssignments,
    identity: &Identity,
) -> Result<NewAssignment, AssignmentError> {
    let mut missing = Vec::new();
    if form.title.trim().is_empty() {
        missing.push("title");
    }
    if form.class_name.trim().is_empty() {
        missing.push("class");
    }
    if form.section_name.trim().is_empty() {
        missing.push("section");
    }
    if form.due_date.trim().is_empty() {
        missing.push("dueDate");
    }
    if !missing.is_empty() {
        return Err(AssignmentError::MissingFields(missing));
    }

    let class_name = form.class_name.trim();
    let section_name = form.section_name.trim();
    let class = teacher
        .class_by_name(class_name)
        .ok_or_else(|| AssignmentError::UnknownClass(class_name.to_string()))?;
    let section = teacher
        .sections_for_class(&class.id)
        .find(|s| s.section_name == section_name)
        .ok_or_else(|| AssignmentError::UnknownSection {
            class: class.name.clone(),
            section: section_name.to_string(),
        })?;

    Ok(NewAssignment {
        title: form.title.trim().to_string(),
        description: form.description.clone(),
        institution_id: identity.institution_id.clone(),
        class_id: class.id.clone(),
        class_name: class.name.clone(),
        section_id: section.section_id.clone(),
        section_name: section.section_name.clone(),
        subject: teacher
            .subject
            .as_ref()
            .map(|s| s.name.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
        due_date: form.due_date.trim().to_string(),
        total: 0,
        submitted: 0,
        status: ASSIGNMENT_INITIAL_STATUS.to_string(),
        created_by: identity.teacher_id.clone(),
    })
}

/// Page-level assignment state: the last fetched list, the teacher's
/// allocations and the active filters.
#[derive(Debug, Default)]
pub struct AssignmentsPage {
    pub list: Vec<Assignment>,
    pub teacher: TeacherAssignments,
    pub filter: AssignmentFilter,
    pub loaded: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentsView {
    pub assignments: Vec<Assignment>,
    pub shown: usize,
    pub total: usize,
    pub filter: AssignmentFilter,
    pub filter_active: bool,
    pub classes: Vec<ClassRef>,
    pub sections: Vec<SectionRef>,
    pub subject: Option<String>,
}

impl AssignmentsPage {
    pub fn view(&self) -> AssignmentsView {
        let assignments: Vec<Assignment> = filter_assignments(&self.list, &self.filter)
            .into_iter()
            .cloned()
            .collect();
        AssignmentsView {
            shown: assignments.len(),
            total: self.list.len(),
            assignments,
            filter: self.filter.clone(),
            filter_active: self.filter.is_active(),
            classes: self.teacher.classes.clone(),
            sections: section_options(&self.teacher, &self.filter)
                .into_iter()
                .cloned()
                .collect(),
            subject: self.teacher.subject.as_ref().map(|s| s.name.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Allocation;
    use chrono::TimeZone;

    fn assignment(class: &str, section: &str, created: Option<DateTime<Utc>>) -> Assignment {
        Assignment {
            id: format!("{class}-{section}"),
            title: "Worksheet".into(),
            class_name: class.into(),
            section_name: section.into(),
            created_at: created,
            ..Assignment::default()
        }
    }

    fn teacher() -> TeacherAssignments {
        let row = |class: &str, section: &str| Allocation {
            teacher_id: "t1".into(),
            class_id: format!("c-{class}"),
            class_name: class.into(),
            section_id: format!("s-{class}-{section}"),
            section_name: section.into(),
            subject_id: "sub-en".into(),
            subject_name: "English".into(),
        };
        TeacherAssignments::for_teacher(
            "t1",
            vec![row("Grade 5", "A"), row("Grade 5", "B"), row("Grade 6", "A")],
        )
    }

    fn ident() -> Identity {
        Identity {
            teacher_id: "t1".into(),
            institution_id: "i1".into(),
        }
    }

    #[test]
    fn changing_class_resets_section() {
        let mut f = AssignmentFilter::default();
        f.set_class(Some("Grade 5".into()));
        f.set_section(Some("B".into()));
        assert_eq!(f.section_name.as_deref(), Some("B"));
        f.set_class(Some("Grade 6".into()));
        assert_eq!(f.section_name, None);
        f.set_section(Some("A".into()));
        f.set_class(None);
        assert_eq!(f.section_name, None);
        assert!(!f.is_active());
    }

    #[test]
    fn date_range_is_inclusive_to_end_of_day() {
        let d = NaiveDate::from_ymd_opt(2025, 3, 10).expect("date");
        let last_ms = Utc
            .with_ymd_and_hms(2025, 3, 10, 23, 59, 59)
            .single()
            .map(|t| t + chrono::Duration::milliseconds(999));
        let next_day = Utc.with_ymd_and_hms(2025, 3, 11, 0, 0, 0).single();
        let first_instant = Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).single();
        let list = vec![
            assignment("Grade 5", "A", last_ms),
            assignment("Grade 5", "B", next_day),
            assignment("Grade 6", "A", first_instant),
            assignment("Grade 6", "B", None),
        ];
        let mut f = AssignmentFilter::default();
        f.set_dates(Some(d), Some(d));
        let out = filter_assignments(&list, &f);
        let ids: Vec<&str> = out.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["Grade 5-A", "Grade 6-A"]);
    }

    #[test]
    fn class_and_section_filters_are_exact() {
        let list = vec![
            assignment("Grade 5", "A", None),
            assignment("Grade 5", "B", None),
            assignment("Grade 6", "A", None),
        ];
        let mut f = AssignmentFilter::default();
        f.set_class(Some("Grade 5".into()));
        assert_eq!(filter_assignments(&list, &f).len(), 2);
        f.set_section(Some("A".into()));
        assert_eq!(filter_assignments(&list, &f).len(), 1);
    }

    #[test]
    fn section_options_follow_selected_class() {
        let t = teacher();
        let mut f = AssignmentFilter::default();
        assert!(section_options(&t, &f).is_empty());
        f.set_class(Some("Grade 5".into()));
        let names: Vec<&str> = section_options(&t, &f)
            .iter()
            .map(|s| s.section_name.as_str())
            .collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn form_requires_fields_and_uses_fixed_initial_state() {
        let t = teacher();
        let err = build_new_assignment(&AssignmentForm::default(), &t, &ident()).unwrap_err();
        assert_eq!(
            err,
            AssignmentError::MissingFields(vec!["title", "class", "section", "dueDate"])
        );

        let form = AssignmentForm {
            title: " Reading log ".into(),
            class_name: "Grade 5".into(),
            section_name: "B".into(),
            due_date: "2025-04-01".into(),
            description: String::new(),
        };
        let a = build_new_assignment(&form, &t, &ident()).expect("new assignment");
        assert_eq!(a.title, "Reading log");
        assert_eq!(a.section_id, "s-Grade 5-B");
        assert_eq!(a.subject, "English");
        assert_eq!((a.total, a.submitted), (0, 0));
        assert_eq!(a.status, "not-completed");
        assert_eq!(a.created_by, "t1");
    }

    #[test]
    fn form_rejects_section_from_another_class() {
        let t = teacher();
        let form = AssignmentForm {
            title: "Quiz".into(),
            class_name: "Grade 6".into(),
            section_name: "B".into(),
            due_date: "2025-04-01".into(),
            description: String::new(),
        };
        assert!(matches!(
            build_new_assignment(&form, &t, &ident()),
            Err(AssignmentError::UnknownSection { .. })
        ));
    }
}
