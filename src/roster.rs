//! Teacher allocation views and student roster filtering.

use crate::gateway::{normalize_allocations, Backend, GatewayError};
use crate::model::{Allocation, Student};
use crate::session::Identity;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RosterError {
    #[error("no subject allocations found for this teacher; contact admin to assign you a subject")]
    NoAllocations,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClassRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SectionRef {
    pub class_id: String,
    pub section_id: String,
    pub section_name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClassSubject {
    pub class_id: String,
    pub class_name: String,
    pub subject_id: String,
    pub subject_name: String,
}

/// Denormalized view of one teacher's allocations.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeacherAssignments {
    pub allocations: Vec<Allocation>,
    pub subject: Option<SubjectRef>,
    pub class_subjects: Vec<ClassSubject>,
    pub classes: Vec<ClassRef>,
    pub sections: Vec<SectionRef>,
}

impl TeacherAssignments {
    /// Build the view from every allocation row visible to the caller. Rows for
    /// other teachers are ignored. An empty result is allowed here.
    pub fn for_teacher(teacher_id: &str, all: Vec<Allocation>) -> Self {
        let allocations: Vec<Allocation> = all
            .into_iter()
            .filter(|a| a.teacher_id == teacher_id)
            .collect();

        let mut classes: Vec<ClassRef> = Vec::new();
        let mut seen_classes = HashSet::new();
        let mut sections = Vec::new();
        let mut seen_sections = HashSet::new();
        let mut class_subjects = Vec::new();
        let mut seen_pairs = HashSet::new();
        let mut subjects: Vec<SubjectRef> = Vec::new();

        for a in &allocations {
            // First row seen for a class names it.
            if seen_classes.insert(a.class_id.clone()) {
                classes.push(ClassRef {
                    id: a.class_id.clone(),
                    name: a.class_name.clone(),
                });
            }
            if !a.section_id.is_empty() || !a.section_name.is_empty() {
                let key = (a.class_id.clone(), a.section_id.clone(), a.section_name.clone());
                if seen_sections.insert(key) {
                    sections.push(SectionRef {
                        class_id: a.class_id.clone(),
                        section_id: a.section_id.clone(),
                        section_name: a.section_name.clone(),
                    });
                }
            }
            let skey = subject_key(a);
            if !skey.is_empty() && seen_pairs.insert((a.class_id.clone(), skey.to_string()))
            {
                class_subjects.push(ClassSubject {
                    class_id: a.class_id.clone(),
                    class_name: a.class_name.clone(),
                    subject_id: a.subject_id.clone(),
                    subject_name: a.subject_name.clone(),
                });
            }
            if !skey.is_empty() && !subjects.iter().any(|s| same_subject(s, a)) {
                subjects.push(SubjectRef {
                    id: a.subject_id.clone(),
                    name: a.subject_name.clone(),
                });
            }
        }

        let subject = if subjects.len() == 1 {
            subjects.pop()
        } else {
            None
        };

        Self {
            allocations,
            subject,
            class_subjects,
            classes,
            sections,
        }
    }

    /// Pages that cannot work without allocations treat an empty view as terminal.
    pub fn non_empty(self) -> Result<Self, RosterError> {
        if self.allocations.is_empty() {
            return Err(RosterError::NoAllocations);
        }
        Ok(self)
    }

    pub fn teaches_class(&self, class_id: &str) -> bool {
        self.classes.iter().any(|c| c.id == class_id)
    }

    pub fn class_by_name(&self, name: &str) -> Option<&ClassRef> {
        self.classes.iter().find(|c| c.name == name)
    }

    pub fn sections_for_class<'a>(&'a self, class_id: &'a str) -> impl Iterator<Item = &'a SectionRef> + 'a {
        self.sections.iter().filter(move |s| s.class_id == class_id)
    }

    pub fn allocations_for_class<'a>(
        &'a self,
        class_id: &'a str,
    ) -> impl Iterator<Item = &'a Allocation> + 'a {
        self.allocations.iter().filter(move |a| a.class_id == class_id)
    }
}

fn subject_key(a: &Allocation) -> &str {
    if a.subject_id.is_empty() {
        &a.subject_name
    } else {
        &a.subject_id
    }
}

fn same_subject(s: &SubjectRef, a: &Allocation) -> bool {
    if !s.id.is_empty() || !a.subject_id.is_empty() {
        s.id == a.subject_id
    } else {
        s.name == a.subject_name
    }
}

/// Fetch and normalize allocations for the session teacher.
///
/// `teacher_scoped` asks the backend for the teacher-scoped variant (`id=` param).
pub async fn fetch_teacher_assignments(
    backend: &dyn Backend,
    token: &str,
    identity: &Identity,
    teacher_scoped: bool,
) -> Result<TeacherAssignments, GatewayError> {
    let scope = teacher_scoped.then_some(identity.teacher_id.as_str());
    let payload = backend
        .allocations(token, &identity.institution_id, scope)
        .await?;
    let rows = normalize_allocations(payload, scope);
    Ok(TeacherAssignments::for_teacher(&identity.teacher_id, rows))
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentFilter {
    pub search: String,
    pub class_name: Option<String>,
    pub academic_year: Option<String>,
    pub status: Option<String>,
    pub gender: Option<String>,
}

/// `None`, empty and `"all"` all mean "no constraint".
pub(crate) fn constraint(v: &Option<String>) -> Option<&str> {
    match v.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(s) => Some(s),
    }
}

pub(crate) fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

impl StudentFilter {
    pub fn is_active(&self) -> bool {
        !self.search.trim().is_empty()
            || constraint(&self.class_name).is_some()
            || constraint(&self.academic_year).is_some()
            || constraint(&self.status).is_some()
            || constraint(&self.gender).is_some()
    }

    pub fn matches(&self, s: &Student) -> bool {
        let q = self.search.trim().to_lowercase();
        if !q.is_empty()
            && !(contains_ci(&s.name, &q) || contains_ci(&s.email, &q) || contains_ci(&s.class_name, &q))
        {
            return false;
        }
        if let Some(c) = constraint(&self.class_name) {
            if s.class_name != c {
                return false;
            }
        }
        if let Some(y) = constraint(&self.academic_year) {
            if s.academic_year != y {
                return false;
            }
        }
        if let Some(st) = constraint(&self.status) {
            if s.status != st {
                return false;
            }
        }
        if let Some(g) = constraint(&self.gender) {
            if s.gender != g {
                return false;
            }
        }
        true
    }
}

pub fn filter_students<'a>(students: &'a [Student], filter: &StudentFilter) -> Vec<&'a Student> {
    students.iter().filter(|s| filter.matches(s)).collect()
}

/// Sorted distinct non-empty values, for filter dropdowns.
pub fn unique_sorted<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .filter(|v| !v.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alloc(teacher: &str, class: &str, section: &str, subject: &str) -> Allocation {
        Allocation {
            teacher_id: teacher.into(),
            class_id: format!("c-{class}"),
            class_name: format!("Grade {class}"),
            section_id: format!("s-{class}{section}"),
            section_name: section.into(),
            subject_id: format!("sub-{subject}"),
            subject_name: subject.into(),
        }
    }

    #[test]
    fn classes_deduplicate_first_seen_wins() {
        let mut second = alloc("t1", "5", "B", "Maths");
        second.class_name = "Fifth".into();
        let view = TeacherAssignments::for_teacher(
            "t1",
            vec![
                alloc("t1", "5", "A", "Maths"),
                second,
                alloc("t2", "6", "A", "Maths"),
            ],
        );
        assert_eq!(view.classes.len(), 1);
        assert_eq!(view.classes[0].name, "Grade 5");
        assert_eq!(view.sections.len(), 2);
        assert_eq!(view.subject.as_ref().map(|s| s.name.as_str()), Some("Maths"));
    }

    #[test]
    fn duplicate_section_rows_collapse() {
        let view = TeacherAssignments::for_teacher(
            "t1",
            vec![alloc("t1", "5", "A", "Maths"), alloc("t1", "5", "A", "Maths")],
        );
        assert_eq!(view.sections.len(), 1);
        assert_eq!(view.class_subjects.len(), 1);
    }

    #[test]
    fn multiple_subjects_have_no_unique_subject() {
        let view = TeacherAssignments::for_teacher(
            "t1",
            vec![alloc("t1", "5", "A", "Maths"), alloc("t1", "6", "A", "Physics")],
        );
        assert!(view.subject.is_none());
        assert_eq!(view.class_subjects.len(), 2);
        assert!(view.teaches_class("c-6"));
        assert_eq!(view.sections_for_class("c-5").count(), 1);
    }

    #[test]
    fn non_empty_rejects_teacher_without_rows() {
        let view = TeacherAssignments::for_teacher("t9", vec![alloc("t1", "5", "A", "Maths")]);
        assert_eq!(view.non_empty(), Err(RosterError::NoAllocations));
        assert!(TeacherAssignments::for_teacher("t9", Vec::new()).allocations.is_empty());
    }

    fn student(name: &str, class: &str, year: &str, status: &str, gender: &str) -> Student {
        Student {
            id: name.to_lowercase(),
            name: name.into(),
            email: format!("{}@school.test", name.to_lowercase()),
            class_name: class.into(),
            academic_year: year.into(),
            status: status.into(),
            gender: gender.into(),
            ..Student::default()
        }
    }

    #[test]
    fn student_filter_combines_search_and_exact_fields() {
        let students = vec![
            student("Asha", "Grade 5", "2024-25", "active", "Female"),
            student("Ravi", "Grade 5", "2024-25", "inactive", "Male"),
            student("Meera", "Grade 6", "2023-24", "active", "Female"),
        ];
        let f = StudentFilter {
            search: "GRADE 5".into(),
            status: Some("active".into()),
            gender: Some("all".into()),
            ..StudentFilter::default()
        };
        let out = filter_students(&students, &f);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "Asha");
        assert!(f.is_active());
        assert!(!StudentFilter::default().is_active());

        let by_email = StudentFilter {
            search: "meera@".into(),
            ..StudentFilter::default()
        };
        assert_eq!(filter_students(&students, &by_email).len(), 1);
    }

    #[test]
    fn unique_sorted_drops_blanks() {
        let v = unique_sorted(["B", "", "A", "B"].into_iter());
        assert_eq!(v, vec!["A".to_string(), "B".to_string()]);
    }
}
