use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Student {
    #[serde(alias = "_id", deserialize_with = "de_null_default")]
    pub id: String,
    #[serde(deserialize_with = "de_null_default")]
    pub name: String,
    #[serde(deserialize_with = "de_null_default")]
    pub email: String,
    #[serde(deserialize_with = "de_null_default")]
    pub class_id: String,
    pub class_grade_id: Option<String>,
    #[serde(deserialize_with = "de_null_default")]
    pub class_name: String,
    #[serde(deserialize_with = "de_null_default")]
    pub section_id: String,
    #[serde(deserialize_with = "de_null_default")]
    pub section_name: String,
    #[serde(deserialize_with = "de_null_default")]
    pub gender: String,
    #[serde(deserialize_with = "de_null_default")]
    pub academic_year: String,
    #[serde(deserialize_with = "de_null_default")]
    pub status: String,
    #[serde(deserialize_with = "de_null_default")]
    pub roll_number: String,
}

impl Student {
    /// Class id to send on writes; some rosters carry the grade id instead.
    pub fn effective_class_id(&self) -> &str {
        match self.class_grade_id.as_deref() {
            Some(v) if !v.is_empty() => v,
            _ => &self.class_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
}

impl AttendanceStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "present" => Some(Self::Present),
            "late" => Some(Self::Late),
            "absent" => Some(Self::Absent),
            _ => None,
        }
    }

    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Present => "Present",
            Self::Late => "Late",
            Self::Absent => "Absent",
        }
    }

    pub fn as_key(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Late => "late",
            Self::Absent => "absent",
        }
    }
}

impl Serialize for AttendanceStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_wire())
    }
}

impl<'de> Deserialize<'de> for AttendanceStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown attendance status: {raw}")))
    }
}

/// Attendance row as stored by the backend (append-only history per day).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub student_id: String,
    #[serde(default, deserialize_with = "de_null_default")]
    pub class_id: String,
    #[serde(default, deserialize_with = "de_null_default")]
    pub section_id: String,
    #[serde(default, deserialize_with = "de_null_default")]
    pub date: String,
    pub status: AttendanceStatus,
    #[serde(default, deserialize_with = "de_null_default")]
    pub remarks: String,
    #[serde(default, deserialize_with = "de_null_default")]
    pub marked_by: String,
    #[serde(default, alias = "InstitutionId", deserialize_with = "de_null_default")]
    pub institution_id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Body for `POST students/attendance`; used for both first marks and amendments.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceMark {
    pub student_id: String,
    pub class_id: String,
    pub section_id: String,
    pub date: String,
    pub status: AttendanceStatus,
    pub remarks: String,
    pub marked_by: String,
    pub institution_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceQuery {
    pub student_id: String,
    pub date: String,
    pub section_id: String,
    pub institution_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Assignment {
    #[serde(alias = "_id", deserialize_with = "de_null_default")]
    pub id: String,
    #[serde(deserialize_with = "de_null_default")]
    pub title: String,
    #[serde(deserialize_with = "de_null_default")]
    pub description: String,
    #[serde(deserialize_with = "de_null_default")]
    pub institution_id: String,
    #[serde(deserialize_with = "de_null_default")]
    pub class_id: String,
    #[serde(deserialize_with = "de_null_default")]
    pub class_name: String,
    #[serde(deserialize_with = "de_null_default")]
    pub section_id: String,
    #[serde(deserialize_with = "de_null_default")]
    pub section_name: String,
    #[serde(deserialize_with = "de_null_default")]
    pub subject: String,
    #[serde(deserialize_with = "de_null_default")]
    pub due_date: String,
    #[serde(deserialize_with = "de_null_default")]
    pub total: u32,
    #[serde(deserialize_with = "de_null_default")]
    pub submitted: u32,
    #[serde(deserialize_with = "de_null_default")]
    pub status: String,
    #[serde(deserialize_with = "de_null_default")]
    pub created_by: String,
    pub created_at: Option<DateTime<Utc>>,
}

pub const ASSIGNMENT_INITIAL_STATUS: &str = "not-completed";

/// Creation payload. Progress fields always start at zero and are owned by the backend.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewAssignment {
    pub title: String,
    pub description: String,
    pub institution_id: String,
    pub class_id: String,
    pub class_name: String,
    pub section_id: String,
    pub section_name: String,
    pub subject: String,
    pub due_date: String,
    pub total: u32,
    pub submitted: u32,
    pub status: String,
    pub created_by: String,
}

/// Canonical teacher allocation row, whatever shape the backend answered with.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub teacher_id: String,
    pub class_id: String,
    pub class_name: String,
    pub section_id: String,
    pub section_name: String,
    pub subject_id: String,
    pub subject_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Exam {
    #[serde(alias = "_id", deserialize_with = "de_null_default")]
    pub id: String,
    #[serde(deserialize_with = "de_null_default")]
    pub name: String,
    #[serde(deserialize_with = "de_null_default")]
    pub class_id: String,
    #[serde(deserialize_with = "de_null_default")]
    pub class_name: String,
    #[serde(deserialize_with = "de_null_default")]
    pub term: String,
    #[serde(deserialize_with = "de_null_default")]
    pub session: String,
    #[serde(deserialize_with = "de_null_default")]
    pub date: String,
    #[serde(deserialize_with = "de_null_default")]
    pub total_marks: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ExamScheduleEntry {
    #[serde(deserialize_with = "de_null_default")]
    pub exam_id: String,
    #[serde(deserialize_with = "de_null_default")]
    pub subject: String,
    pub max_marks: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ExamMark {
    #[serde(deserialize_with = "de_null_default")]
    pub exam_id: String,
    #[serde(deserialize_with = "de_null_default")]
    pub subject: String,
    #[serde(deserialize_with = "de_null_default")]
    pub student_id: String,
    #[serde(deserialize_with = "de_null_default")]
    pub marks_obtained: f64,
}

/// One element of the `POST exams-marks` array body.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExamMarkEntry {
    pub exam_id: String,
    pub subject: String,
    pub student_id: String,
    pub student_name: String,
    pub marks_obtained: f64,
    pub max_marks: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TimetableEntry {
    #[serde(deserialize_with = "de_null_default")]
    pub day: String,
    #[serde(deserialize_with = "de_period")]
    pub period: Option<u32>,
    #[serde(deserialize_with = "de_null_default")]
    pub teacher_id: String,
    #[serde(deserialize_with = "de_null_default")]
    pub class_id: String,
    #[serde(deserialize_with = "de_null_default")]
    pub class_name: String,
    #[serde(deserialize_with = "de_null_default")]
    pub section_name: String,
    #[serde(deserialize_with = "de_null_default")]
    pub subject_name: String,
}

/// Explicit `null` reads as the field's default, like a missing key.
fn de_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn de_period<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Some(serde_json::Value::String(s)) => s.trim().parse::<u32>().ok(),
        _ => None,
    })
}
