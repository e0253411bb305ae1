//! Remote data gateway: the only place that knows the backend's URLs and JSON shapes.

use crate::config::PortalConfig;
use crate::model::{
    Allocation, Assignment, AttendanceMark, AttendanceQuery, AttendanceRecord, Exam, ExamMark,
    ExamMarkEntry, ExamScheduleEntry, NewAssignment, Student, TimetableEntry,
};
use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatewayError {
    #[error("cannot connect to server: {0}")]
    Unreachable(String),
    #[error("request timed out")]
    Timeout,
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("{0}")]
    Rejected(String),
    #[error("server answered HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unreachable(_) => "backend_unreachable",
            Self::Timeout => "backend_timeout",
            Self::Unauthorized(_) => "unauthorized",
            Self::Rejected(_) => "backend_rejected",
            Self::Status { .. } => "backend_error",
            Self::Decode(_) => "bad_response",
        }
    }

    fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Unreachable(e.to_string())
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Status {
                status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                message: e.to_string(),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoginReply {
    pub token: String,
    pub staff: Option<serde_json::Value>,
}

/// Either a populated `{_id, name}` reference or a bare id.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RefField {
    Populated {
        #[serde(alias = "_id")]
        id: String,
        #[serde(default)]
        name: String,
    },
    Id(String),
}

impl RefField {
    fn id(&self) -> &str {
        match self {
            Self::Populated { id, .. } => id,
            Self::Id(id) => id,
        }
    }

    fn name(&self) -> Option<&str> {
        match self {
            Self::Populated { name, .. } if !name.is_empty() => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RawAllocation {
    pub teacher_id: Option<RefField>,
    pub class_id: Option<RefField>,
    pub class_name: Option<String>,
    pub section_id: Option<RefField>,
    pub section_name: Option<String>,
    pub subject_id: Option<RefField>,
    pub subject_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NestedSubject {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NestedSection {
    pub section_id: String,
    pub section_name: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NestedClass {
    pub class_id: String,
    pub class_name: String,
    pub sections: Vec<NestedSection>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct NestedAllocation {
    pub subject: Option<NestedSubject>,
    pub classes: Vec<NestedClass>,
}

/// The two shapes `subject-allocation` answers with, discriminated by JSON type.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AllocationPayload {
    Flat(Vec<RawAllocation>),
    Nested(NestedAllocation),
}

impl Default for AllocationPayload {
    fn default() -> Self {
        Self::Flat(Vec::new())
    }
}

/// Normalize either allocation shape into canonical rows.
///
/// `scoped_teacher` is the teacher id the request was scoped to, if any. Rows
/// that do not name a teacher are attributed to it; without a scope such rows
/// are dropped because they cannot be matched to anyone.
pub fn normalize_allocations(
    payload: AllocationPayload,
    scoped_teacher: Option<&str>,
) -> Vec<Allocation> {
    match payload {
        AllocationPayload::Flat(rows) => rows
            .into_iter()
            .filter_map(|row| {
                let teacher_id = match (&row.teacher_id, scoped_teacher) {
                    (Some(t), _) => t.id().to_string(),
                    (None, Some(scoped)) => scoped.to_string(),
                    (None, None) => return None,
                };
                let class = row.class_id.as_ref()?;
                Some(Allocation {
                    teacher_id,
                    class_id: class.id().to_string(),
                    class_name: row
                        .class_name
                        .clone()
                        .or_else(|| class.name().map(str::to_string))
                        .unwrap_or_default(),
                    section_id: row
                        .section_id
                        .as_ref()
                        .map(|s| s.id().to_string())
                        .unwrap_or_default(),
                    section_name: row
                        .section_name
                        .clone()
                        .or_else(|| row.section_id.as_ref().and_then(|s| s.name()).map(str::to_string))
                        .unwrap_or_default(),
                    subject_id: row
                        .subject_id
                        .as_ref()
                        .map(|s| s.id().to_string())
                        .unwrap_or_default(),
                    subject_name: row
                        .subject_name
                        .clone()
                        .or_else(|| row.subject_id.as_ref().and_then(|s| s.name()).map(str::to_string))
                        .unwrap_or_default(),
                })
            })
            .collect(),
        AllocationPayload::Nested(nested) => {
            let Some(teacher_id) = scoped_teacher else {
                return Vec::new();
            };
            let subject = nested.subject.unwrap_or_default();
            let mut out = Vec::new();
            for class in nested.classes {
                // A class without sections still belongs in the class list.
                let sections = if class.sections.is_empty() {
                    vec![NestedSection::default()]
                } else {
                    class.sections
                };
                for section in sections {
                    out.push(Allocation {
                        teacher_id: teacher_id.to_string(),
                        class_id: class.class_id.clone(),
                        class_name: class.class_name.clone(),
                        section_id: section.section_id,
                        section_name: section.section_name,
                        subject_id: subject.id.clone(),
                        subject_name: subject.name.clone(),
                    });
                }
            }
            out
        }
    }
}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn login(&self, employee_id: &str, password: &str) -> Result<LoginReply, GatewayError>;
    async fn students(&self, token: &str) -> Result<Vec<Student>, GatewayError>;
    async fn attendance(
        &self,
        token: &str,
        query: &AttendanceQuery,
    ) -> Result<Vec<AttendanceRecord>, GatewayError>;
    async fn mark_attendance(&self, token: &str, mark: &AttendanceMark) -> Result<(), GatewayError>;
    async fn assignments(
        &self,
        token: &str,
        institution_id: &str,
    ) -> Result<Vec<Assignment>, GatewayError>;
    async fn create_assignment(
        &self,
        token: &str,
        assignment: &NewAssignment,
    ) -> Result<(), GatewayError>;
    async fn allocations(
        &self,
        token: &str,
        institution_id: &str,
        teacher_id: Option<&str>,
    ) -> Result<AllocationPayload, GatewayError>;
    async fn exams(&self, token: &str) -> Result<Vec<Exam>, GatewayError>;
    async fn exam_schedules(&self, token: &str) -> Result<Vec<ExamScheduleEntry>, GatewayError>;
    async fn exam_marks(&self, token: &str) -> Result<Vec<ExamMark>, GatewayError>;
    async fn save_exam_marks(
        &self,
        token: &str,
        entries: &[ExamMarkEntry],
    ) -> Result<(), GatewayError>;
    async fn timetable(
        &self,
        token: &str,
        institution_id: &str,
    ) -> Result<Vec<TimetableEntry>, GatewayError>;
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Envelope {
    success: bool,
    data: Option<serde_json::Value>,
    students: Option<serde_json::Value>,
    staff: Option<serde_json::Value>,
    token: Option<String>,
    message: Option<String>,
    error: Option<serde_json::Value>,
}

impl Envelope {
    fn message(&self) -> Option<String> {
        if let Some(m) = self.message.as_ref().filter(|m| !m.is_empty()) {
            return Some(m.clone());
        }
        match &self.error {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(v) if !v.is_null() => Some(v.to_string()),
            _ => None,
        }
    }
}

fn take_list<T: DeserializeOwned>(value: Option<serde_json::Value>) -> Result<Vec<T>, GatewayError> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(v) => serde_json::from_value(v).map_err(|e| GatewayError::Decode(e.to_string())),
    }
}

pub struct HttpGateway {
    client: reqwest::Client,
    config: PortalConfig,
}

impl HttpGateway {
    pub fn new(config: PortalConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, GatewayError> {
        let endpoint = self.config.endpoint(path);
        let parsed = if params.is_empty() {
            Url::parse(&endpoint)
        } else {
            Url::parse_with_params(&endpoint, params)
        };
        parsed.map_err(|e| GatewayError::Unreachable(format!("invalid backend url {endpoint}: {e}")))
    }

    async fn send(&self, request: RequestBuilder, timeout: Duration) -> Result<Envelope, GatewayError> {
        let resp = request
            .timeout(timeout)
            .send()
            .await
            .map_err(GatewayError::from_transport)?;
        let status = resp.status();
        let body = resp.text().await.map_err(GatewayError::from_transport)?;
        let envelope = serde_json::from_str::<Envelope>(&body).ok();
        let message = envelope.as_ref().and_then(Envelope::message);

        if status == StatusCode::UNAUTHORIZED {
            return Err(GatewayError::Unauthorized(
                message.unwrap_or_else(|| "please login again".to_string()),
            ));
        }
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                message: message.unwrap_or_else(|| status.to_string()),
            });
        }
        let envelope = envelope
            .ok_or_else(|| GatewayError::Decode("response is not a JSON envelope".to_string()))?;
        Ok(envelope)
    }

    /// Like `send`, but also requires `success: true`.
    async fn send_ok(&self, request: RequestBuilder, timeout: Duration) -> Result<Envelope, GatewayError> {
        let envelope = self.send(request, timeout).await?;
        if !envelope.success {
            return Err(GatewayError::Rejected(
                envelope
                    .message()
                    .unwrap_or_else(|| "request was rejected".to_string()),
            ));
        }
        Ok(envelope)
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<Vec<T>, GatewayError> {
        let url = self.url(path, params)?;
        log::debug!("GET {url}");
        let envelope = self
            .send_ok(self.client.get(url).bearer_auth(token), self.config.request_timeout())
            .await?;
        take_list(envelope.data)
    }

    async fn post<B: Serialize + ?Sized + Sync>(
        &self,
        token: &str,
        path: &str,
        body: &B,
    ) -> Result<(), GatewayError> {
        let url = self.url(path, &[])?;
        log::debug!("POST {url}");
        self.send_ok(
            self.client.post(url).bearer_auth(token).json(body),
            self.config.request_timeout(),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Backend for HttpGateway {
    async fn login(&self, employee_id: &str, password: &str) -> Result<LoginReply, GatewayError> {
        let url = self.url("staff/portal/login", &[])?;
        let envelope = self
            .send(
                self.client
                    .post(url)
                    .json(&json!({ "employeeId": employee_id, "password": password })),
                self.config.request_timeout(),
            )
            .await?;
        let message = envelope.message();
        match envelope.token.filter(|t| !t.is_empty()) {
            Some(token) => Ok(LoginReply {
                token,
                staff: envelope.staff,
            }),
            None => Err(GatewayError::Rejected(message.unwrap_or_else(|| {
                "Invalid Employee ID or Password. Please try again.".to_string()
            }))),
        }
    }

    async fn students(&self, token: &str) -> Result<Vec<Student>, GatewayError> {
        let url = self.url("staff/portal/students", &[])?;
        let envelope = self
            .send_ok(self.client.get(url).bearer_auth(token), self.config.roster_timeout())
            .await?;
        take_list(envelope.students)
    }

    async fn attendance(
        &self,
        token: &str,
        query: &AttendanceQuery,
    ) -> Result<Vec<AttendanceRecord>, GatewayError> {
        self.get_list(
            token,
            "staff/portal/students/attendance",
            &[
                ("studentId", query.student_id.as_str()),
                ("date", query.date.as_str()),
                ("sectionId", query.section_id.as_str()),
                ("institutionId", query.institution_id.as_str()),
            ],
        )
        .await
    }

    async fn mark_attendance(&self, token: &str, mark: &AttendanceMark) -> Result<(), GatewayError> {
        self.post(token, "staff/portal/students/attendance", mark).await
    }

    async fn assignments(
        &self,
        token: &str,
        institution_id: &str,
    ) -> Result<Vec<Assignment>, GatewayError> {
        self.get_list(token, "assignments", &[("institutionId", institution_id)])
            .await
    }

    async fn create_assignment(
        &self,
        token: &str,
        assignment: &NewAssignment,
    ) -> Result<(), GatewayError> {
        self.post(token, "assignments", assignment).await
    }

    async fn allocations(
        &self,
        token: &str,
        institution_id: &str,
        teacher_id: Option<&str>,
    ) -> Result<AllocationPayload, GatewayError> {
        let mut params = vec![("institutionId", institution_id)];
        if let Some(t) = teacher_id {
            params.push(("id", t));
        }
        let url = self.url("subject-allocation", &params)?;
        let envelope = self
            .send_ok(self.client.get(url).bearer_auth(token), self.config.request_timeout())
            .await?;
        match envelope.data {
            None | Some(serde_json::Value::Null) => Ok(AllocationPayload::default()),
            Some(v) => serde_json::from_value(v).map_err(|e| GatewayError::Decode(e.to_string())),
        }
    }

    async fn exams(&self, token: &str) -> Result<Vec<Exam>, GatewayError> {
        self.get_list(token, "staff/portal/exams", &[]).await
    }

    async fn exam_schedules(&self, token: &str) -> Result<Vec<ExamScheduleEntry>, GatewayError> {
        self.get_list(token, "staff/portal/exams-schedules", &[]).await
    }

    async fn exam_marks(&self, token: &str) -> Result<Vec<ExamMark>, GatewayError> {
        self.get_list(token, "staff/portal/exams-marks", &[]).await
    }

    async fn save_exam_marks(
        &self,
        token: &str,
        entries: &[ExamMarkEntry],
    ) -> Result<(), GatewayError> {
        self.post(token, "exams-marks", entries).await
    }

    async fn timetable(
        &self,
        token: &str,
        institution_id: &str,
    ) -> Result<Vec<TimetableEntry>, GatewayError> {
        self.get_list(token, "timetable", &[("instituteId", institution_id)])
            .await
    }
}
