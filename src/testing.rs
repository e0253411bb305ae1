//! In-memory backend and request helpers for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::config::PortalConfig;
use crate::gateway::{AllocationPayload, Backend, GatewayError, LoginReply};
use crate::ipc::{handle_request, AppCtx, Request};
use crate::model::{
    Assignment, AttendanceMark, AttendanceQuery, AttendanceRecord, Exam, ExamMark, ExamMarkEntry,
    ExamScheduleEntry, NewAssignment, Student, TimetableEntry,
};
use crate::session::fake_token;

#[derive(Default)]
pub struct FakeBackend {
    pub students: Mutex<Vec<Student>>,
    pub attendance: Mutex<HashMap<(String, String), Vec<AttendanceRecord>>>,
    pub failing_lookups: Mutex<HashSet<String>>,
    pub lookup_delay: Mutex<HashMap<String, Duration>>,
    pub allocations: Mutex<Option<serde_json::Value>>,
    pub assignments: Mutex<Vec<Assignment>>,
    pub exams: Mutex<Vec<Exam>>,
    pub schedules: Mutex<Vec<ExamScheduleEntry>>,
    pub marks: Mutex<Vec<ExamMark>>,
    pub timetable: Mutex<Vec<TimetableEntry>>,
    pub failing: Mutex<HashSet<&'static str>>,
    pub reject_writes: AtomicBool,
    pub write_delay: Mutex<Option<Duration>>,
    pub calls: Mutex<Vec<String>>,
    pub posted_marks: Mutex<Vec<AttendanceMark>>,
    pub saved_marks: Mutex<Vec<Vec<ExamMarkEntry>>>,
    pub created: Mutex<Vec<NewAssignment>>,
}

fn locked<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().expect("fake backend lock")
}

impl FakeBackend {
    fn call(&self, name: &'static str) -> Result<(), GatewayError> {
        locked(&self.calls).push(name.to_string());
        if locked(&self.failing).contains(name) {
            return Err(GatewayError::Status {
                status: 500,
                message: format!("{name} exploded"),
            });
        }
        Ok(())
    }

    async fn write(&self, name: &'static str) -> Result<(), GatewayError> {
        self.call(name)?;
        let delay = *locked(&self.write_delay);
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected("write refused".into()));
        }
        Ok(())
    }

    pub fn calls_to(&self, name: &str) -> usize {
        locked(&self.calls).iter().filter(|c| *c == name).count()
    }

    pub fn fail(&self, name: &'static str) {
        locked(&self.failing).insert(name);
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn login(&self, employee_id: &str, password: &str) -> Result<LoginReply, GatewayError> {
        self.call("login")?;
        if employee_id != "EMP1" || password != "secret" {
            return Err(GatewayError::Rejected(
                "Invalid Employee ID or Password. Please try again.".into(),
            ));
        }
        Ok(LoginReply {
            token: teacher_token(),
            staff: Some(json!({ "name": "Ms. Rao" })),
        })
    }

    async fn students(&self, _token: &str) -> Result<Vec<Student>, GatewayError> {
        self.call("students")?;
        Ok(locked(&self.students).clone())
    }

    async fn attendance(
        &self,
        _token: &str,
        query: &AttendanceQuery,
    ) -> Result<Vec<AttendanceRecord>, GatewayError> {
        self.call("attendance")?;
        let delay = locked(&self.lookup_delay).get(&query.date).copied();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        if locked(&self.failing_lookups).contains(&query.student_id) {
            return Err(GatewayError::Timeout);
        }
        Ok(locked(&self.attendance)
            .get(&(query.student_id.clone(), query.date.clone()))
            .cloned()
            .unwrap_or_default())
    }

    async fn mark_attendance(&self, _token: &str, mark: &AttendanceMark) -> Result<(), GatewayError> {
        self.write("mark_attendance").await?;
        locked(&self.posted_marks).push(mark.clone());
        Ok(())
    }

    async fn assignments(
        &self,
        _token: &str,
        _institution_id: &str,
    ) -> Result<Vec<Assignment>, GatewayError> {
        self.call("assignments")?;
        Ok(locked(&self.assignments).clone())
    }

    async fn create_assignment(
        &self,
        _token: &str,
        assignment: &NewAssignment,
    ) -> Result<(), GatewayError> {
        self.write("create_assignment").await?;
        locked(&self.created).push(assignment.clone());
        locked(&self.assignments).push(Assignment {
            id: format!("a{}", locked(&self.created).len()),
            title: assignment.title.clone(),
            class_name: assignment.class_name.clone(),
            section_name: assignment.section_name.clone(),
            status: assignment.status.clone(),
            ..Assignment::default()
        });
        Ok(())
    }

    async fn allocations(
        &self,
        _token: &str,
        _institution_id: &str,
        _teacher_id: Option<&str>,
    ) -> Result<AllocationPayload, GatewayError> {
        self.call("allocations")?;
        match locked(&self.allocations).clone() {
            Some(v) => serde_json::from_value(v).map_err(|e| GatewayError::Decode(e.to_string())),
            None => Ok(AllocationPayload::default()),
        }
    }

    async fn exams(&self, _token: &str) -> Result<Vec<Exam>, GatewayError> {
        self.call("exams")?;
        Ok(locked(&self.exams).clone())
    }

    async fn exam_schedules(&self, _token: &str) -> Result<Vec<ExamScheduleEntry>, GatewayError> {
        self.call("exam_schedules")?;
        Ok(locked(&self.schedules).clone())
    }

    async fn exam_marks(&self, _token: &str) -> Result<Vec<ExamMark>, GatewayError> {
        self.call("exam_marks")?;
        Ok(locked(&self.marks).clone())
    }

    async fn save_exam_marks(
        &self,
        _token: &str,
        entries: &[ExamMarkEntry],
    ) -> Result<(), GatewayError> {
        self.write("save_exam_marks").await?;
        locked(&self.saved_marks).push(entries.to_vec());
        Ok(())
    }

    async fn timetable(
        &self,
        _token: &str,
        _institution_id: &str,
    ) -> Result<Vec<TimetableEntry>, GatewayError> {
        self.call("timetable")?;
        Ok(locked(&self.timetable).clone())
    }
}

pub fn teacher_token() -> String {
    fake_token(&json!({ "id": "t1", "InstitutionId": "inst1", "name": "Ms. Rao" }))
}

pub fn student(id: &str, name: &str, class: &str, section: &str) -> Student {
    Student {
        id: id.into(),
        name: name.into(),
        email: format!("{id}@school.test"),
        class_id: format!("c-{class}"),
        class_name: format!("Grade {class}"),
        section_id: format!("s-{class}{section}"),
        section_name: section.into(),
        roll_number: format!("R-{id}"),
        status: "active".into(),
        ..Student::default()
    }
}

pub fn ctx(backend: Arc<FakeBackend>) -> Arc<AppCtx> {
    Arc::new(AppCtx::new(PortalConfig::default(), backend))
}

pub async fn call(ctx: &AppCtx, method: &str, params: serde_json::Value) -> serde_json::Value {
    let req = Request {
        id: method.to_string(),
        method: method.to_string(),
        params,
    };
    handle_request(ctx, req).await
}

/// `result` of a successful call; panics with the error otherwise.
pub async fn call_ok(ctx: &AppCtx, method: &str, params: serde_json::Value) -> serde_json::Value {
    let resp = call(ctx, method, params).await;
    assert_eq!(resp["ok"], json!(true), "{method} failed: {resp}");
    resp["result"].clone()
}

pub fn error_code(resp: &serde_json::Value) -> &str {
    resp["error"]["code"].as_str().unwrap_or("")
}

/// Context with a restored teacher session.
pub async fn signed_in(backend: Arc<FakeBackend>) -> Arc<AppCtx> {
    let ctx = ctx(backend);
    call_ok(&ctx, "session.restore", json!({ "token": teacher_token() })).await;
    ctx
}
