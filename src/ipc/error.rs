use serde_json::json;

use crate::assignments::AssignmentError;
use crate::attendance::AttendanceError;
use crate::epoch::Family;
use crate::gateway::GatewayError;
use crate::marks::MarksError;
use crate::roster::RosterError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

#[derive(Debug)]
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn not_authorized() -> Self {
        Self::new("not_authorized", "not signed in; please login")
    }

    pub fn not_loaded(what: &str) -> Self {
        Self::new("not_loaded", format!("{what} not loaded yet"))
    }

    pub fn superseded(family: Family) -> Self {
        Self::new(
            "superseded",
            format!("a newer {family:?} request replaced this one"),
        )
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

pub fn respond(id: &str, result: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match result {
        Ok(v) => ok(id, v),
        Err(e) => e.response(id),
    }
}

impl From<GatewayError> for HandlerErr {
    fn from(e: GatewayError) -> Self {
        log::warn!("backend call failed: {e}");
        let out = Self::new(e.code(), e.to_string());
        match e {
            GatewayError::Status { status, .. } => out.with_details(json!({ "status": status })),
            _ => out,
        }
    }
}

impl From<AttendanceError> for HandlerErr {
    fn from(e: AttendanceError) -> Self {
        let code = match &e {
            AttendanceError::NotLoaded => "not_loaded",
            AttendanceError::UnknownStudent(_) => "not_found",
            AttendanceError::AlreadyMarked => "already_marked",
            AttendanceError::NotMarked => "not_marked",
            AttendanceError::StatusRequired => "status_required",
            AttendanceError::InvalidStatus(_) => "invalid_status",
            AttendanceError::ReasonRequired => "reason_required",
        };
        Self::new(code, e.to_string())
    }
}

impl From<AssignmentError> for HandlerErr {
    fn from(e: AssignmentError) -> Self {
        let message = e.to_string();
        match e {
            AssignmentError::MissingFields(fields) => {
                Self::new("missing_fields", message).with_details(json!({ "fields": fields }))
            }
            AssignmentError::UnknownClass(_) | AssignmentError::UnknownSection { .. } => {
                Self::new("not_allocated", message)
            }
        }
    }
}

impl From<RosterError> for HandlerErr {
    fn from(e: RosterError) -> Self {
        match e {
            RosterError::NoAllocations => Self::new("no_allocations", e.to_string()),
        }
    }
}

impl From<MarksError> for HandlerErr {
    fn from(e: MarksError) -> Self {
        let code = match &e {
            MarksError::NoExamSelected => "no_exam_selected",
            MarksError::UnknownExam(_) | MarksError::UnknownStudent(_) => "not_found",
            MarksError::NotAssigned => "not_assigned",
            MarksError::NothingToSave => "nothing_to_save",
        };
        Self::new(code, e.to_string())
    }
}
