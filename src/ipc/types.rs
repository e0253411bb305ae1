use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::Mutex;

use crate::assignments::AssignmentsPage;
use crate::attendance::AttendancePage;
use crate::config::PortalConfig;
use crate::epoch::{Family, RequestEpochs, Ticket};
use crate::gateway::Backend;
use crate::ipc::error::HandlerErr;
use crate::marks::ExamsPage;
use crate::model::Student;
use crate::roster::StudentFilter;
use crate::session::{Identity, Session};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Shared by every request task. `state` is never locked across a backend call.
pub struct AppCtx {
    pub config: PortalConfig,
    pub backend: Arc<dyn Backend>,
    pub state: Mutex<PortalState>,
}

impl AppCtx {
    pub fn new(config: PortalConfig, backend: Arc<dyn Backend>) -> Self {
        Self {
            config,
            backend,
            state: Mutex::new(PortalState::default()),
        }
    }
}

#[derive(Debug, Default)]
pub struct StudentsPage {
    pub students: Option<Vec<Student>>,
    pub filter: StudentFilter,
}

#[derive(Debug, Default)]
pub struct PortalState {
    pub session: Option<Session>,
    pub epochs: RequestEpochs,
    pub students: StudentsPage,
    pub attendance: AttendancePage,
    pub assignments: AssignmentsPage,
    pub exams: ExamsPage,
}

const FAMILIES: [Family; 6] = [
    Family::Students,
    Family::Attendance,
    Family::Assignments,
    Family::Exams,
    Family::Timetable,
    Family::Session,
];

impl PortalState {
    /// Swap the session and drop every page built for the previous one.
    /// Loads still in flight for the old session become stale.
    pub fn replace_session(&mut self, session: Option<Session>) {
        for family in FAMILIES {
            self.epochs.cancel(family);
        }
        self.session = session;
        self.students = StudentsPage::default();
        self.attendance = AttendancePage::default();
        self.assignments = AssignmentsPage::default();
        self.exams = ExamsPage::default();
    }

    pub fn auth(&self) -> Result<(String, Identity), HandlerErr> {
        let session = self.session.as_ref().ok_or_else(HandlerErr::not_authorized)?;
        let identity = session.identity().ok_or_else(HandlerErr::not_authorized)?;
        Ok((session.token.clone(), identity))
    }

    /// Authenticate and take a ticket for a load of `family`.
    pub fn begin(&mut self, family: Family) -> Result<(String, Identity, Ticket), HandlerErr> {
        let (token, identity) = self.auth()?;
        let ticket = self.epochs.begin(family);
        Ok((token, identity, ticket))
    }

    pub fn ensure_current(&self, ticket: &Ticket) -> Result<(), HandlerErr> {
        if self.epochs.is_current(ticket) {
            Ok(())
        } else {
            log::debug!("discarding stale {:?} load #{}", ticket.family(), ticket.epoch());
            Err(HandlerErr::superseded(ticket.family()))
        }
    }

    /// Authenticate a write and pin the session it was issued under.
    pub fn begin_write(&self) -> Result<(String, Identity, Ticket), HandlerErr> {
        let (token, identity) = self.auth()?;
        Ok((token, identity, self.epochs.current(Family::Session)))
    }

    /// False once the session a write was issued under has been replaced.
    pub fn same_session(&self, ticket: &Ticket) -> bool {
        self.epochs.is_current(ticket)
    }
}
