//! Request generations per fetch family.
//!
//! A load takes a ticket before it starts fetching and may only commit its
//! results while that ticket is still the newest one issued for its family.
//! A slower, older load then cannot overwrite what a newer load committed.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Students,
    Attendance,
    Assignments,
    Exams,
    Timetable,
    /// Bumped on every session change; writes check it before touching state.
    Session,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    family: Family,
    epoch: u64,
}

impl Ticket {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn family(&self) -> Family {
        self.family
    }
}

#[derive(Debug, Default)]
pub struct RequestEpochs {
    latest: HashMap<Family, u64>,
}

impl RequestEpochs {
    pub fn begin(&mut self, family: Family) -> Ticket {
        let next = self.latest.entry(family).or_insert(0);
        *next += 1;
        Ticket {
            family,
            epoch: *next,
        }
    }

    /// Ticket for the generation already in effect, without starting a new one.
    pub fn current(&self, family: Family) -> Ticket {
        Ticket {
            family,
            epoch: self.latest.get(&family).copied().unwrap_or(0),
        }
    }

    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.latest.get(&ticket.family).copied() == Some(ticket.epoch)
    }

    /// Invalidate any in-flight load of `family` without starting a new one.
    pub fn cancel(&mut self, family: Family) {
        self.begin(family);
    }
}
