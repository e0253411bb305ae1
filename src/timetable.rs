//! Weekly timetable grid for the signed-in teacher.

use crate::model::TimetableEntry;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

pub const DAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// `Mon` → `Monday`; anything not in the lookup is returned trimmed but unchanged.
pub fn normalize_day(raw: &str) -> String {
    let full = match raw.trim() {
        "Mon" => "Monday",
        "Tue" => "Tuesday",
        "Wed" => "Wednesday",
        "Thu" => "Thursday",
        "Fri" => "Friday",
        "Sat" => "Saturday",
        "Sun" => "Sunday",
        other => other,
    };
    full.to_string()
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub class_id: String,
    pub class_name: String,
    pub section_name: String,
    pub subject_name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PeriodRow {
    pub period: u32,
    /// One cell per entry of `days`, in the same order.
    pub cells: Vec<Option<Slot>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DayEntry {
    pub period: u32,
    #[serde(flatten)]
    pub slot: Slot,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DaySchedule {
    pub day: String,
    pub entries: Vec<DayEntry>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimetableView {
    pub days: Vec<String>,
    pub periods: Vec<u32>,
    pub grid: Vec<PeriodRow>,
    pub by_day: Vec<DaySchedule>,
    /// Entries with a day outside the week; kept out of the grid.
    pub unplaced: usize,
}

pub fn build_view(teacher_id: &str, entries: &[TimetableEntry]) -> TimetableView {
    // (day index, period) -> slot; later entries overwrite earlier ones.
    let mut slots: BTreeMap<(usize, u32), Slot> = BTreeMap::new();
    let mut periods = BTreeSet::new();
    let mut unplaced = 0;

    for e in entries.iter().filter(|e| e.teacher_id == teacher_id) {
        let Some(period) = e.period else { continue };
        if e.day.trim().is_empty() {
            continue;
        }
        let day = normalize_day(&e.day);
        let Some(idx) = DAYS.iter().position(|d| *d == day) else {
            log::debug!("timetable entry with unknown day {day:?} left out of the grid");
            unplaced += 1;
            continue;
        };
        periods.insert(period);
        slots.insert(
            (idx, period),
            Slot {
                class_id: e.class_id.clone(),
                class_name: e.class_name.clone(),
                section_name: e.section_name.clone(),
                subject_name: e.subject_name.clone(),
            },
        );
    }

    let grid = periods
        .iter()
        .map(|&period| PeriodRow {
            period,
            cells: (0..DAYS.len())
                .map(|idx| slots.get(&(idx, period)).cloned())
                .collect(),
        })
        .collect();

    let by_day = DAYS
        .iter()
        .enumerate()
        .map(|(idx, day)| DaySchedule {
            day: day.to_string(),
            entries: slots
                .range((idx, 0)..=(idx, u32::MAX))
                .map(|(&(_, period), slot)| DayEntry {
                    period,
                    slot: slot.clone(),
                })
                .collect(),
        })
        .collect();

    TimetableView {
        days: DAYS.iter().map(|d| d.to_string()).collect(),
        periods: periods.into_iter().collect(),
        grid,
        by_day,
        unplaced,
    }
}
