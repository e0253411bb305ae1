pub mod allocations;
pub mod assignments;
pub mod attendance;
pub mod communication;
pub mod core;
pub mod exams;
pub mod session;
pub mod students;
pub mod timetable;
