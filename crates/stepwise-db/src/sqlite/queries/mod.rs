pub mod info;
pub mod reports;
pub mod runs;
pub mod subtasks;
