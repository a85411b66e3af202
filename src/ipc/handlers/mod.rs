pub mod backup;
pub mod core;
pub mod events;
pub mod messages;
pub mod session;
pub mod stats;
pub mod students;
pub mod tasks;
