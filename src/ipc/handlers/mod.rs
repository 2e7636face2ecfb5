pub mod attendance;
pub mod auth;
pub mod core;
pub mod dashboard;
pub mod fees;
pub mod students;
