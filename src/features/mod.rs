pub mod auth;
pub mod dashboard;
pub mod files;
pub mod plans;
pub mod uploads;
pub mod users;
