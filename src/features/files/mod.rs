pub mod classify;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod query;
pub mod repository;
pub mod routes;
pub mod services;

pub use routes::routes;
pub use services::DirectoryService;
