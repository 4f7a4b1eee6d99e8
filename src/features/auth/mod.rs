pub mod dtos;
pub mod handlers;
pub mod mailer;
pub mod model;
pub mod otp;
pub mod routes;
pub mod services;
pub mod token;

pub use model::AuthenticatedUser;
pub use routes::routes;
pub use services::AuthService;
pub use token::TokenService;
