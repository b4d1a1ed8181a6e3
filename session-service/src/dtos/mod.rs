pub mod account;
pub mod auth;
pub mod session;

pub use service_core::error::ErrorResponse;
