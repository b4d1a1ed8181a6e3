//! HTTP handlers for session-service.

pub mod account;
pub mod auth;
pub mod health;
pub mod session;
