//! Services layer for session-service.
//!
//! Credential and session stores sit at the bottom; the session manager,
//! token signer and authentication protocol are built on them.

pub mod account;
pub mod auth;
pub mod credentials;
pub mod error;
pub mod session;
pub mod store;
pub mod token;

pub use account::{AccountError, AccountService, NewAccount};
pub use auth::{AuthError, AuthService, CredentialFailure};
pub use credentials::{AccountRepository, CredentialStore, MemoryCredentialStore, PgCredentialStore};
pub use session::{SessionError, SessionManager};
pub use store::{MemorySessionStore, MongoSessionStore, SessionStore, StoreError};
pub use token::{StepUpClaims, TokenError, TokenSigner};
