mod account;
mod session;

pub use account::{Account, AccountProfile};
pub use session::{Device, Session, SessionInfo, PASSWORD_PROVIDER};
