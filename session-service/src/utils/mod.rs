pub mod password;
pub mod random;
pub mod validation;

pub use password::{hash_password, verify_password, Password, PasswordHashString};
pub use random::random_token;
pub use validation::ValidatedJson;
