use serde::Deserialize;
use validator::{Validate, ValidationError};

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterAccountRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(
        length(min = 4, max = 16, message = "Username must be 4 to 16 characters"),
        custom(function = "alphanumeric")
    )]
    pub username: String,

    #[validate(length(min = 8, max = 64, message = "Password must be 8 to 64 characters"))]
    pub password: String,
}

fn alphanumeric(value: &str) -> Result<(), ValidationError> {
    if value.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("alphanumeric");
        err.message = Some("Username may only contain letters and digits".into());
        Err(err)
    }
}
