//! User model for bulk imports

use chrono::NaiveDate;
use serde::Serialize;
use validator::Validate;

/// A user account to create. Users are global, not tenant-scoped.
#[derive(Debug, Clone, PartialEq, Serialize, Validate)]
pub struct UserCommand {
    #[validate(length(min = 1, message = "Name must not be empty"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email_address: String,
    pub gender: Option<String>,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}
