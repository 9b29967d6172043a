use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::select;
use regex::Regex;

use crate::db::schema::users;
use crate::types::{ApiError, ValidationError};
use crate::utils::char_len;

pub const NAME_MAX_LEN: usize = 50;
pub const MAILADDRESS_MAX_LEN: usize = 120;
pub const PASSWORD_MIN_LEN: usize = 5;

lazy_static! {
    static ref EMAIL_RE: Regex = {
        let pattern = r"(?i)\A[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\z";
        Regex::new(pattern).unwrap()
    };
}

pub fn validate_email_re(email: &str) -> Result<(), ValidationError> {
    if !EMAIL_RE.is_match(email) {
        Err(ValidationError::from("mailaddress", format!("Invalid email: {}", email)))
    } else if char_len(email) > MAILADDRESS_MAX_LEN {
        Err(ValidationError::from("mailaddress", "Email address is too long"))
    } else {
        Ok(())
    }
}

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        Err(ValidationError::from("name", "Name is required"))
    } else if char_len(name) > NAME_MAX_LEN {
        Err(ValidationError::from(
            "name",
            format!("Name must be at most {} characters", NAME_MAX_LEN),
        ))
    } else {
        Ok(())
    }
}

pub fn validate_email(email_to_validate: &str, connection: &mut SqliteConnection) -> Result<(), ApiError> {
    let mut errors = ValidationError::default();
    if let Err(e) = validate_email_re(email_to_validate) {
        errors.merge(e);
    }

    let email_exists = select(exists(users::table.filter(users::mailaddress.eq(email_to_validate))))
        .get_result::<bool>(connection)?;
    if email_exists {
        errors.add_error("mailaddress", "This email address is already registered");
    }
    errors.into_result().map_err(ApiError::from)
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if char_len(password) < PASSWORD_MIN_LEN {
        Err(ValidationError::from("password", "Password too short"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_syntax() {
        assert!(validate_email_re("user0001@test.com").is_ok());
        assert!(validate_email_re("not an email").is_err());
        assert!(validate_email_re("@test.com").is_err());
    }

    #[test]
    fn name_bounds() {
        assert!(validate_name("bob").is_ok());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(NAME_MAX_LEN)).is_ok());
        assert!(validate_name(&"x".repeat(NAME_MAX_LEN + 1)).is_err());
    }

    #[test]
    fn name_length_ignores_surrounding_whitespace() {
        let padded = format!("  {}  ", "x".repeat(NAME_MAX_LEN));
        assert!(validate_name(&padded).is_ok());
    }

    #[test]
    fn short_password() {
        let err = validate_password("abcd").unwrap_err();
        assert_eq!(err.get("password"), Some(&["Password too short".to_string()][..]));
        assert!(validate_password("abcde").is_ok());
    }
}
