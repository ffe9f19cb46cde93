use thiserror::Error;

use crate::directory::NewEmail;

/// Longest accepted user name, in characters.
pub const MAX_NAME_CHARS: usize = 64;
/// Longest accepted password, in bytes.
pub const MAX_PASSWORD_BYTES: usize = 1024;
/// Longest accepted email address, in characters.
pub const MAX_EMAIL_CHARS: usize = 254;

/// Input rejected before any hashing or storage work.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Empty user name.
    #[error("user name must not be empty")]
    EmptyName,
    /// Leading or trailing whitespace in the name.
    #[error("user name must not start or end with whitespace")]
    NameWhitespace,
    /// Name over [`MAX_NAME_CHARS`].
    #[error("user name must be at most {MAX_NAME_CHARS} characters")]
    NameTooLong,
    /// Control character in the name.
    #[error("user name must not contain control characters")]
    NameControlCharacter,
    /// Empty password.
    #[error("password must not be empty")]
    EmptyPassword,
    /// Password over [`MAX_PASSWORD_BYTES`].
    #[error("password must be at most {MAX_PASSWORD_BYTES} bytes")]
    PasswordTooLong,
    /// Carries the rejected address.
    #[error("email address '{0}' is invalid")]
    InvalidEmail(String),
}

/// Non-empty, no surrounding whitespace, no control characters.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if name.trim() != name {
        return Err(ValidationError::NameWhitespace);
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(ValidationError::NameTooLong);
    }
    if name.chars().any(char::is_control) {
        return Err(ValidationError::NameControlCharacter);
    }
    Ok(())
}

/// Non-empty and at most [`MAX_PASSWORD_BYTES`].
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyPassword);
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(ValidationError::PasswordTooLong);
    }
    Ok(())
}

/// A single `@` with something on both sides and no whitespace.
pub fn validate_email(email: &NewEmail) -> Result<(), ValidationError> {
    let address = email.address.as_str();
    let well_formed = address.chars().count() <= MAX_EMAIL_CHARS
        && !address.chars().any(|c| c.is_whitespace() || c.is_control())
        && matches!(
            address.split_once('@'),
            Some((local, domain))
                if !local.is_empty() && !domain.is_empty() && !domain.contains('@')
        );
    if well_formed {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(address.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert!(validate_name("alice").is_ok());
        assert!(validate_name("Ålice Smith").is_ok());
        assert!(validate_name(&"ü".repeat(MAX_NAME_CHARS)).is_ok());

        assert_eq!(validate_name(""), Err(ValidationError::EmptyName));
        assert_eq!(validate_name(" alice"), Err(ValidationError::NameWhitespace));
        assert_eq!(validate_name("alice\n"), Err(ValidationError::NameWhitespace));
        assert_eq!(
            validate_name(&"a".repeat(MAX_NAME_CHARS + 1)),
            Err(ValidationError::NameTooLong)
        );
        assert_eq!(
            validate_name("al\u{7}ice"),
            Err(ValidationError::NameControlCharacter)
        );
    }

    #[test]
    fn passwords() {
        assert!(validate_password("x").is_ok());
        assert!(validate_password(" padded ").is_ok());
        assert_eq!(validate_password(""), Err(ValidationError::EmptyPassword));
        assert_eq!(
            validate_password(&"p".repeat(MAX_PASSWORD_BYTES + 1)),
            Err(ValidationError::PasswordTooLong)
        );
    }

    #[test]
    fn emails() {
        assert!(validate_email(&NewEmail::new("bob@example.com")).is_ok());
        for bad in ["", "bob", "@example.com", "bob@", "a@b@c", "bo b@example.com"] {
            assert!(
                matches!(
                    validate_email(&NewEmail::new(bad)),
                    Err(ValidationError::InvalidEmail(_))
                ),
                "{bad:?}"
            );
        }
        let long = format!("{}@example.com", "x".repeat(MAX_EMAIL_CHARS));
        assert!(validate_email(&NewEmail::new(long)).is_err());
    }
}
