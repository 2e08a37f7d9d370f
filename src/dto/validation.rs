//! Validation helpers for DTOs.

use validator::ValidationError;

const MAX_ROOM_NAME_LENGTH: usize = 64;
const MAX_PASSWORD_LENGTH: usize = 128;

/// Validates that a room name is non-empty (ignoring surrounding whitespace)
/// and reasonably short.
pub fn validate_room_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("room_name_empty");
        err.message = Some("Room name must not be empty".into());
        return Err(err);
    }

    if name.len() > MAX_ROOM_NAME_LENGTH {
        let mut err = ValidationError::new("room_name_length");
        err.message = Some(
            format!(
                "Room name must be at most {MAX_ROOM_NAME_LENGTH} characters (got {})",
                name.len()
            )
            .into(),
        );
        return Err(err);
    }

    Ok(())
}

/// Validates an optional room password's length.
pub fn validate_room_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        let mut err = ValidationError::new("room_password_empty");
        err.message = Some("Room password must not be empty when provided".into());
        return Err(err);
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        let mut err = ValidationError::new("room_password_length");
        err.message =
            Some(format!("Room password must be at most {MAX_PASSWORD_LENGTH} characters").into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_room_name_valid() {
        assert!(validate_room_name("Speedy Friday").is_ok());
        assert!(validate_room_name("a").is_ok());
    }

    #[test]
    fn test_validate_room_name_empty() {
        assert!(validate_room_name("").is_err());
        assert!(validate_room_name("   ").is_err());
        assert!(validate_room_name("\t\n").is_err());
    }

    #[test]
    fn test_validate_room_name_too_long() {
        assert!(validate_room_name(&"x".repeat(64)).is_ok());
        assert!(validate_room_name(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_room_password() {
        assert!(validate_room_password("abc").is_ok());
        assert!(validate_room_password("").is_err());
        assert!(validate_room_password(&"x".repeat(129)).is_err());
    }
}
