//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest display name accepted, in characters.
pub const MAX_NAME_CHARS: usize = 32;

/// Validates a display name: not blank and at most [`MAX_NAME_CHARS`] characters.
///
/// # Examples
///
/// ```ignore
/// validate_display_name("Ada")   // Ok
/// validate_display_name("   ")   // Err - blank
/// ```
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    validate_not_blank(name)?;

    let length = name.trim().chars().count();
    if length > MAX_NAME_CHARS {
        let mut err = ValidationError::new("name_length");
        err.message = Some(
            format!("Name must be at most {MAX_NAME_CHARS} characters (got {length})").into(),
        );
        return Err(err);
    }

    Ok(())
}

/// Rejects empty or whitespace-only strings.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_regular_names() {
        assert!(validate_display_name("Ada").is_ok());
        assert!(validate_display_name("  Grace Hopper ").is_ok());
        assert!(validate_display_name(&"é".repeat(32)).is_ok());
    }

    #[test]
    fn rejects_blank_names() {
        assert!(validate_display_name("").is_err());
        assert!(validate_display_name(" \t ").is_err());
    }

    #[test]
    fn rejects_long_names() {
        let err = validate_display_name(&"x".repeat(33)).unwrap_err();
        assert_eq!(err.code, "name_length");
    }
}
