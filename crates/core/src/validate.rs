//! Small field validators shared by the domain crates.

use crate::error::{DomainError, DomainResult};

/// Trimmed, non-empty text.
pub fn required_text(field: &str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Trimmed text; blank input collapses to `None`.
pub fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Basic email shape check; returns the address lowercased.
pub fn email(field: &str, value: &str) -> DomainResult<String> {
    let value = required_text(field, value)?;
    let valid = match value.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if !valid {
        return Err(DomainError::validation(format!("{field} is not a valid email address")));
    }
    Ok(value.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_text_trims_and_rejects_blank() {
        assert_eq!(required_text("name", "  Chess  ").unwrap(), "Chess");
        assert!(required_text("name", "   ").is_err());
    }

    #[test]
    fn optional_text_drops_blank() {
        assert_eq!(optional_text(Some("  ")), None);
        assert_eq!(optional_text(Some(" x ")), Some("x".to_string()));
        assert_eq!(optional_text(None), None);
    }

    #[test]
    fn email_lowercases_and_checks_shape() {
        assert_eq!(email("email", "Ada@Example.COM").unwrap(), "ada@example.com");
        assert!(email("email", "ada.example.com").is_err());
        assert!(email("email", "@example.com").is_err());
        assert!(email("email", "ada@localhost").is_err());
    }
}
