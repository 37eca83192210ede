//! Input validation

use crate::ids::EngagementId;

/// Rejected input, naming the offending field
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    #[inline]
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }

    /// The engagement relation was missing from the payload
    #[inline]
    #[must_use]
    pub fn missing_engagement() -> Self {
        Self::new("engagement_id", "engagement id is required")
    }
}

/// Payload-level validation
pub trait Validate {
    /// Check the payload before any remote write
    ///
    /// # Errors
    /// Returns the first field that fails validation
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Payload that must name the engagement it belongs to
pub trait EngagementScoped {
    /// Engagement relation as submitted
    fn engagement_id(&self) -> Option<EngagementId>;

    /// Engagement relation, or a validation failure when absent
    ///
    /// # Errors
    /// [`ValidationError::missing_engagement`] when the id was not supplied
    fn require_engagement(&self) -> Result<EngagementId, ValidationError> {
        self.engagement_id()
            .ok_or_else(ValidationError::missing_engagement)
    }
}

/// Required, non-blank text
///
/// # Errors
/// When the value is empty or whitespace only
pub fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be blank"));
    }
    Ok(())
}

/// Optional text that, when supplied, must not be blank
///
/// # Errors
/// When the value is present but blank
pub fn optional_text(field: &'static str, value: Option<&String>) -> Result<(), ValidationError> {
    match value {
        Some(v) => require_text(field, v),
        None => Ok(()),
    }
}

/// Minimal email shape check; the directory does the real matching
///
/// # Errors
/// When the value is blank or lacks a local part and domain
pub fn require_email(field: &'static str, value: &str) -> Result<(), ValidationError> {
    require_text(field, value)?;
    match value.trim().split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ValidationError::new(field, "must be an email address")),
    }
}

/// Normalise an email for directory matching
#[must_use]
pub fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_rejected() {
        assert!(require_text("title", "  ").is_err());
        assert!(require_text("title", "ok").is_ok());
        assert!(optional_text("title", None).is_ok());
        assert!(optional_text("title", Some(&String::new())).is_err());
    }

    #[test]
    fn email_shape() {
        assert!(require_email("email", "ada@example.com").is_ok());
        assert!(require_email("email", "ada").is_err());
        assert!(require_email("email", "@example.com").is_err());
        assert!(require_email("email", "ada@localhost").is_err());
    }

    #[test]
    fn email_normalisation() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }

    #[test]
    fn error_names_field() {
        let err = ValidationError::missing_engagement();
        assert_eq!(err.to_string(), "engagement_id: engagement id is required");
    }
}
