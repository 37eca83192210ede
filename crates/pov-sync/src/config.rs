//! Operation layer configuration
//!
//! Loadable from TOML; every field has a default so partial files work:
//!
//! ```toml
//! owner_role = "Engagement Owner"
//! document_bucket = "engagement-documents"
//! summary_limit = 100
//!
//! [audit]
//! fail_operation_on_error = true
//! log_deletions = true
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Operation layer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Role given to the creator when they join their new engagement
    pub owner_role: String,
    /// Blob bucket for uploaded documents
    pub document_bucket: String,
    /// Maximum number of engagements returned by the list view
    pub summary_limit: usize,
    /// Activity log behaviour
    pub audit: AuditConfig,
}

impl SyncConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_owner_role(mut self, role: impl Into<String>) -> Self {
        self.owner_role = role.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_document_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.document_bucket = bucket.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_summary_limit(mut self, limit: usize) -> Self {
        self.summary_limit = limit;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_audit(mut self, audit: AuditConfig) -> Self {
        self.audit = audit;
        self
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// When the text is not valid TOML or a field has the wrong type
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// When the file cannot be read or parsed
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML
    ///
    /// # Errors
    /// When serialization fails
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            owner_role: "Engagement Owner".into(),
            document_bucket: "engagement-documents".into(),
            summary_limit: 100,
            audit: AuditConfig::default(),
        }
    }
}

/// Activity log behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Fail the triggering operation when the log entry cannot be written
    pub fail_operation_on_error: bool,
    /// Write an entry for deletions as well as creates and updates
    pub log_deletions: bool,
}

impl AuditConfig {
    /// Log failures are reported but never fail the operation
    #[inline]
    #[must_use]
    pub fn best_effort() -> Self {
        Self {
            fail_operation_on_error: false,
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn with_log_deletions(mut self, enabled: bool) -> Self {
        self.log_deletions = enabled;
        self
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            fail_operation_on_error: true,
            log_deletions: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = SyncConfig::from_toml_str(
            r#"
            owner_role = "Lead"

            [audit]
            log_deletions = false
            "#,
        )
        .unwrap();

        assert_eq!(config.owner_role, "Lead");
        assert_eq!(config.document_bucket, "engagement-documents");
        assert!(config.audit.fail_operation_on_error);
        assert!(!config.audit.log_deletions);
    }

    #[test]
    fn toml_round_trip() {
        let config = SyncConfig::new()
            .with_summary_limit(25)
            .with_audit(AuditConfig::best_effort());
        let text = config.to_toml_string().unwrap();
        assert_eq!(SyncConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn wrong_type_is_rejected() {
        let err = SyncConfig::from_toml_str("summary_limit = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
