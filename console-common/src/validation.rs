//! Configuration validation.
//!
//! Checks that numeric limits are usable and that credentials are present
//! before any request reaches the dashboard.

use thiserror::Error;

use crate::config::{Config, ConsoleConfig, DashboardConfig, ObservabilityConfig};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors: Vec<ValidationError> = [
            self.console.validate(),
            self.dashboard.validate(),
            self.observability.validate(),
        ]
        .into_iter()
        .filter_map(Result::err)
        .collect();

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }
}

fn at_least_one(field: &str, value: u64) -> ValidationResult<()> {
    if value == 0 {
        return Err(ValidationError::InvalidValue {
            field: field.into(),
            reason: "must be at least 1".into(),
        });
    }
    Ok(())
}

impl Validate for ConsoleConfig {
    fn validate(&self) -> ValidationResult<()> {
        at_least_one("console.page_size", u64::from(self.page_size))?;
        at_least_one("console.max_pages", u64::from(self.max_pages))?;
        at_least_one("console.request_timeout_secs", self.request_timeout_secs)?;

        let base = self.base_url.trim();
        if !base.is_empty() && !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ValidationError::InvalidValue {
                field: "console.base_url".into(),
                reason: format!("'{base}' must start with http:// or https://"),
            });
        }
        Ok(())
    }
}

impl Validate for DashboardConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.username.is_empty() {
            return Err(ValidationError::MissingField {
                field: "dashboard.username".into(),
            });
        }
        if self.port == 0 {
            return Err(ValidationError::InvalidValue {
                field: "dashboard.port".into(),
                reason: "must be between 1 and 65535".into(),
            });
        }
        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
        const FORMATS: &[&str] = &["json", "pretty"];

        if !LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("'{}' is not one of {LEVELS:?}", self.log_level),
            });
        }
        if !FORMATS.contains(&self.log_format.as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("'{}' is not one of {FORMATS:?}", self.log_format),
            });
        }
        Ok(())
    }
}
