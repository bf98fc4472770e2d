//! Settings validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, parseable addresses)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Pure function: RouterSettings → Result<(), Vec<ValidationError>>
//! - The route file is never validated here; its problems are warnings

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::RouterSettings;

/// A single semantic problem in the settings file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    ZeroInterval { field: &'static str },

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error("client_name must not be empty")]
    EmptyClientName,
}

/// Check settings, collecting every problem.
pub fn validate_settings(settings: &RouterSettings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if settings.client_name.trim().is_empty() {
        errors.push(ValidationError::EmptyClientName);
    }
    if settings.stats.enabled && settings.stats.interval_secs == 0 {
        errors.push(ValidationError::ZeroInterval {
            field: "stats.interval_secs",
        });
    }
    if settings.watchdog.enabled && settings.watchdog.interval_secs == 0 {
        errors.push(ValidationError::ZeroInterval {
            field: "watchdog.interval_secs",
        });
    }
    if settings.observability.metrics_enabled
        && settings
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            settings.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_settings(&RouterSettings::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut settings = RouterSettings::default();
        settings.stats.interval_secs = 0;
        settings.watchdog.interval_secs = 0;
        settings.observability.metrics_enabled = true;
        settings.observability.metrics_address = "not-an-address".into();

        let errors = validate_settings(&settings).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::MetricsAddress("not-an-address".into())));
    }

    #[test]
    fn test_disabled_sections_skip_checks() {
        let mut settings = RouterSettings::default();
        settings.watchdog.enabled = false;
        settings.watchdog.interval_secs = 0;
        assert!(validate_settings(&settings).is_ok());
    }
}
