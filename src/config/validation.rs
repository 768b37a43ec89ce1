//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, worker threads ≥ 1)
//! - Check that level names and flat properties are usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: CourierConfig → Result<(), Vec<ValidationError>>
//! - Negative entity sizes are legal; the filters clamp them

use std::fmt;

use crate::config::properties;
use crate::config::schema::{CourierConfig, LoggingSection};
use crate::logging::sink::parse_level;

/// One problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &CourierConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.connector.worker_threads == 0 {
        errors.push(ValidationError::new(
            "connector.worker_threads",
            "must be at least 1",
        ));
    }
    if config.connector.chunk_size == 0 {
        errors.push(ValidationError::new("connector.chunk_size", "must be at least 1"));
    }
    if config.timeouts.connect_ms == 0 {
        errors.push(ValidationError::new("timeouts.connect_ms", "must be greater than 0"));
    }
    if config.timeouts.read_ms == 0 {
        errors.push(ValidationError::new("timeouts.read_ms", "must be greater than 0"));
    }

    validate_section("logging.common", &config.logging.common, &mut errors);
    validate_section("logging.client", &config.logging.client, &mut errors);
    validate_section("logging.server", &config.logging.server, &mut errors);

    let mut merged = config.logging.clone();
    for problem in properties::apply(&mut merged, &config.properties) {
        errors.push(ValidationError::new("properties", problem.to_string()));
    }
    // Properties may set separators too.
    for (name, section) in [
        ("properties.common", &merged.common),
        ("properties.client", &merged.client),
        ("properties.server", &merged.server),
    ] {
        if section.separator.as_deref() == Some("") {
            errors.push(ValidationError::new(name, "separator must not be empty"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_section(path: &str, section: &LoggingSection, errors: &mut Vec<ValidationError>) {
    if let Some(level) = &section.level {
        if let Err(e) = parse_level(level) {
            errors.push(ValidationError::new(format!("{}.level", path), e.to_string()));
        }
    }
    if let Some(name) = &section.logger_name {
        if name.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("{}.logger_name", path),
                "must not be empty",
            ));
        }
    }
}
