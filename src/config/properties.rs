//! Flat `courier.config.*` logging properties.
//!
//! Keys follow `courier.config.[client.|server.]logging.<setting>`; the role
//! segment is absent for common settings.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::config::schema::{LoggingConfig, Role};
use crate::logging::sink::parse_level;
use crate::logging::Verbosity;

const PREFIX: &str = "courier.config.";

pub const LOGGER_NAME: &str = "logger.name";
pub const LOGGER_LEVEL: &str = "logger.level";
pub const VERBOSITY: &str = "verbosity";
pub const MAX_ENTITY_SIZE: &str = "entity.maxSize";
pub const SEPARATOR: &str = "separator";

/// Full property key of `setting` for `role` (`None` is common).
pub fn key(role: Option<Role>, setting: &str) -> String {
    match role {
        None => format!("{}logging.{}", PREFIX, setting),
        Some(role) => format!("{}{}.logging.{}", PREFIX, role, setting),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
    #[error("unknown property `{0}`")]
    Unknown(String),

    #[error("invalid value `{value}` for `{key}`: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

fn split(key: &str) -> Option<(Option<Role>, &str)> {
    let rest = key.strip_prefix(PREFIX)?;
    if let Some(setting) = rest.strip_prefix("logging.") {
        return Some((None, setting));
    }
    if let Some(setting) = rest.strip_prefix("client.logging.") {
        return Some((Some(Role::Client), setting));
    }
    rest.strip_prefix("server.logging.")
        .map(|setting| (Some(Role::Server), setting))
}

/// Apply recognized properties onto `logging` and return every problem found.
pub fn apply(logging: &mut LoggingConfig, props: &BTreeMap<String, String>) -> Vec<PropertyError> {
    let mut problems = Vec::new();

    for (key, value) in props {
        let Some((role, setting)) = split(key) else {
            problems.push(PropertyError::Unknown(key.clone()));
            continue;
        };
        let invalid = |reason: String| PropertyError::Invalid {
            key: key.clone(),
            value: value.clone(),
            reason,
        };
        let section = logging.section_mut(role);

        match setting {
            LOGGER_NAME => section.logger_name = Some(value.clone()),
            LOGGER_LEVEL => match parse_level(value) {
                Ok(_) => section.level = Some(value.clone()),
                Err(e) => problems.push(invalid(e.to_string())),
            },
            VERBOSITY => match value.parse::<Verbosity>() {
                Ok(v) => section.verbosity = Some(v),
                Err(e) => problems.push(invalid(e.to_string())),
            },
            MAX_ENTITY_SIZE => match value.trim().parse::<i64>() {
                Ok(n) => section.max_entity_size = Some(n),
                Err(e) => problems.push(invalid(e.to_string())),
            },
            SEPARATOR => section.separator = Some(value.clone()),
            _ => problems.push(PropertyError::Unknown(key.clone())),
        }
    }

    problems
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn builds_keys_per_role() {
        assert_eq!(key(None, MAX_ENTITY_SIZE), "courier.config.logging.entity.maxSize");
        assert_eq!(
            key(Some(Role::Client), LOGGER_LEVEL),
            "courier.config.client.logging.logger.level"
        );
        assert_eq!(
            key(Some(Role::Server), VERBOSITY),
            "courier.config.server.logging.verbosity"
        );
    }

    #[test]
    fn applies_to_matching_sections() {
        let mut logging = LoggingConfig::default();
        let problems = apply(
            &mut logging,
            &props(&[
                ("courier.config.logging.verbosity", "HEADERS_ONLY"),
                ("courier.config.client.logging.entity.maxSize", "-1"),
                ("courier.config.server.logging.logger.name", "server-log"),
            ]),
        );
        assert!(problems.is_empty());
        assert_eq!(logging.common.verbosity, Some(Verbosity::HeadersOnly));
        assert_eq!(logging.client.max_entity_size, Some(-1));
        assert_eq!(logging.server.logger_name.as_deref(), Some("server-log"));
    }

    #[test]
    fn reports_unknown_and_invalid() {
        let mut logging = LoggingConfig::default();
        let problems = apply(
            &mut logging,
            &props(&[
                ("courier.config.logging.entity.maxSize", "lots"),
                ("courier.config.logging.colour", "blue"),
                ("other.key", "x"),
                ("courier.config.client.logging.logger.level", "LOUD"),
            ]),
        );
        assert_eq!(problems.len(), 4);
        assert_eq!(logging, LoggingConfig::default());
    }
}
