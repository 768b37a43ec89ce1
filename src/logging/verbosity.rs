//! How much of a message gets logged.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::MediaType;

/// Verbosity of logged messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verbosity {
    /// Request/status line and headers only.
    HeadersOnly,
    /// Headers, plus the entity when its media type is textual.
    #[default]
    PayloadText,
    /// Headers and every entity regardless of media type.
    PayloadAny,
}

impl Verbosity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::HeadersOnly => "HEADERS_ONLY",
            Verbosity::PayloadText => "PAYLOAD_TEXT",
            Verbosity::PayloadAny => "PAYLOAD_ANY",
        }
    }

    /// Whether an entity of `media_type` is printed at this verbosity.
    pub fn prints_entity(&self, media_type: Option<&MediaType>) -> bool {
        match self {
            Verbosity::HeadersOnly => false,
            Verbosity::PayloadText => media_type.is_some_and(is_textual),
            Verbosity::PayloadAny => true,
        }
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown verbosity `{0}` (expected HEADERS_ONLY, PAYLOAD_TEXT or PAYLOAD_ANY)")]
pub struct InvalidVerbosity(pub String);

impl FromStr for Verbosity {
    type Err = InvalidVerbosity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HEADERS_ONLY" => Ok(Verbosity::HeadersOnly),
            "PAYLOAD_TEXT" => Ok(Verbosity::PayloadText),
            "PAYLOAD_ANY" => Ok(Verbosity::PayloadAny),
            _ => Err(InvalidVerbosity(s.to_string())),
        }
    }
}

const TEXTUAL: &[(&str, &str)] = &[
    ("text", "*"),
    ("application", "atom+xml"),
    ("application", "json"),
    ("application", "vnd.api+json"),
    ("application", "svg+xml"),
    ("application", "x-www-form-urlencoded"),
    ("application", "xhtml+xml"),
    ("application", "xml"),
];

/// Media types whose entities are considered readable text.
pub fn is_textual(media_type: &MediaType) -> bool {
    TEXTUAL
        .iter()
        .any(|(kind, subtype)| MediaType::new(kind, subtype).is_compatible(media_type))
}
