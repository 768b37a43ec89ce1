//! Media type parsing and compatibility checks.
//!
//! Only what the connectors and the logging filters need: type, subtype and the
//! `charset` parameter. Comparison is case-insensitive and `*` acts as a
//! wildcard on either side.

use std::fmt;
use std::str::FromStr;

use http::header::{HeaderMap, CONTENT_TYPE};

/// A parsed `type/subtype; params` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    kind: String,
    subtype: String,
    charset: Option<String>,
}

/// Error returned when a media type string is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid media type: {0:?}")]
pub struct InvalidMediaType(pub String);

impl MediaType {
    pub const WILDCARD: &'static str = "*";

    /// Create a media type without parameters.
    pub fn new(kind: &str, subtype: &str) -> Self {
        Self {
            kind: kind.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
            charset: None,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    /// Read the media type from a `Content-Type` header, if present and parseable.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
    }

    /// Wildcard-aware compatibility: `text/*` is compatible with `text/plain`,
    /// `*/*` with everything.
    pub fn is_compatible(&self, other: &MediaType) -> bool {
        if self.kind == Self::WILDCARD || other.kind == Self::WILDCARD {
            return true;
        }
        if self.kind != other.kind {
            return false;
        }
        self.subtype == Self::WILDCARD
            || other.subtype == Self::WILDCARD
            || self.subtype == other.subtype
    }
}

impl FromStr for MediaType {
    type Err = InvalidMediaType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(';');
        let essence = parts.next().unwrap_or_default().trim();
        let (kind, subtype) = essence
            .split_once('/')
            .ok_or_else(|| InvalidMediaType(s.to_string()))?;
        let (kind, subtype) = (kind.trim(), subtype.trim());
        if kind.is_empty() || subtype.is_empty() || subtype.contains('/') {
            return Err(InvalidMediaType(s.to_string()));
        }

        let charset = parts.find_map(|param| {
            let (name, value) = param.split_once('=')?;
            if name.trim().eq_ignore_ascii_case("charset") {
                Some(value.trim().trim_matches('"').to_string())
            } else {
                None
            }
        });

        Ok(Self {
            kind: kind.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
            charset,
        })
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.subtype)?;
        if let Some(charset) = &self.charset {
            write!(f, "; charset={}", charset)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn parses_charset_parameter() {
        let mt: MediaType = "Text/Plain; charset=\"ISO-8859-1\"".parse().unwrap();
        assert_eq!(mt.kind(), "text");
        assert_eq!(mt.subtype(), "plain");
        assert_eq!(mt.charset(), Some("ISO-8859-1"));
    }

    #[test]
    fn rejects_garbage() {
        assert!("plain".parse::<MediaType>().is_err());
        assert!("text/".parse::<MediaType>().is_err());
        assert!("a/b/c".parse::<MediaType>().is_err());
    }

    #[test]
    fn wildcard_subtype_is_compatible() {
        let text = MediaType::new("text", "*");
        assert!(text.is_compatible(&MediaType::new("text", "csv")));
        assert!(!text.is_compatible(&MediaType::new("application", "json")));
        assert!(MediaType::new("*", "*").is_compatible(&MediaType::new("image", "png")));
    }

    #[test]
    fn reads_content_type_header() {
        let mut headers = HeaderMap::new();
        assert!(MediaType::from_headers(&headers).is_none());
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        assert_eq!(
            MediaType::from_headers(&headers),
            Some(MediaType::new("application", "json"))
        );
    }
}
