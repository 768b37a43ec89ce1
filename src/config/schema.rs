//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure of a courier
//! client. All types derive Serde traits for deserialization from TOML.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::properties;
use crate::http::StreamingMode;
use crate::logging::Verbosity;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CourierConfig {
    /// Transport selection and tuning.
    pub connector: ConnectorConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Typed logging sections per role.
    pub logging: LoggingConfig,

    /// Flat `courier.config.*` properties; these win over `logging`.
    pub properties: BTreeMap<String, String>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl CourierConfig {
    /// Logging configuration with the flat properties applied on top of the
    /// typed sections. Unusable properties are skipped; [`validate_config`]
    /// reports them.
    ///
    /// [`validate_config`]: crate::config::validation::validate_config
    pub fn effective_logging(&self) -> LoggingConfig {
        let mut logging = self.logging.clone();
        for problem in properties::apply(&mut logging, &self.properties) {
            tracing::warn!(problem = %problem, "Ignoring logging property");
        }
        logging
    }
}

/// Which network transport to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorKind {
    /// `reqwest` blocking client, one worker thread per async invocation.
    #[default]
    Blocking,
    /// `hyper` client on a connector-owned tokio runtime.
    Hyper,
}

impl fmt::Display for ConnectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectorKind::Blocking => f.write_str("blocking"),
            ConnectorKind::Hyper => f.write_str("hyper"),
        }
    }
}

/// Connector configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectorConfig {
    pub kind: ConnectorKind,

    /// Runtime worker threads of the hyper connector.
    pub worker_threads: usize,

    /// Size of the pieces a `CHUNKED` entity is streamed in.
    pub chunk_size: usize,

    /// Framing used when an invocation does not choose one.
    pub request_entity_processing: StreamingMode,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            kind: ConnectorKind::Blocking,
            worker_threads: 2,
            chunk_size: 4096,
            request_entity_processing: StreamingMode::Buffered,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in milliseconds.
    pub connect_ms: u64,

    /// Maximum wait for response headers or the next body bytes, in milliseconds.
    pub read_ms: u64,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn read(&self) -> Duration {
        Duration::from_millis(self.read_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 5_000,
            read_ms: 30_000,
        }
    }
}

/// Side of an exchange a logging filter serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Client => f.write_str("client"),
            Role::Server => f.write_str("server"),
        }
    }
}

/// Logging settings of one scope; unset fields fall through to the next.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSection {
    pub logger_name: Option<String>,

    /// Level name, e.g. `debug` or `FINE`.
    pub level: Option<String>,

    pub verbosity: Option<Verbosity>,

    /// Entity bytes printed per record. Negative values mean none.
    pub max_entity_size: Option<i64>,

    pub separator: Option<String>,
}

impl LoggingSection {
    /// Fill unset fields from `fallback`.
    pub fn or(&self, fallback: &LoggingSection) -> LoggingSection {
        LoggingSection {
            logger_name: self.logger_name.clone().or_else(|| fallback.logger_name.clone()),
            level: self.level.clone().or_else(|| fallback.level.clone()),
            verbosity: self.verbosity.or(fallback.verbosity),
            max_entity_size: self.max_entity_size.or(fallback.max_entity_size),
            separator: self.separator.clone().or_else(|| fallback.separator.clone()),
        }
    }
}

/// Logging configuration: common settings plus per-role overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub common: LoggingSection,
    pub client: LoggingSection,
    pub server: LoggingSection,
}

impl LoggingConfig {
    pub fn section(&self, role: Role) -> &LoggingSection {
        match role {
            Role::Client => &self.client,
            Role::Server => &self.server,
        }
    }

    pub fn section_mut(&mut self, role: Option<Role>) -> &mut LoggingSection {
        match role {
            None => &mut self.common,
            Some(Role::Client) => &mut self.client,
            Some(Role::Server) => &mut self.server,
        }
    }

    /// Role settings with common settings underneath.
    pub fn resolve(&self, role: Role) -> LoggingSection {
        self.section(role).or(&self.common)
    }

    /// Logging configuration from flat properties alone.
    pub fn from_properties(props: &BTreeMap<String, String>) -> LoggingConfig {
        let mut logging = LoggingConfig::default();
        for problem in properties::apply(&mut logging, props) {
            tracing::warn!(problem = %problem, "Ignoring logging property");
        }
        logging
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
        }
    }
}
