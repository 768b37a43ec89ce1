//! Building logging filters from explicit settings and configuration.
//!
//! Each setting resolves as: explicit builder value, then the role section
//! (client or server), then the common section, then the default.

use std::sync::Arc;

use tracing::Level;

use crate::config::{LoggingConfig, Role};
use crate::logging::client::ClientLoggingFilter;
use crate::logging::interceptor::{LoggingInterceptor, LoggingSettings};
use crate::logging::record::LogRecordIds;
use crate::logging::server::ServerLoggingFilter;
use crate::logging::sink::{parse_level, LogSink, TracingSink};
use crate::logging::verbosity::Verbosity;

/// Factory of client and server logging filters.
#[derive(Clone, Default)]
pub struct LoggingFeature {
    logger_name: Option<String>,
    level: Option<Level>,
    verbosity: Option<Verbosity>,
    max_entity_size: Option<i64>,
    separator: Option<String>,
    sink: Option<Arc<dyn LogSink>>,
    ids: Option<Arc<LogRecordIds>>,
}

impl LoggingFeature {
    pub fn builder() -> LoggingFeatureBuilder {
        LoggingFeatureBuilder::default()
    }

    /// Resolve the settings of a `role` filter against `config`.
    pub fn settings(&self, role: Role, config: &LoggingConfig) -> LoggingSettings {
        let section = config.resolve(role);
        let defaults = LoggingSettings::default();

        let level = self.level.unwrap_or_else(|| {
            section
                .level
                .as_deref()
                .and_then(|name| match parse_level(name) {
                    Ok(level) => Some(level),
                    Err(e) => {
                        tracing::warn!(role = %role, error = %e, "Ignoring configured log level");
                        None
                    }
                })
                .unwrap_or(defaults.level)
        });

        LoggingSettings {
            logger_name: self
                .logger_name
                .clone()
                .or(section.logger_name)
                .unwrap_or(defaults.logger_name),
            level,
            verbosity: self
                .verbosity
                .or(section.verbosity)
                .unwrap_or(defaults.verbosity),
            max_entity_size: self
                .max_entity_size
                .or(section.max_entity_size)
                .unwrap_or(defaults.max_entity_size),
            separator: self
                .separator
                .clone()
                .or(section.separator)
                .unwrap_or(defaults.separator),
        }
    }

    fn interceptor(&self, role: Role, config: &LoggingConfig) -> LoggingInterceptor {
        let settings = self.settings(role, config);
        tracing::debug!(
            role = %role,
            logger = %settings.logger_name,
            level = %settings.level,
            verbosity = %settings.verbosity,
            max_entity_size = settings.max_entity_size,
            "Logging filter configured"
        );
        let sink = self
            .sink
            .clone()
            .unwrap_or_else(|| Arc::new(TracingSink));
        let ids = self
            .ids
            .clone()
            .unwrap_or_else(|| Arc::new(LogRecordIds::new()));
        LoggingInterceptor::new(settings, sink, ids)
    }

    pub fn client_filter(&self, config: &LoggingConfig) -> ClientLoggingFilter {
        ClientLoggingFilter::new(self.interceptor(Role::Client, config))
    }

    pub fn server_filter(&self, config: &LoggingConfig) -> ServerLoggingFilter {
        ServerLoggingFilter::new(self.interceptor(Role::Server, config))
    }
}

impl std::fmt::Debug for LoggingFeature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingFeature")
            .field("logger_name", &self.logger_name)
            .field("level", &self.level)
            .field("verbosity", &self.verbosity)
            .field("max_entity_size", &self.max_entity_size)
            .field("separator", &self.separator)
            .field("shared_ids", &self.ids.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`LoggingFeature`]; every setting is optional.
#[derive(Default)]
pub struct LoggingFeatureBuilder {
    feature: LoggingFeature,
}

impl LoggingFeatureBuilder {
    pub fn logger_name(mut self, name: impl Into<String>) -> Self {
        self.feature.logger_name = Some(name.into());
        self
    }

    pub fn level(mut self, level: Level) -> Self {
        self.feature.level = Some(level);
        self
    }

    pub fn verbosity(mut self, verbosity: Verbosity) -> Self {
        self.feature.verbosity = Some(verbosity);
        self
    }

    /// Negative values log headers only.
    pub fn max_entity_size(mut self, size: i64) -> Self {
        self.feature.max_entity_size = Some(size);
        self
    }

    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.feature.separator = Some(separator.into());
        self
    }

    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.feature.sink = Some(sink);
        self
    }

    /// Share one id counter between every filter built by the feature.
    pub fn ids(mut self, ids: Arc<LogRecordIds>) -> Self {
        self.feature.ids = Some(ids);
        self
    }

    pub fn build(self) -> LoggingFeature {
        self.feature
    }
}
