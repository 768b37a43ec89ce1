//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → CourierConfig (validated, immutable)
//!     → properties.rs overlays flat courier.config.* keys on the logging sections
//!     → LoggingFeature resolves explicit > role > common > default per filter
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod properties;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    ConnectorConfig, ConnectorKind, CourierConfig, LoggingConfig, LoggingSection,
    ObservabilityConfig, Role, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
