//! Configuration management for the NLLB translation service
//!
//! Supports loading configuration from:
//! - YAML/TOML files under `config/`
//! - Environment variables (NLLB_API__ prefix, `__` separated)

pub mod settings;

pub use settings::{
    load_settings, load_settings_from, DetectorConfig, DispatchStrategy, ObservabilityConfig,
    ServerConfig, Settings, TranslatorConfig,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::NotFound(field) => ConfigError::MissingField(field),
            other => ConfigError::ParseError(other.to_string()),
        }
    }
}
