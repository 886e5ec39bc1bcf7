//! Configuration loading traits and types.
//!
//! Producers usually describe their region in a TOML file:
//!
//! ```toml
//! [shared]
//! log_level = "debug"
//! service_name = "camera-producer"
//!
//! [region]
//! name = "frame0"
//! sample_count = 100
//! element_type = "float"
//!
//! [[region.keywords]]
//! name = "EXPTIME"
//! value = 1.5
//! comment = "exposure time [s]"
//! ```
//!
//! ```rust,no_run
//! use pixshm::config::{ConfigLoader, ProducerConfig};
//! use pixshm::Region;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ProducerConfig::load(Path::new("producer.toml"))?;
//! let region = Region::open_or_create_from_config(&config.region)?;
//! # Ok(())
//! # }
//! ```

use crate::consts::{KEYWORD_COMMENT_LEN, KEYWORD_NAME_LEN, KEYWORD_TEXT_LEN};
use crate::element::ElementType;
use crate::error::ShmResult;
use crate::keyword::{Keyword, KeywordValue};
use crate::region::Region;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Common configuration fields shared by producers and consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// One keyword of a configured schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordConfig {
    /// Keyword name
    pub name: String,
    /// Initial value; its TOML type fixes the keyword type
    pub value: KeywordValue,
    /// Comment
    #[serde(default)]
    pub comment: String,
}

/// Region shape and keyword schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    /// Logical region name
    pub name: String,
    /// Number of samples
    pub sample_count: usize,
    /// Sample element type
    pub element_type: ElementType,
    /// Ordered keyword schema
    #[serde(default)]
    pub keywords: Vec<KeywordConfig>,
}

impl RegionConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `name` is empty
    /// - a keyword name is empty or would be truncated
    /// - a comment or string value would be truncated
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::ValidationError(
                "region name cannot be empty".to_string(),
            ));
        }
        for kw in &self.keywords {
            if kw.name.is_empty() || kw.name.len() >= KEYWORD_NAME_LEN {
                return Err(ConfigError::ValidationError(format!(
                    "keyword name {:?} must be 1..{} bytes",
                    kw.name,
                    KEYWORD_NAME_LEN - 1
                )));
            }
            if kw.comment.len() >= KEYWORD_COMMENT_LEN {
                return Err(ConfigError::ValidationError(format!(
                    "comment of keyword {} exceeds {} bytes",
                    kw.name,
                    KEYWORD_COMMENT_LEN - 1
                )));
            }
            if let KeywordValue::Text(text) = &kw.value {
                if text.len() >= KEYWORD_TEXT_LEN {
                    return Err(ConfigError::ValidationError(format!(
                        "string value of keyword {} exceeds {} bytes",
                        kw.name,
                        KEYWORD_TEXT_LEN - 1
                    )));
                }
            }
        }
        Ok(())
    }

    /// Keyword records in schema order.
    pub fn keywords(&self) -> Vec<Keyword> {
        self.keywords
            .iter()
            .map(|kw| Keyword::new(&kw.name, kw.value.clone(), &kw.comment))
            .collect()
    }
}

/// Full configuration of a producer process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerConfig {
    /// Shared fields
    pub shared: SharedConfig,
    /// Region to publish
    pub region: RegionConfig,
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

impl Region {
    /// [`Region::open_or_create`] from a validated configuration.
    pub fn open_or_create_from_config(config: &RegionConfig) -> ShmResult<Self> {
        config.validate()?;
        Region::open_or_create(
            &config.name,
            config.sample_count,
            config.element_type,
            &config.keywords(),
        )
    }
}
