//! Weir: request lifecycle coordination for crawlers
//!
//! This crate implements the decision core that sits between a crawler's
//! fetcher and its frontier: given the outcome of a fetch (success, retryable
//! failure, or redirect) it decides whether to resubmit a derived request,
//! whether that resubmission is subject to duplicate filtering, and how
//! duplicate-exemption state is threaded through a chain of retries and
//! redirects.

pub mod config;
pub mod fetch;
pub mod filter;
pub mod lifecycle;
pub mod request;
pub mod stats;

use thiserror::Error;

/// Main error type for weir operations
#[derive(Debug, Error)]
pub enum WeirError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for weir operations
pub type Result<T> = std::result::Result<T, WeirError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Settings;
pub use fetch::{ExceptionKind, Fetcher, Outcome, Response};
pub use filter::DuplicateFilter;
pub use lifecycle::{ChainError, Coordinator, Disposition, Engine, Sink};
pub use request::{Fingerprint, Request, RequestId};
pub use stats::StatsCollector;
