//! Shared Module
//!
//! Types that do not depend on a running session: the error taxonomy, the
//! configuration layer and the response envelope rules. Everything in
//! `client` builds on these.

/// Error taxonomy for network and storage boundaries
pub mod error;

/// Application configuration
pub mod config;

/// Response envelope normalization
pub mod envelope;

/// Re-export commonly used types for convenience
pub use config::{AppConfig, AppConfigBuilder, ConfigError};
pub use error::{ApiError, SessionError, StoreError};
