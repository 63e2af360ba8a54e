//! Configuration module.
//!
//! This module provides configuration management with support for:
//! - JSON configuration files
//! - Environment variable overrides
//! - Stdin input
//! - Sensible defaults
//!
//! # Module Structure
//!
//! - [`crate::config::types`]: Root `Config` struct
//! - [`server`]: Room coordination settings (chat caps, frame sizes, CORS)
//! - [`protocol`]: Wire payload limits (room codes, nicknames, chat text)
//! - [`media`]: Upload directory and size cap
//! - [`logging`]: Logging configuration
//! - [`crate::config::loader`]: Configuration loading functions
//! - [`crate::config::validation`]: Configuration validation functions
//! - [`crate::config::defaults`]: Default value functions

// Submodules
pub mod defaults;
pub mod loader;
pub mod logging;
pub mod media;
pub mod protocol;
pub mod server;
pub mod types;
pub mod validation;

// Re-exports for convenience
pub use loader::load;

pub use logging::{LogFormat, LogLevel, LoggingConfig};

pub use media::MediaConfig;

pub use protocol::ProtocolConfig;

pub use server::ServerConfig;

pub use types::Config;

pub use validation::validate_config;
