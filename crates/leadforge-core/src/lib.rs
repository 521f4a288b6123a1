//! LeadForge Core - Foundation crate for the LeadForge lead-generation backend.
//!
//! This crate provides shared types, error handling and configuration
//! management that all other LeadForge crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths and env overrides
//! - [`types`] - Shared enums and newtypes (`LeadStatus`, `JobStatus`, `TimeRange`)
//!
//! # Example
//!
//! ```rust
//! use leadforge_core::{AppConfig, TimeRange};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! assert_eq!(config.email_marketing.daily_limit, 200);
//!
//! let range: TimeRange = "7d".parse()?;
//! assert_eq!(range.days(), 7);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, BrowserConfig, DatabaseConfig, EmailMarketingConfig, EnrichmentConfig,
    ProspectingConfig, ScrapingConfig, ServerConfig,
};
pub use error::{ConfigError, ConfigResult, LeadforgeError, Result};
pub use types::{
    email_regex, JobStatus, LeadStatus, Priority, ProspectingStep, TimeRange,
};
