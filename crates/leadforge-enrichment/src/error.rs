//! Enrichment error types.

use thiserror::Error;

/// Errors from email generation and verification.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    /// No usable domain could be derived
    #[error("no domain available for email generation: {0}")]
    NoDomain(String),

    /// The system resolver could not be configured
    #[error("resolver setup failed: {0}")]
    Resolver(String),
}

/// Result alias for enrichment operations.
pub type Result<T> = std::result::Result<T, EnrichmentError>;
